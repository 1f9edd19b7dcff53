//! Memory retrieval: chronological and similarity modes, dialogue,
//! archival, and the composed character state.

use narrative_state::embedding::EmbeddingBackend;
use narrative_state::engine::{MemoryQuery, NarrativeEngine, QueryRequest};
use narrative_state::index::IndexKind;
use narrative_state::state::NarrativeState;
use narrative_state::types::{
    ChunkType, CorpusFilter, DialogueLine, ErrorKind, Metadata, NewCorpusChunk, NewMemory,
    StateError, StateResult,
};
use narrative_state::{EngineConfig, HashEmbedding};

// ==================== Helper ====================

const WORDS: [&str; 4] = ["sword", "shield", "bread", "river"];

/// Test backend: one axis per known word.
struct KeywordEmbedding;

impl EmbeddingBackend for KeywordEmbedding {
    fn embed(&self, text: &str) -> StateResult<Vec<f32>> {
        let mut vec = vec![0.0f32; WORDS.len()];
        for token in text.split_whitespace() {
            if let Some(axis) = WORDS.iter().position(|w| *w == token) {
                vec[axis] += 1.0;
            }
        }
        Ok(vec)
    }

    fn dimensions(&self) -> usize {
        WORDS.len()
    }
}

fn keyword_engine() -> NarrativeEngine {
    let engine = NarrativeEngine::new(
        Box::new(KeywordEmbedding),
        EngineConfig::with_dimension(WORDS.len()),
    )
    .unwrap();
    seed(&engine);
    engine
}

fn hash_engine() -> NarrativeEngine {
    let engine = NarrativeEngine::new(
        Box::new(HashEmbedding::new(32)),
        EngineConfig::with_dimension(32),
    )
    .unwrap();
    seed(&engine);
    engine
}

/// Moments m1..m5, characters ann/ben/cat, root take 1.
fn seed(engine: &NarrativeEngine) {
    for i in 1..=5 {
        engine
            .create_moment(&format!("m{i}"), i as f64, None, Metadata::new())
            .unwrap();
    }
    for (id, name) in [("ann", "Ann"), ("ben", "Ben"), ("cat", "Cat")] {
        engine
            .register_character(id, name, Metadata::new(), Metadata::new())
            .unwrap();
    }
    engine.create_take(None, None, None).unwrap();
}

fn remember(engine: &NarrativeEngine, who: &str, text: &str, moment: &str, take: u64) -> u64 {
    engine
        .embed_memory(NewMemory::new(who, text, ChunkType::Internal, moment, take))
        .unwrap()
}

fn chunks(memories: &[narrative_state::Memory]) -> Vec<&str> {
    memories.iter().map(|m| m.chunk.as_str()).collect()
}

// ==================== Chronological ====================

#[test]
fn test_chronological_order_and_gate() {
    let engine = hash_engine();
    remember(&engine, "ann", "third", "m3", 1);
    remember(&engine, "ann", "first", "m1", 1);
    remember(&engine, "ann", "second", "m2", 1);
    remember(&engine, "ann", "later", "m5", 1);
    remember(&engine, "ben", "not mine", "m1", 1);

    let query = MemoryQuery::new("ann", "m3", 1, 10);
    let memories = engine.memories_chronological(&query).unwrap();
    assert_eq!(chunks(&memories), vec!["first", "second", "third"]);
    assert!(memories.iter().all(|m| m.character_id == "ann"));
}

#[test]
fn test_chronological_limit_and_ties() {
    let engine = hash_engine();
    let a = remember(&engine, "ann", "a", "m1", 1);
    let b = remember(&engine, "ann", "b", "m1", 1);
    remember(&engine, "ann", "c", "m1", 1);

    let query = MemoryQuery::new("ann", "m1", 1, 2);
    let ids: Vec<u64> = engine
        .memories_chronological(&query)
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec![a, b]);
}

#[test]
fn test_chronological_lineage() {
    let engine = hash_engine();
    remember(&engine, "ann", "shared past", "m1", 1);
    let left = engine.branch(1, "m2", None).unwrap();
    let right = engine.branch(1, "m2", None).unwrap();
    remember(&engine, "ann", "left path", "m3", left);
    remember(&engine, "ann", "right path", "m3", right);

    let on_left = engine
        .memories_chronological(&MemoryQuery::new("ann", "m5", left, 10))
        .unwrap();
    assert_eq!(chunks(&on_left), vec!["shared past", "left path"]);

    let on_root = engine
        .memories_chronological(&MemoryQuery::new("ann", "m5", 1, 10))
        .unwrap();
    assert_eq!(chunks(&on_root), vec!["shared past"]);
}

// ==================== Similarity ====================

#[test]
fn test_similarity_ranks_by_distance() {
    let engine = keyword_engine();
    remember(&engine, "ann", "bread", "m1", 1);
    remember(&engine, "ann", "sword", "m1", 1);
    remember(&engine, "ann", "sword shield", "m1", 1);

    let query = MemoryQuery::new("ann", "m1", 1, 3);
    let memories = engine.memories_similar(&query, "sword").unwrap();
    assert_eq!(chunks(&memories), vec!["sword", "sword shield", "bread"]);
}

#[test]
fn test_similarity_post_filter_returns_short_list() {
    let engine = keyword_engine();
    let hidden = engine.branch(1, "m1", None).unwrap();
    for _ in 0..10 {
        remember(&engine, "ann", "river", "m1", hidden);
    }
    remember(&engine, "ann", "river", "m1", 1);
    remember(&engine, "ann", "river", "m2", 1);
    for _ in 0..18 {
        remember(&engine, "ann", "river", "m1", hidden);
    }

    let query = MemoryQuery::new("ann", "m2", 1, 5);
    let memories = engine.memories_similar(&query, "river").unwrap();
    assert_eq!(memories.len(), 2);
    assert!(memories.iter().all(|m| m.take_id == 1));
}

#[test]
fn test_similarity_respects_temporal_gate() {
    let engine = keyword_engine();
    remember(&engine, "ann", "sword", "m4", 1);
    remember(&engine, "ann", "bread", "m1", 1);

    let query = MemoryQuery::new("ann", "m2", 1, 5);
    let memories = engine.memories_similar(&query, "sword").unwrap();
    assert_eq!(chunks(&memories), vec!["bread"]);
}

#[test]
fn test_similarity_with_cluster_index() {
    let mut config = EngineConfig::with_dimension(32);
    config.index.kind = "cluster".into();
    config.index.probes = 64;
    let engine = NarrativeEngine::new(Box::new(HashEmbedding::new(32)), config).unwrap();
    seed(&engine);
    for i in 0..100 {
        remember(&engine, "ann", &format!("entry {i} about the harbour"), "m1", 1);
    }
    remember(&engine, "ann", "the lighthouse keeper lied", "m1", 1);

    let query = MemoryQuery::new("ann", "m1", 1, 1);
    let memories = engine
        .memories_similar(&query, "the lighthouse keeper lied")
        .unwrap();
    assert_eq!(chunks(&memories), vec!["the lighthouse keeper lied"]);
}

#[test]
fn test_dimension_mismatch_is_rejected() {
    let mut state = NarrativeState::new(4, IndexKind::Flat);
    state
        .add_moment(narrative_state::Moment::new("m1", 1.0))
        .unwrap();
    state
        .add_character(narrative_state::Character::new("ann", "Ann"))
        .unwrap();
    let take = state.add_take(None, None, None).unwrap();

    let err = state
        .add_memory(
            NewMemory::new("ann", "x", ChunkType::Internal, "m1", take),
            vec![1.0; 3],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(state.stats().memories, 0);
}

#[test]
fn test_backend_dimension_must_match_config() {
    let err = match NarrativeEngine::new(
        Box::new(HashEmbedding::new(8)),
        EngineConfig::with_dimension(16),
    ) {
        Ok(_) => panic!("an 8-dimensional backend must not serve a 16-dimensional engine"),
        Err(err) => err,
    };
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(matches!(
        err,
        StateError::DimensionMismatch {
            expected: 16,
            got: 8
        }
    ));
}

// ==================== Dialogue ====================

#[test]
fn test_dialogue_writes_one_memory_per_participant() {
    let engine = hash_engine();
    let line = DialogueLine::new("ann", "meet me at the docks", "m2", 1)
        .heard_by("ben")
        .heard_by("cat");
    let receipt = engine.dialogue(&line).unwrap();
    assert_eq!(receipt.listener_memory_ids.len(), 2);
    assert_eq!(engine.stats().memories, 3);

    let said = engine.get_memory(receipt.speaker_memory_id).unwrap();
    assert_eq!(said.character_id, "ann");
    assert_eq!(said.chunk_type, ChunkType::Said);

    for (id, owner) in receipt.listener_memory_ids.iter().zip(["ben", "cat"]) {
        let heard = engine.get_memory(*id).unwrap();
        assert_eq!(heard.character_id, owner);
        assert_eq!(heard.chunk_type, ChunkType::Heard);
        assert_eq!(heard.chunk, "meet me at the docks");
    }
}

#[test]
fn test_dialogue_copies_diverge() {
    let engine = hash_engine();
    let line = DialogueLine::new("ann", "the map is fake", "m1", 1).heard_by("ben");
    let receipt = engine.dialogue(&line).unwrap();
    engine
        .archive_memory(receipt.listener_memory_ids[0], None)
        .unwrap();

    let ann = engine
        .memories_chronological(&MemoryQuery::new("ann", "m1", 1, 10))
        .unwrap();
    let ben = engine
        .memories_chronological(&MemoryQuery::new("ben", "m1", 1, 10))
        .unwrap();
    assert_eq!(ann.len(), 1);
    assert!(ben.is_empty());
}

#[test]
fn test_dialogue_unknown_listener_writes_nothing() {
    let engine = hash_engine();
    let line = DialogueLine::new("ann", "hello", "m1", 1).heard_by("ghost");
    let err = engine.dialogue(&line).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(engine.stats().memories, 0);
}

#[test]
fn test_dialogue_tags() {
    let engine = hash_engine();
    let mut speaker_tags = Metadata::new();
    speaker_tags.insert("tone".into(), "urgent".into());
    let mut listener_tags = Metadata::new();
    listener_tags.insert("trust".into(), "low".into());

    let line = DialogueLine::new("ann", "run", "m1", 1)
        .heard_by("ben")
        .speaker_tags(speaker_tags)
        .listener_tags(listener_tags);
    let receipt = engine.dialogue(&line).unwrap();

    let said = engine.get_memory(receipt.speaker_memory_id).unwrap();
    let heard = engine.get_memory(receipt.listener_memory_ids[0]).unwrap();
    assert_eq!(said.tags.get("tone").and_then(|v| v.as_str()), Some("urgent"));
    assert!(said.tags.get("trust").is_none());
    assert_eq!(heard.tags.get("trust").and_then(|v| v.as_str()), Some("low"));
}

// ==================== Archival & deletion ====================

#[test]
fn test_archived_memories_excluded_by_default() {
    let engine = keyword_engine();
    let old = remember(&engine, "ann", "sword", "m1", 1);
    let new = remember(&engine, "ann", "sword shield", "m2", 1);
    engine.archive_memory(old, Some(new)).unwrap();

    let archived = engine.get_memory(old).unwrap();
    assert!(archived.is_archived());
    assert_eq!(archived.superseded_by(), Some(new));

    let query = MemoryQuery::new("ann", "m5", 1, 10);
    assert_eq!(engine.memories_chronological(&query).unwrap().len(), 1);
    assert_eq!(engine.memories_similar(&query, "sword").unwrap().len(), 1);
    assert_eq!(engine.list_memories("ann", false).unwrap().len(), 1);

    let with_archived = query.include_archived(true);
    assert_eq!(engine.memories_chronological(&with_archived).unwrap().len(), 2);
    assert_eq!(engine.list_memories("ann", true).unwrap().len(), 2);
}

#[test]
fn test_archive_requires_existing_replacement() {
    let engine = hash_engine();
    let id = remember(&engine, "ann", "x", "m1", 1);
    let err = engine.archive_memory(id, Some(999)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!engine.get_memory(id).unwrap().is_archived());
}

#[test]
fn test_memory_cannot_supersede_itself() {
    let engine = hash_engine();
    let id = remember(&engine, "ann", "x", "m1", 1);
    let err = engine.archive_memory(id, Some(id)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let memory = engine.get_memory(id).unwrap();
    assert!(!memory.is_archived());
    assert_eq!(memory.superseded_by(), None);
}

#[test]
fn test_delete_memory_removes_vector() {
    let engine = keyword_engine();
    let id = remember(&engine, "ann", "sword", "m1", 1);
    engine.delete_memory(id).unwrap();

    let query = MemoryQuery::new("ann", "m1", 1, 5);
    assert!(engine.memories_similar(&query, "sword").unwrap().is_empty());
    assert_eq!(
        engine.delete_memory(id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_batch_embedding() {
    let engine = hash_engine();
    let ids = engine
        .embed_memories_batch(vec![
            NewMemory::new("ann", "one", ChunkType::Perceived, "m1", 1),
            NewMemory::new("ben", "two", ChunkType::Action, "m1", 1),
        ])
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(engine.get_memory(ids[1]).unwrap().chunk_type, ChunkType::Action);
}

#[test]
fn test_custom_chunk_type() {
    let engine = hash_engine();
    let id = engine
        .embed_memory(NewMemory::new(
            "ann",
            "a recurring dream",
            ChunkType::from_name("Dream"),
            "m1",
            1,
        ))
        .unwrap();
    let memory = engine.get_memory(id).unwrap();
    assert_eq!(memory.chunk_type, ChunkType::Other("dream".into()));
    assert_eq!(memory.chunk_type.to_string(), "dream");
}

// ==================== Composed state ====================

#[test]
fn test_query_state_composes_everything() {
    let engine = hash_engine();
    let mut traits = Metadata::new();
    traits.insert("bold".into(), true.into());
    engine
        .register_character("dee", "Dee", traits.clone(), Metadata::new())
        .unwrap();

    let f = engine.log_fact("the ship sails at dawn", "plot", "m1").unwrap();
    engine.log_knowledge("dee", f, "m2", 1, None).unwrap();
    remember(&engine, "dee", "packed a bag", "m2", 1);
    engine
        .load_corpus_chunk(NewCorpusChunk::new("Ships leave from pier nine.", "atlas"))
        .unwrap();

    let request = QueryRequest::new("dee", "m3", 1).with_corpus(CorpusFilter::any(), None);
    let state = engine.query_state(&request).unwrap();
    assert_eq!(state.character_id, "dee");
    assert_eq!(state.facts.len(), 1);
    assert_eq!(state.memories.len(), 1);
    assert_eq!(state.corpus.len(), 1);
    assert_eq!(state.traits, traits);

    let without_corpus = engine.query_state(&QueryRequest::new("dee", "m3", 1)).unwrap();
    assert!(without_corpus.corpus.is_empty());
}

#[test]
fn test_query_state_similarity_mode_keeps_facts_chronological() {
    let engine = keyword_engine();
    let a = engine.log_fact("a", "plot", "m1").unwrap();
    let b = engine.log_fact("b", "plot", "m1").unwrap();
    engine.log_knowledge("ann", b, "m1", 1, None).unwrap();
    engine.log_knowledge("ann", a, "m2", 1, None).unwrap();
    remember(&engine, "ann", "bread", "m1", 1);
    remember(&engine, "ann", "sword", "m2", 1);

    let request = QueryRequest::new("ann", "m3", 1).query_text("sword");
    let state = engine.query_state(&request).unwrap();
    let fact_ids: Vec<u64> = state.facts.iter().map(|f| f.id).collect();
    assert_eq!(fact_ids, vec![b, a]);
    assert_eq!(chunks(&state.memories), vec!["sword", "bread"]);
}

#[test]
fn test_query_state_unknown_character() {
    let engine = hash_engine();
    let err = engine
        .query_state(&QueryRequest::new("nobody", "m1", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("nobody"));
}

#[test]
fn test_query_state_excludes_archived() {
    let engine = hash_engine();
    let id = remember(&engine, "ann", "outdated", "m1", 1);
    engine.archive_memory(id, None).unwrap();

    let state = engine.query_state(&QueryRequest::new("ann", "m1", 1)).unwrap();
    assert!(state.memories.is_empty());
    let state = engine
        .query_state(&QueryRequest::new("ann", "m1", 1).include_archived(true))
        .unwrap();
    assert_eq!(state.memories.len(), 1);
}

#[test]
fn test_delete_character_destroys_index() {
    let engine = hash_engine();
    remember(&engine, "ann", "gone soon", "m1", 1);
    engine.delete_character("ann").unwrap();
    assert_eq!(engine.stats().memories, 0);

    engine
        .register_character("ann", "Ann again", Metadata::new(), Metadata::new())
        .unwrap();
    assert!(engine.list_memories("ann", true).unwrap().is_empty());
}
