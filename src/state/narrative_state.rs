//! Core state structure: every record plus the indexes over them.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::index::{IndexKind, MomentIndex, OwnerIndex, VectorIndex};
use crate::types::memory::{ARCHIVED_TAG, SUPERSEDED_BY_TAG};
use crate::types::moment::validate_sequence;
use crate::types::{
    Character, CorpusChunk, EntityKind, Fact, FactId, KnowledgeEvent, Memory, MemoryId, Moment,
    MomentUpdate, NewCorpusChunk, NewKnowledge, NewMemory, StateError, StateResult, Take, TakeId,
    TakeStatus, MAX_CHUNK_SIZE,
};

use super::lineage::{Ancestry, TakeForest};

/// Next ids to hand out. Ids are never reused, even after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounters {
    pub next_fact_id: u64,
    pub next_knowledge_id: u64,
    pub next_memory_id: u64,
    pub next_chunk_id: u64,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self {
            next_fact_id: 1,
            next_knowledge_id: 1,
            next_memory_id: 1,
            next_chunk_id: 1,
        }
    }
}

/// Every record of a state, without indexes or vectors (used by snapshots).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateParts {
    pub moments: Vec<Moment>,
    pub takes: Vec<Take>,
    pub characters: Vec<Character>,
    pub facts: Vec<Fact>,
    pub knowledge: Vec<KnowledgeEvent>,
    pub memories: Vec<Memory>,
    pub corpus: Vec<CorpusChunk>,
    pub counters: IdCounters,
}

/// Record counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateStats {
    pub moments: usize,
    pub takes: usize,
    pub characters: usize,
    pub facts: usize,
    pub knowledge_events: usize,
    pub memories: usize,
    pub archived_memories: usize,
    pub corpus_chunks: usize,
}

/// The in-memory store: moments, the take forest, characters with their
/// vector indexes, facts, knowledge events, memories and the corpus.
///
/// Mutators enforce referential sanity and uniqueness; they do not embed
/// text (vectors are passed in).
pub struct NarrativeState {
    dimension: usize,
    index_kind: IndexKind,
    moments: HashMap<String, Moment>,
    moment_index: MomentIndex,
    takes: TakeForest,
    characters: BTreeMap<String, Character>,
    /// One vector index per registered character.
    memory_indexes: HashMap<String, Box<dyn VectorIndex>>,
    facts: BTreeMap<FactId, Fact>,
    knowledge: BTreeMap<u64, KnowledgeEvent>,
    knowledge_by_character: OwnerIndex,
    memories: BTreeMap<MemoryId, Memory>,
    memories_by_character: OwnerIndex,
    corpus: BTreeMap<u64, CorpusChunk>,
    corpus_index: Box<dyn VectorIndex>,
    counters: IdCounters,
}

impl std::fmt::Debug for NarrativeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativeState")
            .field("dimension", &self.dimension)
            .field("index_kind", &self.index_kind)
            .field("moments", &self.moments.len())
            .field("characters", &self.characters.len())
            .field("facts", &self.facts.len())
            .field("knowledge", &self.knowledge.len())
            .field("memories", &self.memories.len())
            .field("corpus", &self.corpus.len())
            .finish_non_exhaustive()
    }
}

impl NarrativeState {
    /// Create a new empty state.
    pub fn new(dimension: usize, index_kind: IndexKind) -> Self {
        Self {
            dimension,
            index_kind,
            moments: HashMap::new(),
            moment_index: MomentIndex::new(),
            takes: TakeForest::new(),
            characters: BTreeMap::new(),
            memory_indexes: HashMap::new(),
            facts: BTreeMap::new(),
            knowledge: BTreeMap::new(),
            knowledge_by_character: OwnerIndex::new(),
            memories: BTreeMap::new(),
            memories_by_character: OwnerIndex::new(),
            corpus: BTreeMap::new(),
            corpus_index: index_kind.create(dimension),
            counters: IdCounters::default(),
        }
    }

    /// Create from stored records (used by the snapshot reader).
    ///
    /// `memory_vectors[i]` belongs to `parts.memories[i]`, and likewise for
    /// the corpus.
    pub fn from_parts(
        parts: StateParts,
        memory_vectors: Vec<Vec<f32>>,
        corpus_vectors: Vec<Vec<f32>>,
        dimension: usize,
        index_kind: IndexKind,
    ) -> StateResult<Self> {
        if memory_vectors.len() != parts.memories.len()
            || corpus_vectors.len() != parts.corpus.len()
        {
            return Err(StateError::Serialization(
                "vector count does not match record count".into(),
            ));
        }

        let mut state = Self::new(dimension, index_kind);
        state.takes = TakeForest::from_takes(parts.takes)?;

        for mut moment in parts.moments {
            moment.sequence += 0.0;
            if !state.moment_index.insert(moment.sequence, &moment.id) {
                return Err(StateError::Serialization(format!(
                    "duplicate moment sequence {}",
                    moment.sequence
                )));
            }
            state.moments.insert(moment.id.clone(), moment);
        }

        for character in parts.characters {
            state
                .memory_indexes
                .insert(character.id.clone(), index_kind.create(dimension));
            state.characters.insert(character.id.clone(), character);
        }

        for fact in parts.facts {
            state.facts.insert(fact.id, fact);
        }

        for event in parts.knowledge {
            state
                .knowledge_by_character
                .add(&event.character_id, event.id);
            state.knowledge.insert(event.id, event);
        }

        for (memory, vector) in parts.memories.into_iter().zip(memory_vectors) {
            let index = state
                .memory_indexes
                .get_mut(&memory.character_id)
                .ok_or_else(|| {
                    StateError::Serialization(format!(
                        "memory {} belongs to unknown character '{}'",
                        memory.id, memory.character_id
                    ))
                })?;
            index.insert(memory.id, vector)?;
            state
                .memories_by_character
                .add(&memory.character_id, memory.id);
            state.memories.insert(memory.id, memory);
        }

        for (chunk, vector) in parts.corpus.into_iter().zip(corpus_vectors) {
            state.corpus_index.insert(chunk.id, vector)?;
            state.corpus.insert(chunk.id, chunk);
        }

        state.counters = parts.counters;
        Ok(state)
    }

    /// Split into records plus the vectors aligned with memories and corpus.
    pub fn to_parts(&self) -> (StateParts, Vec<Vec<f32>>, Vec<Vec<f32>>) {
        let moments: Vec<Moment> = self.moments_ordered().into_iter().cloned().collect();

        let memories: Vec<Memory> = self.memories.values().cloned().collect();
        let memory_vectors = memories
            .iter()
            .map(|m| {
                self.memory_indexes
                    .get(&m.character_id)
                    .and_then(|idx| idx.get(m.id))
                    .map(|v| v.to_vec())
                    .unwrap_or_else(|| vec![0.0; self.dimension])
            })
            .collect();

        let corpus: Vec<CorpusChunk> = self.corpus.values().cloned().collect();
        let corpus_vectors = corpus
            .iter()
            .map(|c| {
                self.corpus_index
                    .get(c.id)
                    .map(|v| v.to_vec())
                    .unwrap_or_else(|| vec![0.0; self.dimension])
            })
            .collect();

        let parts = StateParts {
            moments,
            takes: self.takes.takes().to_vec(),
            characters: self.characters.values().cloned().collect(),
            facts: self.facts.values().cloned().collect(),
            knowledge: self.knowledge.values().cloned().collect(),
            memories,
            corpus,
            counters: self.counters,
        };
        (parts, memory_vectors, corpus_vectors)
    }

    /// The vector dimension for this state.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The index implementation used for new vector indexes.
    pub fn index_kind(&self) -> IndexKind {
        self.index_kind
    }

    // ==================== Moments ====================

    /// Register a moment. Ids and sequences must both be unique.
    pub fn add_moment(&mut self, mut moment: Moment) -> StateResult<()> {
        const OP: &str = "create_moment";
        moment.validate(OP)?;
        // -0.0 and 0.0 are one position in narrative time.
        moment.sequence += 0.0;
        if self.moments.contains_key(&moment.id) {
            return Err(StateError::conflict(
                OP,
                format!("moment '{}' already exists", moment.id),
            ));
        }
        if let Some(holder) = self.moment_index.id_at(moment.sequence) {
            return Err(StateError::invalid(
                OP,
                format!(
                    "sequence {} is already used by moment '{}'",
                    moment.sequence, holder
                ),
            ));
        }
        self.moment_index.insert(moment.sequence, &moment.id);
        self.moments.insert(moment.id.clone(), moment);
        Ok(())
    }

    /// Get a moment by id.
    pub fn get_moment(&self, id: &str) -> Option<&Moment> {
        self.moments.get(id)
    }

    /// Get a moment by id, failing with `NotFound` for `op`.
    pub fn require_moment(&self, op: &'static str, id: &str) -> StateResult<&Moment> {
        self.moments
            .get(id)
            .ok_or_else(|| StateError::not_found(op, EntityKind::Moment, id))
    }

    /// Sequence of a moment, if it exists.
    pub fn sequence_of(&self, id: &str) -> Option<f64> {
        self.moments.get(id).map(|m| m.sequence)
    }

    /// Apply a partial update. A new sequence must still be unique.
    pub fn update_moment(&mut self, id: &str, update: MomentUpdate) -> StateResult<Moment> {
        const OP: &str = "update_moment";
        let current = self.require_moment(OP, id)?.sequence;

        if let Some(sequence) = update.sequence {
            validate_sequence(OP, sequence)?;
            if sequence != current {
                if let Some(holder) = self.moment_index.id_at(sequence) {
                    return Err(StateError::invalid(
                        OP,
                        format!("sequence {sequence} is already used by moment '{holder}'"),
                    ));
                }
                self.moment_index.remove(current);
                self.moment_index.insert(sequence, id);
            }
        }

        let moment = self
            .moments
            .get_mut(id)
            .ok_or_else(|| StateError::not_found(OP, EntityKind::Moment, id))?;
        if let Some(sequence) = update.sequence {
            moment.sequence = sequence + 0.0;
        }
        if let Some(label) = update.label {
            moment.label = Some(label);
        }
        if let Some(metadata) = update.metadata {
            moment.metadata = metadata;
        }
        Ok(moment.clone())
    }

    /// Delete a moment. Records that reference it are left untouched.
    pub fn remove_moment(&mut self, id: &str) -> StateResult<Moment> {
        let moment = self
            .moments
            .remove(id)
            .ok_or_else(|| StateError::not_found("delete_moment", EntityKind::Moment, id))?;
        self.moment_index.remove(moment.sequence);
        Ok(moment)
    }

    /// All moments, ascending by sequence.
    pub fn moments_ordered(&self) -> Vec<&Moment> {
        self.moment_index
            .ordered_ids()
            .into_iter()
            .filter_map(|id| self.moments.get(id))
            .collect()
    }

    // ==================== Takes ====================

    /// Create a take. `parent` and `branch_point`, if given, must exist.
    pub fn add_take(
        &mut self,
        parent: Option<TakeId>,
        branch_point: Option<String>,
        notes: Option<String>,
    ) -> StateResult<TakeId> {
        if let Some(bp) = &branch_point {
            self.require_moment("create_take", bp)?;
        }
        self.takes.create(parent, branch_point, notes)
    }

    /// Change a take's status.
    pub fn set_take_status(&mut self, id: TakeId, status: TakeStatus) -> StateResult<()> {
        self.takes.set_status(id, status)
    }

    /// The take forest.
    pub fn takes(&self) -> &TakeForest {
        &self.takes
    }

    /// The ancestry of a take.
    pub fn ancestry(&self, take_id: TakeId) -> StateResult<Ancestry> {
        self.takes.ancestry(take_id)
    }

    // ==================== Characters ====================

    /// Register a character and create its vector index.
    pub fn add_character(&mut self, character: Character) -> StateResult<()> {
        const OP: &str = "register_character";
        if character.id.trim().is_empty() {
            return Err(StateError::invalid(OP, "character id must not be empty"));
        }
        if self.characters.contains_key(&character.id) {
            return Err(StateError::conflict(
                OP,
                format!("character '{}' already registered", character.id),
            ));
        }
        self.memory_indexes.insert(
            character.id.clone(),
            self.index_kind.create(self.dimension),
        );
        self.characters.insert(character.id.clone(), character);
        Ok(())
    }

    /// Get a character by id.
    pub fn get_character(&self, id: &str) -> Option<&Character> {
        self.characters.get(id)
    }

    /// Get a character by id, failing with `NotFound` for `op`.
    pub fn require_character(&self, op: &'static str, id: &str) -> StateResult<&Character> {
        self.characters
            .get(id)
            .ok_or_else(|| StateError::not_found(op, EntityKind::Character, id))
    }

    /// All characters, ascending by id.
    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    /// Remove a character, its vector index, memories and knowledge events.
    pub fn remove_character(&mut self, id: &str) -> StateResult<Character> {
        let character = self
            .characters
            .remove(id)
            .ok_or_else(|| StateError::not_found("delete_character", EntityKind::Character, id))?;
        self.memory_indexes.remove(id);
        for memory_id in self.memories_by_character.remove_owner(id) {
            self.memories.remove(&memory_id);
        }
        for event_id in self.knowledge_by_character.remove_owner(id) {
            self.knowledge.remove(&event_id);
        }
        Ok(character)
    }

    /// A character's memory vector index.
    pub fn memory_index(&self, character_id: &str) -> Option<&dyn VectorIndex> {
        self.memory_indexes.get(character_id).map(|b| b.as_ref())
    }

    // ==================== Facts & knowledge ====================

    /// Record a world fact created at `moment_id`.
    pub fn add_fact(&mut self, content: &str, category: &str, moment_id: &str) -> StateResult<FactId> {
        const OP: &str = "log_fact";
        check_text(OP, content)?;
        self.require_moment(OP, moment_id)?;
        let id = self.counters.next_fact_id;
        self.counters.next_fact_id += 1;
        self.facts.insert(
            id,
            Fact {
                id,
                content: content.to_string(),
                category: category.to_string(),
                created_at: moment_id.to_string(),
            },
        );
        Ok(id)
    }

    /// Get a fact by id.
    pub fn get_fact(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(&id)
    }

    /// All facts, ascending by id.
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.facts.values()
    }

    /// Edit a fact's content and/or category in place.
    pub fn update_fact(
        &mut self,
        id: FactId,
        content: Option<&str>,
        category: Option<&str>,
    ) -> StateResult<Fact> {
        const OP: &str = "update_fact";
        if let Some(content) = content {
            check_text(OP, content)?;
        }
        let fact = self
            .facts
            .get_mut(&id)
            .ok_or_else(|| StateError::not_found(OP, EntityKind::Fact, id))?;
        if let Some(content) = content {
            fact.content = content.to_string();
        }
        if let Some(category) = category {
            fact.category = category.to_string();
        }
        Ok(fact.clone())
    }

    /// Remove a fact together with every knowledge event about it.
    /// Returns the fact and the number of knowledge events removed.
    pub fn remove_fact(&mut self, id: FactId) -> StateResult<(Fact, usize)> {
        let fact = self
            .facts
            .remove(&id)
            .ok_or_else(|| StateError::not_found("delete_fact", EntityKind::Fact, id))?;
        let doomed: Vec<(u64, String)> = self
            .knowledge
            .values()
            .filter(|e| e.fact_id == id)
            .map(|e| (e.id, e.character_id.clone()))
            .collect();
        for (event_id, owner) in &doomed {
            self.knowledge.remove(event_id);
            self.knowledge_by_character.remove(owner, *event_id);
        }
        Ok((fact, doomed.len()))
    }

    /// Record that a character learned a fact.
    pub fn add_knowledge(&mut self, input: NewKnowledge) -> StateResult<u64> {
        const OP: &str = "log_knowledge";
        self.require_character(OP, &input.character_id)?;
        if !self.facts.contains_key(&input.fact_id) {
            return Err(StateError::not_found(OP, EntityKind::Fact, input.fact_id));
        }
        self.require_moment(OP, &input.moment_id)?;
        self.takes.require(OP, input.take_id)?;

        let id = self.counters.next_knowledge_id;
        self.counters.next_knowledge_id += 1;
        self.knowledge_by_character.add(&input.character_id, id);
        self.knowledge.insert(
            id,
            KnowledgeEvent {
                id,
                character_id: input.character_id,
                fact_id: input.fact_id,
                moment_id: input.moment_id,
                take_id: input.take_id,
                source: input.source,
            },
        );
        Ok(id)
    }

    /// Every knowledge event of a character, ascending by id.
    pub fn knowledge_of(&self, character_id: &str) -> Vec<&KnowledgeEvent> {
        self.knowledge_by_character
            .get(character_id)
            .iter()
            .filter_map(|id| self.knowledge.get(id))
            .collect()
    }

    // ==================== Memories ====================

    /// Store a memory and its embedding in the owner's index.
    pub fn add_memory(&mut self, input: NewMemory, vector: Vec<f32>) -> StateResult<MemoryId> {
        const OP: &str = "embed_memory";
        check_text(OP, &input.chunk)?;
        self.require_character(OP, &input.character_id)?;
        self.require_moment(OP, &input.moment_id)?;
        self.takes.require(OP, input.take_id)?;

        let id = self.counters.next_memory_id;
        let index = self
            .memory_indexes
            .get_mut(&input.character_id)
            .ok_or_else(|| StateError::not_found(OP, EntityKind::Character, &input.character_id))?;
        index.insert(id, vector)?;
        self.counters.next_memory_id += 1;

        self.memories_by_character.add(&input.character_id, id);
        self.memories.insert(
            id,
            Memory {
                id,
                character_id: input.character_id,
                chunk: input.chunk,
                chunk_type: input.chunk_type,
                moment_id: input.moment_id,
                take_id: input.take_id,
                tags: input.tags,
            },
        );
        Ok(id)
    }

    /// Get a memory by id.
    pub fn get_memory(&self, id: MemoryId) -> Option<&Memory> {
        self.memories.get(&id)
    }

    /// Every memory of a character, ascending by id.
    pub fn memories_of(&self, character_id: &str) -> Vec<&Memory> {
        self.memories_by_character
            .get(character_id)
            .iter()
            .filter_map(|id| self.memories.get(id))
            .collect()
    }

    /// Soft-delete a memory by tagging it `archived`, optionally recording
    /// its replacement.
    pub fn archive_memory(
        &mut self,
        id: MemoryId,
        superseded_by: Option<MemoryId>,
    ) -> StateResult<()> {
        const OP: &str = "archive_memory";
        if let Some(replacement) = superseded_by {
            if replacement == id {
                return Err(StateError::invalid(OP, "a memory cannot supersede itself"));
            }
            if !self.memories.contains_key(&replacement) {
                return Err(StateError::not_found(OP, EntityKind::Memory, replacement));
            }
        }
        let memory = self
            .memories
            .get_mut(&id)
            .ok_or_else(|| StateError::not_found(OP, EntityKind::Memory, id))?;
        memory
            .tags
            .insert(ARCHIVED_TAG.to_string(), serde_json::Value::Bool(true));
        if let Some(replacement) = superseded_by {
            memory
                .tags
                .insert(SUPERSEDED_BY_TAG.to_string(), replacement.into());
        }
        Ok(())
    }

    /// Remove a memory and its vector.
    pub fn remove_memory(&mut self, id: MemoryId) -> StateResult<Memory> {
        let memory = self
            .memories
            .remove(&id)
            .ok_or_else(|| StateError::not_found("delete_memory", EntityKind::Memory, id))?;
        if let Some(index) = self.memory_indexes.get_mut(&memory.character_id) {
            index.remove(id);
        }
        self.memories_by_character.remove(&memory.character_id, id);
        Ok(memory)
    }

    // ==================== Corpus ====================

    /// Store a corpus chunk and its embedding in the shared index.
    pub fn add_corpus_chunk(&mut self, input: NewCorpusChunk, vector: Vec<f32>) -> StateResult<u64> {
        const OP: &str = "load_corpus_chunk";
        check_text(OP, &input.content)?;
        if input.source.trim().is_empty() {
            return Err(StateError::invalid(OP, "corpus source must not be empty"));
        }
        let id = self.counters.next_chunk_id;
        self.corpus_index.insert(id, vector)?;
        self.counters.next_chunk_id += 1;
        self.corpus.insert(
            id,
            CorpusChunk {
                id,
                content: input.content,
                source: input.source,
                section: input.section,
                category: input.category,
                version: input.version,
                metadata: input.metadata,
            },
        );
        Ok(id)
    }

    /// Get a corpus chunk by id.
    pub fn get_corpus_chunk(&self, id: u64) -> Option<&CorpusChunk> {
        self.corpus.get(&id)
    }

    /// All corpus chunks, ascending by load order.
    pub fn corpus_chunks(&self) -> impl DoubleEndedIterator<Item = &CorpusChunk> {
        self.corpus.values()
    }

    /// The shared corpus vector index.
    pub fn corpus_index(&self) -> &dyn VectorIndex {
        self.corpus_index.as_ref()
    }

    /// Remove every chunk from `source` (and `version`, if given).
    /// Returns the removed ids.
    pub fn remove_corpus_source(&mut self, source: &str, version: Option<&str>) -> Vec<u64> {
        let doomed: Vec<u64> = self
            .corpus
            .values()
            .filter(|c| c.source == source)
            .filter(|c| version.map_or(true, |v| c.version.as_deref() == Some(v)))
            .map(|c| c.id)
            .collect();
        for id in &doomed {
            self.corpus.remove(id);
            self.corpus_index.remove(*id);
        }
        doomed
    }

    // ==================== Stats ====================

    /// Record counts.
    pub fn stats(&self) -> StateStats {
        StateStats {
            moments: self.moments.len(),
            takes: self.takes.len(),
            characters: self.characters.len(),
            facts: self.facts.len(),
            knowledge_events: self.knowledge.len(),
            memories: self.memories.len(),
            archived_memories: self.memories.values().filter(|m| m.is_archived()).count(),
            corpus_chunks: self.corpus.len(),
        }
    }
}

fn check_text(op: &'static str, text: &str) -> StateResult<()> {
    if text.len() > MAX_CHUNK_SIZE {
        return Err(StateError::invalid(
            op,
            format!("text exceeds maximum size: {} > {}", text.len(), MAX_CHUNK_SIZE),
        ));
    }
    Ok(())
}
