//! The engine facade: state behind a lock, plus an embedding backend.

use std::path::Path;

use parking_lot::RwLock;

use crate::config::EngineConfig;
use crate::embedding::EmbeddingBackend;
use crate::format::{SnapshotReader, SnapshotWriter};
use crate::state::{Ancestry, NarrativeState, StateStats};
use crate::types::{
    Character, CharacterState, CorpusChunk, CorpusFilter, DialogueLine, DialogueReceipt,
    EntityKind, Fact, FactId, KnowledgeEvent, KnowledgeSource, KnownFact, Memory, MemoryId,
    Metadata, Moment, MomentUpdate, NewCorpusChunk, NewFact, NewKnowledge, NewMemory, StateError,
    StateResult, Take, TakeId, TakeStatus,
};

use super::chunker::DocumentChunker;
use super::query::{MemoryQuery, QueryEngine, QueryRequest};
use super::write::WriteEngine;

/// Thread-safe narrative knowledge engine.
///
/// Reads share the lock; writes hold it exclusively, which serialises
/// moment-sequence checks, take-id allocation and every vector-index
/// mutation. Text is embedded before the lock is taken.
pub struct NarrativeEngine {
    state: RwLock<NarrativeState>,
    backend: Box<dyn EmbeddingBackend>,
    config: EngineConfig,
    query: QueryEngine,
    write: WriteEngine,
}

impl NarrativeEngine {
    /// Create an engine over empty state.
    pub fn new(backend: Box<dyn EmbeddingBackend>, config: EngineConfig) -> StateResult<Self> {
        Self::check_backend(backend.as_ref(), &config)?;
        let state = NarrativeState::new(config.dimension, config.index_kind()?);
        Ok(Self::assemble(state, backend, config))
    }

    /// Create an engine over existing state, e.g. one built with
    /// [`StateBuilder`](crate::state::StateBuilder).
    pub fn with_state(
        state: NarrativeState,
        backend: Box<dyn EmbeddingBackend>,
        config: EngineConfig,
    ) -> StateResult<Self> {
        Self::check_backend(backend.as_ref(), &config)?;
        if state.dimension() != config.dimension {
            return Err(StateError::DimensionMismatch {
                expected: config.dimension,
                got: state.dimension(),
            });
        }
        Ok(Self::assemble(state, backend, config))
    }

    /// Open an .nstate snapshot.
    pub fn open(
        path: &Path,
        backend: Box<dyn EmbeddingBackend>,
        config: EngineConfig,
    ) -> StateResult<Self> {
        Self::check_backend(backend.as_ref(), &config)?;
        let header = SnapshotReader::read_header(path)?;
        if header.dimension as usize != config.dimension {
            return Err(StateError::DimensionMismatch {
                expected: config.dimension,
                got: header.dimension as usize,
            });
        }
        let state = SnapshotReader::read_from_file(path, config.index_kind()?)?;
        log::info!(
            "opened {} ({} moments, {} memories, {} corpus chunks)",
            path.display(),
            header.moment_count,
            header.memory_count,
            header.corpus_count
        );
        Ok(Self::assemble(state, backend, config))
    }

    /// Write the current state to an .nstate snapshot.
    pub fn save(&self, path: &Path) -> StateResult<()> {
        let state = self.state.read();
        SnapshotWriter::new(self.config.dimension).write_to_file(&state, path)?;
        log::info!("saved {}", path.display());
        Ok(())
    }

    fn assemble(state: NarrativeState, backend: Box<dyn EmbeddingBackend>, config: EngineConfig) -> Self {
        Self {
            state: RwLock::new(state),
            backend,
            query: QueryEngine::new(config.retrieval.clone()),
            write: WriteEngine::new(config.dimension),
            config,
        }
    }

    fn check_backend(backend: &dyn EmbeddingBackend, config: &EngineConfig) -> StateResult<()> {
        config.validate()?;
        if backend.dimensions() != config.dimension {
            return Err(StateError::DimensionMismatch {
                expected: config.dimension,
                got: backend.dimensions(),
            });
        }
        Ok(())
    }

    fn embed(&self, text: &str) -> StateResult<Vec<f32>> {
        let vector = self.backend.embed(text)?;
        if vector.len() != self.config.dimension {
            return Err(StateError::DimensionMismatch {
                expected: self.config.dimension,
                got: vector.len(),
            });
        }
        Ok(vector)
    }

    fn embed_all(&self, texts: &[&str]) -> StateResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.backend.embed_batch(texts)
    }

    /// The configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Record counts.
    pub fn stats(&self) -> StateStats {
        self.state.read().stats()
    }

    // ==================== Moments ====================

    /// Register a moment.
    pub fn create_moment(
        &self,
        id: &str,
        sequence: f64,
        label: Option<&str>,
        metadata: Metadata,
    ) -> StateResult<Moment> {
        let mut moment = Moment::new(id, sequence).with_metadata(metadata);
        if let Some(label) = label {
            moment = moment.with_label(label);
        }
        self.state.write().add_moment(moment.clone())?;
        log::debug!("create_moment: '{id}' at {sequence}");
        Ok(moment)
    }

    /// Get a moment.
    pub fn get_moment(&self, id: &str) -> StateResult<Moment> {
        self.state
            .read()
            .require_moment("get_moment", id)
            .map(Clone::clone)
    }

    /// All moments, ascending by sequence.
    pub fn list_moments(&self) -> Vec<Moment> {
        self.state
            .read()
            .moments_ordered()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Update a moment's label, metadata or sequence.
    pub fn update_moment(&self, id: &str, update: MomentUpdate) -> StateResult<Moment> {
        self.state.write().update_moment(id, update)
    }

    /// Delete a moment. Records tagged with it are kept but no longer
    /// pass any temporal gate.
    pub fn delete_moment(&self, id: &str) -> StateResult<()> {
        self.state.write().remove_moment(id)?;
        log::debug!("delete_moment: '{id}'");
        Ok(())
    }

    // ==================== Takes ====================

    /// Create a take: a fresh root when `parent` is `None`.
    pub fn create_take(
        &self,
        parent: Option<TakeId>,
        branch_point: Option<&str>,
        notes: Option<&str>,
    ) -> StateResult<TakeId> {
        let id = self.state.write().add_take(
            parent,
            branch_point.map(str::to_string),
            notes.map(str::to_string),
        )?;
        log::debug!("create_take: {id} (parent {parent:?})");
        Ok(id)
    }

    /// Branch a new take from `parent` at `branch_point`.
    pub fn branch(
        &self,
        parent: TakeId,
        branch_point: &str,
        notes: Option<&str>,
    ) -> StateResult<TakeId> {
        self.create_take(Some(parent), Some(branch_point), notes)
    }

    /// Get a take.
    pub fn get_take(&self, id: TakeId) -> StateResult<Take> {
        self.state
            .read()
            .takes()
            .require("get_take", id)
            .map(Clone::clone)
    }

    /// Takes matching optional status and branch point filters.
    pub fn list_takes(&self, status: Option<TakeStatus>, branch_point: Option<&str>) -> Vec<Take> {
        self.state
            .read()
            .takes()
            .list(status, branch_point)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Set a take's status from its name.
    pub fn set_take_status(&self, id: TakeId, status: &str) -> StateResult<()> {
        let parsed = TakeStatus::from_name(status).ok_or_else(|| {
            StateError::invalid(
                "set_take_status",
                format!("unknown status '{status}' (expected active, archived or trunk)"),
            )
        })?;
        self.state.write().set_take_status(id, parsed)
    }

    /// The take and its ancestors up to the root.
    pub fn get_ancestry(&self, id: TakeId) -> StateResult<Ancestry> {
        self.state.read().ancestry(id)
    }

    /// Direct children of a take.
    pub fn children(&self, id: TakeId) -> StateResult<Vec<TakeId>> {
        let state = self.state.read();
        state.takes().require("children", id)?;
        Ok(state.takes().children(id))
    }

    // ==================== Characters ====================

    /// Register a character and create its memory index.
    pub fn register_character(
        &self,
        id: &str,
        name: &str,
        traits: Metadata,
        voice: Metadata,
    ) -> StateResult<Character> {
        let character = Character::new(id, name)
            .with_traits(traits)
            .with_voice(voice);
        self.state.write().add_character(character.clone())?;
        log::debug!("register_character: '{id}'");
        Ok(character)
    }

    /// Get a character.
    pub fn get_character(&self, id: &str) -> StateResult<Character> {
        self.state
            .read()
            .require_character("get_character", id)
            .map(Clone::clone)
    }

    /// All characters, ascending by id.
    pub fn list_characters(&self) -> Vec<Character> {
        self.state.read().characters().cloned().collect()
    }

    /// Remove a character with its index, memories and knowledge.
    pub fn delete_character(&self, id: &str) -> StateResult<()> {
        self.state.write().remove_character(id)?;
        log::debug!("delete_character: '{id}'");
        Ok(())
    }

    // ==================== Facts & knowledge ====================

    /// Record a world fact.
    pub fn log_fact(&self, content: &str, category: &str, moment_id: &str) -> StateResult<FactId> {
        let id = self.state.write().add_fact(content, category, moment_id)?;
        log::debug!("log_fact: {id} at '{moment_id}'");
        Ok(id)
    }

    /// Record several facts; earlier facts stay if a later one fails.
    pub fn log_facts_batch(&self, facts: &[NewFact]) -> StateResult<Vec<FactId>> {
        let mut state = self.state.write();
        self.write.log_facts_batch(&mut state, facts)
    }

    /// Get a fact.
    pub fn get_fact(&self, id: FactId) -> StateResult<Fact> {
        self.state
            .read()
            .get_fact(id)
            .cloned()
            .ok_or_else(|| StateError::not_found("get_fact", EntityKind::Fact, id))
    }

    /// Edit a fact's content and/or category.
    pub fn update_fact(
        &self,
        id: FactId,
        content: Option<&str>,
        category: Option<&str>,
    ) -> StateResult<Fact> {
        self.state.write().update_fact(id, content, category)
    }

    /// Delete a fact and its knowledge events.
    pub fn delete_fact(&self, id: FactId) -> StateResult<()> {
        let (_, events) = self.state.write().remove_fact(id)?;
        log::debug!("delete_fact: {id} ({events} knowledge events)");
        Ok(())
    }

    /// Record that a character learned a fact.
    pub fn log_knowledge(
        &self,
        character_id: &str,
        fact_id: FactId,
        moment_id: &str,
        take_id: TakeId,
        source: Option<KnowledgeSource>,
    ) -> StateResult<u64> {
        let mut input = NewKnowledge::new(character_id, fact_id, moment_id, take_id);
        input.source = source;
        let id = self.state.write().add_knowledge(input)?;
        log::debug!("log_knowledge: '{character_id}' learned {fact_id} at '{moment_id}' in {take_id}");
        Ok(id)
    }

    /// Like [`log_knowledge`](Self::log_knowledge), parsing the source name.
    pub fn log_knowledge_named(
        &self,
        character_id: &str,
        fact_id: FactId,
        moment_id: &str,
        take_id: TakeId,
        source: Option<&str>,
    ) -> StateResult<u64> {
        let source = source.map(parse_source).transpose()?;
        self.log_knowledge(character_id, fact_id, moment_id, take_id, source)
    }

    /// Record several knowledge events.
    pub fn log_knowledge_batch(&self, events: Vec<NewKnowledge>) -> StateResult<Vec<u64>> {
        let mut state = self.state.write();
        self.write.log_knowledge_batch(&mut state, events)
    }

    /// Every knowledge event of a character, ungated.
    pub fn knowledge_of(&self, character_id: &str) -> StateResult<Vec<KnowledgeEvent>> {
        let state = self.state.read();
        state.require_character("knowledge_of", character_id)?;
        Ok(state.knowledge_of(character_id).into_iter().cloned().collect())
    }

    /// Facts the character knows at a moment on a take.
    pub fn facts_for(
        &self,
        character_id: &str,
        moment_id: &str,
        take_id: TakeId,
        limit: usize,
    ) -> StateResult<Vec<KnownFact>> {
        self.query
            .facts_for(&self.state.read(), character_id, moment_id, take_id, limit)
    }

    // ==================== Memories ====================

    /// Embed and store one memory.
    pub fn embed_memory(&self, memory: NewMemory) -> StateResult<MemoryId> {
        let vector = self.embed(&memory.chunk)?;
        let id = self.state.write().add_memory(memory, vector)?;
        log::debug!("embed_memory: {id}");
        Ok(id)
    }

    /// Embed and store several memories with one backend call.
    pub fn embed_memories_batch(&self, memories: Vec<NewMemory>) -> StateResult<Vec<MemoryId>> {
        let texts: Vec<&str> = memories.iter().map(|m| m.chunk.as_str()).collect();
        let vectors = self.embed_all(&texts)?;
        let mut state = self.state.write();
        self.write.embed_memories_batch(&mut state, memories, vectors)
    }

    /// One `said` memory for the speaker, one `heard` memory per listener.
    pub fn dialogue(&self, line: &DialogueLine) -> StateResult<DialogueReceipt> {
        let vector = self.embed(&line.content)?;
        let mut state = self.state.write();
        self.write.dialogue(&mut state, line, vector)
    }

    /// Get a memory.
    pub fn get_memory(&self, id: MemoryId) -> StateResult<Memory> {
        self.state
            .read()
            .get_memory(id)
            .cloned()
            .ok_or_else(|| StateError::not_found("get_memory", EntityKind::Memory, id))
    }

    /// Soft-delete a memory.
    pub fn archive_memory(&self, id: MemoryId, superseded_by: Option<MemoryId>) -> StateResult<()> {
        self.state.write().archive_memory(id, superseded_by)?;
        log::debug!("archive_memory: {id} (superseded by {superseded_by:?})");
        Ok(())
    }

    /// Remove a memory and its vector.
    pub fn delete_memory(&self, id: MemoryId) -> StateResult<()> {
        self.state.write().remove_memory(id)?;
        log::debug!("delete_memory: {id}");
        Ok(())
    }

    /// Every memory of a character, ascending by id.
    pub fn list_memories(&self, character_id: &str, include_archived: bool) -> StateResult<Vec<Memory>> {
        self.query
            .list_memories(&self.state.read(), character_id, include_archived)
    }

    /// Gated memories in moment order.
    pub fn memories_chronological(&self, query: &MemoryQuery) -> StateResult<Vec<Memory>> {
        self.query.memories_chronological(&self.state.read(), query)
    }

    /// Gated memories ranked by similarity to `query_text`.
    pub fn memories_similar(&self, query: &MemoryQuery, query_text: &str) -> StateResult<Vec<Memory>> {
        let vector = self.embed(query_text)?;
        self.query
            .memories_similar(&self.state.read(), query, &vector)
    }

    // ==================== Corpus ====================

    /// Embed and store one corpus chunk.
    pub fn load_corpus_chunk(&self, chunk: NewCorpusChunk) -> StateResult<u64> {
        let vector = self.embed(&chunk.content)?;
        let id = self.state.write().add_corpus_chunk(chunk, vector)?;
        log::debug!("load_corpus_chunk: {id}");
        Ok(id)
    }

    /// Embed and store several corpus chunks with one backend call.
    pub fn load_corpus_batch(&self, chunks: Vec<NewCorpusChunk>) -> StateResult<Vec<u64>> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.embed_all(&texts)?;
        let count = chunks.len();
        let mut state = self.state.write();
        let ids = self.write.load_corpus_batch(&mut state, chunks, vectors)?;
        log::info!("load_corpus_batch: loaded {count} chunks");
        Ok(ids)
    }

    /// Chunk a document and load every chunk with the provenance of
    /// `template` (its content is ignored).
    pub fn ingest_document(
        &self,
        text: &str,
        chunker: &dyn DocumentChunker,
        template: &NewCorpusChunk,
    ) -> StateResult<Vec<u64>> {
        let chunks = self.write.document_chunks(text, chunker, template);
        log::info!(
            "ingest_document: '{}' split into {} chunks",
            template.source,
            chunks.len()
        );
        self.load_corpus_batch(chunks)
    }

    /// Get a corpus chunk.
    pub fn get_corpus_chunk(&self, id: u64) -> StateResult<CorpusChunk> {
        self.state
            .read()
            .get_corpus_chunk(id)
            .cloned()
            .ok_or_else(|| StateError::not_found("get_corpus_chunk", EntityKind::CorpusChunk, id))
    }

    /// Remove every chunk of a source, optionally only one version.
    /// Returns the number removed.
    pub fn delete_corpus_source(&self, source: &str, version: Option<&str>) -> usize {
        let removed = self.state.write().remove_corpus_source(source, version).len();
        log::info!("delete_corpus_source: removed {removed} chunks of '{source}' ({version:?})");
        removed
    }

    /// Most recently loaded corpus chunks matching `filter`.
    pub fn corpus_recent(&self, filter: &CorpusFilter, limit: usize) -> Vec<CorpusChunk> {
        self.query.corpus_recent(&self.state.read(), filter, limit)
    }

    /// Corpus chunks ranked by similarity to `query_text`.
    pub fn corpus_similar(
        &self,
        query_text: &str,
        filter: &CorpusFilter,
        limit: usize,
    ) -> StateResult<Vec<CorpusChunk>> {
        let vector = self.embed(query_text)?;
        self.query
            .corpus_similar(&self.state.read(), &vector, filter, limit)
    }

    // ==================== Retrieval ====================

    /// Everything one character knows and has experienced at one moment on
    /// one take.
    pub fn query_state(&self, request: &QueryRequest) -> StateResult<CharacterState> {
        let vector = match &request.query_text {
            Some(text) => Some(self.embed(text)?),
            None => None,
        };
        self.query
            .character_state(&self.state.read(), request, vector.as_deref())
    }
}

/// Parse a knowledge source name, rejecting unknown names.
pub fn parse_source(name: &str) -> StateResult<KnowledgeSource> {
    KnowledgeSource::from_name(name).ok_or_else(|| {
        StateError::invalid(
            "log_knowledge",
            format!("unknown source '{name}' (expected witnessed, told, inferred or discovered)"),
        )
    })
}
