//! Composite writes: batches, dialogue and document ingestion.

use crate::index::check_dimension;
use crate::state::NarrativeState;
use crate::types::{
    ChunkType, DialogueLine, DialogueReceipt, FactId, MemoryId, NewCorpusChunk, NewFact,
    NewKnowledge, NewMemory, StateError, StateResult,
};

use super::chunker::DocumentChunker;

/// The write engine composes single-record mutators into multi-record
/// writes. None of its operations are transactional: when item `i` fails,
/// items before it stay committed and the error carries `i`.
pub struct WriteEngine {
    dimension: usize,
}

impl WriteEngine {
    /// Create a new write engine.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Log several facts in order.
    pub fn log_facts_batch(
        &self,
        state: &mut NarrativeState,
        facts: &[NewFact],
    ) -> StateResult<Vec<FactId>> {
        let mut ids = Vec::with_capacity(facts.len());
        for (i, fact) in facts.iter().enumerate() {
            let id = state
                .add_fact(&fact.content, &fact.category, &fact.moment_id)
                .map_err(|e| StateError::batch("log_facts_batch", i, e))?;
            ids.push(id);
        }
        log::debug!("log_facts_batch: wrote {} facts", ids.len());
        Ok(ids)
    }

    /// Log several knowledge events in order.
    pub fn log_knowledge_batch(
        &self,
        state: &mut NarrativeState,
        events: Vec<NewKnowledge>,
    ) -> StateResult<Vec<u64>> {
        let mut ids = Vec::with_capacity(events.len());
        for (i, event) in events.into_iter().enumerate() {
            let id = state
                .add_knowledge(event)
                .map_err(|e| StateError::batch("log_knowledge_batch", i, e))?;
            ids.push(id);
        }
        log::debug!("log_knowledge_batch: wrote {} events", ids.len());
        Ok(ids)
    }

    /// Store several memories; `vectors[i]` is the embedding of
    /// `memories[i]`.
    pub fn embed_memories_batch(
        &self,
        state: &mut NarrativeState,
        memories: Vec<NewMemory>,
        vectors: Vec<Vec<f32>>,
    ) -> StateResult<Vec<MemoryId>> {
        const OP: &str = "embed_memories_batch";
        self.check_vectors(OP, memories.len(), &vectors)?;
        let mut ids = Vec::with_capacity(memories.len());
        for (i, (memory, vector)) in memories.into_iter().zip(vectors).enumerate() {
            let id = state
                .add_memory(memory, vector)
                .map_err(|e| StateError::batch(OP, i, e))?;
            ids.push(id);
        }
        log::debug!("{OP}: wrote {} memories", ids.len());
        Ok(ids)
    }

    /// Write one `said` memory for the speaker and one `heard` memory per
    /// listener, all sharing `vector`.
    ///
    /// Every participant is checked before the first write.
    pub fn dialogue(
        &self,
        state: &mut NarrativeState,
        line: &DialogueLine,
        vector: Vec<f32>,
    ) -> StateResult<DialogueReceipt> {
        const OP: &str = "dialogue";
        check_dimension(self.dimension, &vector)?;
        state.require_character(OP, &line.speaker)?;
        for listener in &line.listeners {
            state.require_character(OP, listener)?;
        }

        let speaker_memory_id = state.add_memory(
            NewMemory::new(
                line.speaker.clone(),
                line.content.clone(),
                ChunkType::Said,
                line.moment_id.clone(),
                line.take_id,
            )
            .tags(line.speaker_tags.clone()),
            vector.clone(),
        )?;

        let mut listener_memory_ids = Vec::with_capacity(line.listeners.len());
        for listener in &line.listeners {
            let id = state.add_memory(
                NewMemory::new(
                    listener.clone(),
                    line.content.clone(),
                    ChunkType::Heard,
                    line.moment_id.clone(),
                    line.take_id,
                )
                .tags(line.listener_tags.clone()),
                vector.clone(),
            )?;
            listener_memory_ids.push(id);
        }

        log::debug!(
            "{OP}: '{}' -> {} listeners (memory {})",
            line.speaker,
            listener_memory_ids.len(),
            speaker_memory_id
        );
        Ok(DialogueReceipt {
            speaker_memory_id,
            listener_memory_ids,
        })
    }

    /// Load several corpus chunks; `vectors[i]` is the embedding of
    /// `chunks[i]`.
    pub fn load_corpus_batch(
        &self,
        state: &mut NarrativeState,
        chunks: Vec<NewCorpusChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> StateResult<Vec<u64>> {
        const OP: &str = "load_corpus_batch";
        self.check_vectors(OP, chunks.len(), &vectors)?;
        let mut ids = Vec::with_capacity(chunks.len());
        for (i, (chunk, vector)) in chunks.into_iter().zip(vectors).enumerate() {
            let id = state
                .add_corpus_chunk(chunk, vector)
                .map_err(|e| StateError::batch(OP, i, e))?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Split a document into chunk inputs that share the provenance of
    /// `template`. Each chunk records its position under `chunk_index`.
    pub fn document_chunks(
        &self,
        text: &str,
        chunker: &dyn DocumentChunker,
        template: &NewCorpusChunk,
    ) -> Vec<NewCorpusChunk> {
        chunker
            .chunk(text)
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let mut chunk = template.clone();
                chunk.content = content;
                chunk.metadata.insert("chunk_index".to_string(), i.into());
                chunk
            })
            .collect()
    }

    fn check_vectors(&self, op: &'static str, count: usize, vectors: &[Vec<f32>]) -> StateResult<()> {
        if vectors.len() != count {
            return Err(StateError::invalid(
                op,
                format!("{} vectors for {} items", vectors.len(), count),
            ));
        }
        for vector in vectors {
            check_dimension(self.dimension, vector)?;
        }
        Ok(())
    }
}
