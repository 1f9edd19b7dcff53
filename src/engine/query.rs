//! Query executor: gated fact, memory and corpus retrieval.

use std::collections::HashMap;

use crate::config::RetrievalConfig;
use crate::state::NarrativeState;
use crate::types::{
    CharacterState, CorpusChunk, CorpusFilter, EntityKind, FactId, KnownFact, Memory, StateError,
    StateResult, TakeId,
};

use super::gate::RetrievalScope;

/// Parameters for a memory query.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    /// Owner of the memories.
    pub character_id: String,
    /// Cutoff moment.
    pub moment_id: String,
    /// Take whose ancestry is visible.
    pub take_id: TakeId,
    /// Maximum number of results.
    pub limit: usize,
    /// Include memories tagged `archived`.
    pub include_archived: bool,
}

impl MemoryQuery {
    /// Create a query that excludes archived memories.
    pub fn new(
        character_id: impl Into<String>,
        moment_id: impl Into<String>,
        take_id: TakeId,
        limit: usize,
    ) -> Self {
        Self {
            character_id: character_id.into(),
            moment_id: moment_id.into(),
            take_id,
            limit,
            include_archived: false,
        }
    }

    /// Opt in to archived memories.
    pub fn include_archived(mut self, include: bool) -> Self {
        self.include_archived = include;
        self
    }
}

/// Parameters for a composed character-state query.
///
/// Unset limits fall back to the configured retrieval defaults.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub character_id: String,
    pub moment_id: String,
    pub take_id: TakeId,
    /// Ranks memories and corpus by relevance when present.
    pub query_text: Option<String>,
    pub fact_limit: Option<usize>,
    pub memory_limit: Option<usize>,
    pub corpus_limit: Option<usize>,
    pub include_corpus: bool,
    pub include_archived: bool,
    pub corpus_filter: CorpusFilter,
}

impl QueryRequest {
    /// Create a request with default limits, no query text and no corpus.
    pub fn new(character_id: impl Into<String>, moment_id: impl Into<String>, take_id: TakeId) -> Self {
        Self {
            character_id: character_id.into(),
            moment_id: moment_id.into(),
            take_id,
            query_text: None,
            fact_limit: None,
            memory_limit: None,
            corpus_limit: None,
            include_corpus: false,
            include_archived: false,
            corpus_filter: CorpusFilter::default(),
        }
    }

    /// Rank memories and corpus by relevance to `text`.
    pub fn query_text(mut self, text: impl Into<String>) -> Self {
        self.query_text = Some(text.into());
        self
    }

    /// Set the fact limit.
    pub fn fact_limit(mut self, limit: usize) -> Self {
        self.fact_limit = Some(limit);
        self
    }

    /// Set the memory limit.
    pub fn memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    /// Include corpus chunks matching `filter`.
    pub fn with_corpus(mut self, filter: CorpusFilter, limit: Option<usize>) -> Self {
        self.include_corpus = true;
        self.corpus_filter = filter;
        self.corpus_limit = limit;
        self
    }

    /// Opt in to archived memories.
    pub fn include_archived(mut self, include: bool) -> Self {
        self.include_archived = include;
        self
    }
}

/// The query engine. Stateless apart from retrieval tuning.
pub struct QueryEngine {
    retrieval: RetrievalConfig,
}

impl QueryEngine {
    /// Create a new query engine.
    pub fn new(retrieval: RetrievalConfig) -> Self {
        Self { retrieval }
    }

    /// Retrieval tuning in use.
    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Facts the character knows at `moment_id` on `take_id`, ascending by
    /// the learning moment's sequence, ties by fact id.
    ///
    /// A fact with several qualifying knowledge events appears once, carrying
    /// the earliest event's source and moment.
    pub fn facts_for(
        &self,
        state: &NarrativeState,
        character_id: &str,
        moment_id: &str,
        take_id: TakeId,
        limit: usize,
    ) -> StateResult<Vec<KnownFact>> {
        const OP: &str = "facts_for";
        state.require_character(OP, character_id)?;
        let scope = RetrievalScope::resolve(state, OP, moment_id, take_id)?;

        // fact_id -> (learning sequence, event id, position in `events`)
        let mut earliest: HashMap<FactId, (f64, u64, usize)> = HashMap::new();
        let events = state.knowledge_of(character_id);
        for (pos, event) in events.iter().enumerate() {
            let Some(seq) = scope.admit(state, &event.moment_id, event.take_id) else {
                continue;
            };
            let candidate = (seq, event.id, pos);
            earliest
                .entry(event.fact_id)
                .and_modify(|best| {
                    if (candidate.0, candidate.1) < (best.0, best.1) {
                        *best = candidate;
                    }
                })
                .or_insert(candidate);
        }

        let mut ranked: Vec<(f64, FactId, usize)> = earliest
            .into_iter()
            .map(|(fact_id, (seq, _, pos))| (seq, fact_id, pos))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        Ok(ranked
            .into_iter()
            .filter_map(|(_, fact_id, pos)| {
                state
                    .get_fact(fact_id)
                    .map(|fact| KnownFact::from_event(fact, events[pos]))
            })
            .take(limit)
            .collect())
    }

    /// Memories visible to the query, ascending by moment sequence, ties by
    /// memory id.
    pub fn memories_chronological(
        &self,
        state: &NarrativeState,
        query: &MemoryQuery,
    ) -> StateResult<Vec<Memory>> {
        const OP: &str = "memories_chronological";
        state.require_character(OP, &query.character_id)?;
        let scope = RetrievalScope::resolve(state, OP, &query.moment_id, query.take_id)?;

        let mut visible: Vec<(f64, &Memory)> = state
            .memories_of(&query.character_id)
            .into_iter()
            .filter(|m| query.include_archived || !m.is_archived())
            .filter_map(|m| scope.admit(state, &m.moment_id, m.take_id).map(|seq| (seq, m)))
            .collect();
        visible.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));

        Ok(visible
            .into_iter()
            .take(query.limit)
            .map(|(_, m)| m.clone())
            .collect())
    }

    /// Memories nearest to `query_vec` in the owner's index, post-filtered
    /// by the same predicates as the chronological mode, ascending by
    /// distance.
    ///
    /// Fewer than `limit` results are returned when too many neighbours are
    /// filtered out.
    pub fn memories_similar(
        &self,
        state: &NarrativeState,
        query: &MemoryQuery,
        query_vec: &[f32],
    ) -> StateResult<Vec<Memory>> {
        const OP: &str = "memories_similar";
        state.require_character(OP, &query.character_id)?;
        let scope = RetrievalScope::resolve(state, OP, &query.moment_id, query.take_id)?;
        let index = state
            .memory_index(&query.character_id)
            .ok_or_else(|| StateError::not_found(OP, EntityKind::Character, &query.character_id))?;

        if query.limit == 0 {
            return Ok(Vec::new());
        }
        let k = self.retrieval.candidate_count(query.limit);
        let hits = index.knn(query_vec, k)?;

        let mut results = Vec::with_capacity(query.limit);
        for hit in &hits {
            let Some(memory) = state.get_memory(hit.id) else {
                continue;
            };
            if !query.include_archived && memory.is_archived() {
                continue;
            }
            if scope
                .admit(state, &memory.moment_id, memory.take_id)
                .is_none()
            {
                continue;
            }
            results.push(memory.clone());
            if results.len() == query.limit {
                break;
            }
        }

        if results.len() < query.limit && hits.len() > results.len() {
            log::warn!(
                "{OP}: {} of {} requested memories for '{}' survived filtering ({} candidates)",
                results.len(),
                query.limit,
                query.character_id,
                hits.len()
            );
        }
        Ok(results)
    }

    /// Every memory of a character, ascending by id.
    pub fn list_memories(
        &self,
        state: &NarrativeState,
        character_id: &str,
        include_archived: bool,
    ) -> StateResult<Vec<Memory>> {
        state.require_character("list_memories", character_id)?;
        Ok(state
            .memories_of(character_id)
            .into_iter()
            .filter(|m| include_archived || !m.is_archived())
            .cloned()
            .collect())
    }

    /// Corpus chunks matching `filter`, most recently loaded first.
    pub fn corpus_recent(
        &self,
        state: &NarrativeState,
        filter: &CorpusFilter,
        limit: usize,
    ) -> Vec<CorpusChunk> {
        state
            .corpus_chunks()
            .rev()
            .filter(|c| filter.matches(c))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Corpus chunks nearest to `query_vec`, post-filtered by `filter`,
    /// ascending by distance.
    pub fn corpus_similar(
        &self,
        state: &NarrativeState,
        query_vec: &[f32],
        filter: &CorpusFilter,
        limit: usize,
    ) -> StateResult<Vec<CorpusChunk>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let k = self.retrieval.candidate_count(limit);
        let hits = state.corpus_index().knn(query_vec, k)?;
        let results: Vec<CorpusChunk> = hits
            .iter()
            .filter_map(|hit| state.get_corpus_chunk(hit.id))
            .filter(|c| filter.matches(c))
            .take(limit)
            .cloned()
            .collect();

        if results.len() < limit && hits.len() > results.len() {
            log::warn!(
                "corpus_similar: {} of {} requested chunks survived filtering ({} candidates)",
                results.len(),
                limit,
                hits.len()
            );
        }
        Ok(results)
    }

    /// Assemble the full knowledge snapshot for one character.
    ///
    /// `query_vec` is the embedding of `request.query_text`; when present,
    /// memories and corpus are ranked by similarity.
    pub fn character_state(
        &self,
        state: &NarrativeState,
        request: &QueryRequest,
        query_vec: Option<&[f32]>,
    ) -> StateResult<CharacterState> {
        let character = state.require_character("query_state", &request.character_id)?;

        let corpus = if request.include_corpus {
            let limit = request.corpus_limit.unwrap_or(self.retrieval.corpus_limit);
            match query_vec {
                Some(v) => self.corpus_similar(state, v, &request.corpus_filter, limit)?,
                None => self.corpus_recent(state, &request.corpus_filter, limit),
            }
        } else {
            Vec::new()
        };

        let facts = self.facts_for(
            state,
            &request.character_id,
            &request.moment_id,
            request.take_id,
            request.fact_limit.unwrap_or(self.retrieval.fact_limit),
        )?;

        let memory_query = MemoryQuery::new(
            request.character_id.clone(),
            request.moment_id.clone(),
            request.take_id,
            request.memory_limit.unwrap_or(self.retrieval.memory_limit),
        )
        .include_archived(request.include_archived);
        let memories = match query_vec {
            Some(v) => self.memories_similar(state, &memory_query, v)?,
            None => self.memories_chronological(state, &memory_query)?,
        };

        Ok(CharacterState {
            character_id: character.id.clone(),
            moment_id: request.moment_id.clone(),
            take_id: request.take_id,
            facts,
            memories,
            corpus,
            traits: character.traits.clone(),
            voice: character.voice.clone(),
        })
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(RetrievalConfig::default())
    }
}
