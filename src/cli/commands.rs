//! CLI command implementations.

use std::path::Path;

use crate::config::EngineConfig;
use crate::embedding::backend_from_config;
use crate::engine::{parse_source, NarrativeEngine, ParagraphChunker, QueryRequest};
use crate::format::SnapshotReader;
use crate::types::{
    ChunkType, CorpusFilter, DialogueLine, Metadata, NewCorpusChunk, NewMemory, StateError,
    StateResult, TakeId, TakeStatus,
};

/// An open snapshot plus output settings, shared by every command.
pub struct Session<'a> {
    path: &'a Path,
    engine: NarrativeEngine,
    json: bool,
}

impl<'a> Session<'a> {
    /// Open the snapshot at `path`.
    pub fn open(path: &'a Path, config: &EngineConfig, json: bool) -> StateResult<Self> {
        let backend = backend_from_config(&config.embedding)?;
        let engine = NarrativeEngine::open(path, backend, config.clone())?;
        Ok(Self { path, engine, json })
    }

    /// The engine over the opened snapshot.
    pub fn engine(&self) -> &NarrativeEngine {
        &self.engine
    }

    fn save(&self) -> StateResult<()> {
        self.engine.save(self.path)
    }
}

/// Create a new empty .nstate file.
pub fn cmd_create(path: &Path, config: &EngineConfig) -> StateResult<()> {
    let backend = backend_from_config(&config.embedding)?;
    let engine = NarrativeEngine::new(backend, config.clone())?;
    engine.save(path)?;
    println!("Created {}", path.display());
    Ok(())
}

/// Display information about an .nstate file.
pub fn cmd_info(path: &Path, json: bool) -> StateResult<()> {
    let header = SnapshotReader::read_header(path)?;
    let file_size = std::fs::metadata(path)?.len();

    if json {
        let info = serde_json::json!({
            "file": path.display().to_string(),
            "version": header.version,
            "dimension": header.dimension,
            "moments": header.moment_count,
            "takes": header.take_count,
            "facts": header.fact_count,
            "memories": header.memory_count,
            "corpus_chunks": header.corpus_count,
            "file_size": file_size,
        });
        print_json(&info);
    } else {
        println!("File: {}", path.display());
        println!("Version: {}", header.version);
        println!("Dimension: {}", header.dimension);
        println!("Moments: {}", header.moment_count);
        println!("Takes: {}", header.take_count);
        println!("Facts: {}", header.fact_count);
        println!("Memories: {}", header.memory_count);
        println!("Corpus chunks: {}", header.corpus_count);
        println!("File size: {}", format_size(file_size));
    }
    Ok(())
}

/// Register a moment.
pub fn cmd_moment(
    session: &Session<'_>,
    id: &str,
    sequence: f64,
    label: Option<&str>,
) -> StateResult<()> {
    let moment = session
        .engine
        .create_moment(id, sequence, label, Metadata::new())?;
    session.save()?;
    if session.json {
        print_json(&moment);
    } else {
        println!("Created moment '{}' at sequence {}", moment.id, moment.sequence);
    }
    Ok(())
}

/// Create a take, optionally branching from a parent.
pub fn cmd_take(
    session: &Session<'_>,
    parent: Option<TakeId>,
    branch_point: Option<&str>,
    notes: Option<&str>,
) -> StateResult<()> {
    let id = session.engine.create_take(parent, branch_point, notes)?;
    session.save()?;
    if session.json {
        print_json(&serde_json::json!({ "take_id": id, "parent_take_id": parent }));
    } else {
        match parent {
            Some(p) => println!("Created take {} (branched from {})", id, p),
            None => println!("Created root take {}", id),
        }
    }
    Ok(())
}

/// List takes.
pub fn cmd_takes(
    session: &Session<'_>,
    status: Option<&str>,
    branch_point: Option<&str>,
) -> StateResult<()> {
    let status = status
        .map(|s| {
            TakeStatus::from_name(s)
                .ok_or_else(|| StateError::invalid("list_takes", format!("unknown status '{s}'")))
        })
        .transpose()?;
    let takes = session.engine.list_takes(status, branch_point);
    if session.json {
        print_json(&takes);
    } else {
        println!("{} takes", takes.len());
        for take in &takes {
            let parent = take
                .parent_take_id
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  [{}] parent={} status={} branch_point={} created={}",
                take.id,
                parent,
                take.status,
                take.branch_point.as_deref().unwrap_or("-"),
                format_timestamp(take.created_at)
            );
        }
    }
    Ok(())
}

/// Change a take's status.
pub fn cmd_take_status(session: &Session<'_>, id: TakeId, status: &str) -> StateResult<()> {
    session.engine.set_take_status(id, status)?;
    session.save()?;
    if session.json {
        print_json(&serde_json::json!({ "take_id": id, "status": status.to_lowercase() }));
    } else {
        println!("Take {} is now {}", id, status.to_lowercase());
    }
    Ok(())
}

/// Show a take's ancestry.
pub fn cmd_ancestry(session: &Session<'_>, id: TakeId) -> StateResult<()> {
    let ancestry = session.engine.get_ancestry(id)?;
    if session.json {
        print_json(&serde_json::json!({ "take_id": id, "ancestry": ancestry.chain() }));
    } else {
        let chain: Vec<String> = ancestry.chain().iter().map(|t| t.to_string()).collect();
        println!("{}", chain.join(" -> "));
    }
    Ok(())
}

/// Register a character.
pub fn cmd_character(
    session: &Session<'_>,
    id: &str,
    name: &str,
    traits: Option<&str>,
    voice: Option<&str>,
) -> StateResult<()> {
    let traits = parse_metadata("register_character", traits)?;
    let voice = parse_metadata("register_character", voice)?;
    let character = session.engine.register_character(id, name, traits, voice)?;
    session.save()?;
    if session.json {
        print_json(&character);
    } else {
        println!("Registered character '{}' ({})", character.id, character.name);
    }
    Ok(())
}

/// Record a world fact.
pub fn cmd_fact(
    session: &Session<'_>,
    content: &str,
    category: &str,
    moment_id: &str,
) -> StateResult<()> {
    let id = session.engine.log_fact(content, category, moment_id)?;
    session.save()?;
    if session.json {
        print_json(&serde_json::json!({ "fact_id": id }));
    } else {
        println!("Logged fact {}", id);
    }
    Ok(())
}

/// Record that a character learned a fact.
pub fn cmd_know(
    session: &Session<'_>,
    character_id: &str,
    fact_id: u64,
    moment_id: &str,
    take_id: TakeId,
    source: Option<&str>,
) -> StateResult<()> {
    let source = source.map(parse_source).transpose()?;
    let id = session
        .engine
        .log_knowledge(character_id, fact_id, moment_id, take_id, source)?;
    session.save()?;
    if session.json {
        print_json(&serde_json::json!({ "knowledge_id": id }));
    } else {
        println!("'{}' learned fact {} (event {})", character_id, fact_id, id);
    }
    Ok(())
}

/// Store a memory for a character.
pub fn cmd_remember(
    session: &Session<'_>,
    character_id: &str,
    content: &str,
    chunk_type: &str,
    moment_id: &str,
    take_id: TakeId,
) -> StateResult<()> {
    let memory = NewMemory::new(
        character_id,
        content,
        ChunkType::from_name(chunk_type),
        moment_id,
        take_id,
    );
    let id = session.engine.embed_memory(memory)?;
    session.save()?;
    if session.json {
        print_json(&serde_json::json!({ "memory_id": id }));
    } else {
        println!("Stored memory {}", id);
    }
    Ok(())
}

/// Record a line of dialogue.
pub fn cmd_dialogue(
    session: &Session<'_>,
    speaker: &str,
    content: &str,
    moment_id: &str,
    take_id: TakeId,
    listeners: &[String],
) -> StateResult<()> {
    let mut line = DialogueLine::new(speaker, content, moment_id, take_id);
    for listener in listeners {
        line = line.heard_by(listener.as_str());
    }
    let receipt = session.engine.dialogue(&line)?;
    session.save()?;
    if session.json {
        print_json(&receipt);
    } else {
        println!(
            "Speaker memory {}; listener memories {:?}",
            receipt.speaker_memory_id, receipt.listener_memory_ids
        );
    }
    Ok(())
}

/// Archive a memory.
pub fn cmd_archive(
    session: &Session<'_>,
    memory_id: u64,
    superseded_by: Option<u64>,
) -> StateResult<()> {
    session.engine.archive_memory(memory_id, superseded_by)?;
    session.save()?;
    if session.json {
        print_json(&serde_json::json!({ "memory_id": memory_id, "archived": true }));
    } else {
        println!("Archived memory {}", memory_id);
    }
    Ok(())
}

/// Query a character's knowledge state.
pub fn cmd_query(session: &Session<'_>, request: &QueryRequest) -> StateResult<()> {
    let state = session.engine.query_state(request)?;
    if session.json {
        print_json(&state);
        return Ok(());
    }

    println!(
        "'{}' at '{}' on take {}",
        state.character_id, state.moment_id, state.take_id
    );
    println!("Facts ({}):", state.facts.len());
    for fact in &state.facts {
        let source = fact.source.map(|s| s.name()).unwrap_or("-");
        println!(
            "  [{}] {} (learned at '{}', {})",
            fact.id, fact.content, fact.moment_id, source
        );
    }
    println!("Memories ({}):", state.memories.len());
    for memory in &state.memories {
        println!(
            "  [{}] {} {} (at '{}', take {})",
            memory.id, memory.chunk_type, memory.chunk, memory.moment_id, memory.take_id
        );
    }
    if request.include_corpus {
        println!("Corpus ({}):", state.corpus.len());
        for chunk in &state.corpus {
            println!("  [{}] {}: {}", chunk.id, chunk.source, preview(&chunk.content, 80));
        }
    }
    Ok(())
}

/// Load a text file into the corpus, one chunk per paragraph.
pub fn cmd_corpus_load(
    session: &Session<'_>,
    file: &Path,
    source: &str,
    version: Option<&str>,
    category: Option<&str>,
) -> StateResult<()> {
    let text = std::fs::read_to_string(file)?;
    let mut template = NewCorpusChunk::new("", source);
    template.version = version.map(str::to_string);
    template.category = category.map(str::to_string);
    let ids = session
        .engine
        .ingest_document(&text, &ParagraphChunker::default(), &template)?;
    session.save()?;
    if session.json {
        print_json(&serde_json::json!({ "source": source, "chunk_ids": ids }));
    } else {
        println!("Loaded {} chunks from {}", ids.len(), file.display());
    }
    Ok(())
}

/// Search the corpus, by similarity when `query` is given.
pub fn cmd_corpus_search(
    session: &Session<'_>,
    query: Option<&str>,
    filter: &CorpusFilter,
    limit: usize,
) -> StateResult<()> {
    let chunks = match query {
        Some(text) => session.engine.corpus_similar(text, filter, limit)?,
        None => session.engine.corpus_recent(filter, limit),
    };
    if session.json {
        print_json(&chunks);
    } else {
        println!("{} chunks", chunks.len());
        for chunk in &chunks {
            println!(
                "  [{}] {} {}: {}",
                chunk.id,
                chunk.source,
                chunk.version.as_deref().unwrap_or("-"),
                preview(&chunk.content, 80)
            );
        }
    }
    Ok(())
}

/// Remove a corpus source.
pub fn cmd_corpus_drop(session: &Session<'_>, source: &str, version: Option<&str>) -> StateResult<()> {
    let removed = session.engine.delete_corpus_source(source, version);
    session.save()?;
    if session.json {
        print_json(&serde_json::json!({ "source": source, "removed": removed }));
    } else {
        println!("Removed {} chunks", removed);
    }
    Ok(())
}

/// Record counts.
pub fn cmd_stats(session: &Session<'_>) -> StateResult<()> {
    let stats = session.engine.stats();
    let file_size = std::fs::metadata(session.path)?.len();
    if session.json {
        print_json(&serde_json::json!({
            "stats": stats,
            "file_size": file_size,
        }));
    } else {
        println!("State Statistics:");
        println!("  Moments: {}", stats.moments);
        println!("  Takes: {}", stats.takes);
        println!("  Characters: {}", stats.characters);
        println!("  Facts: {}", stats.facts);
        println!("  Knowledge events: {}", stats.knowledge_events);
        println!(
            "  Memories: {} ({} archived)",
            stats.memories, stats.archived_memories
        );
        println!("  Corpus chunks: {}", stats.corpus_chunks);
        println!("  File size: {}", format_size(file_size));
    }
    Ok(())
}

/// Map an error onto the process exit code.
pub fn exit_code(err: &StateError) -> i32 {
    use crate::types::ErrorKind;
    match err.kind() {
        ErrorKind::Io => 1,
        ErrorKind::Format => 2,
        ErrorKind::InvalidArgument => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::Conflict => 5,
    }
}

fn parse_metadata(op: &'static str, raw: Option<&str>) -> StateResult<Metadata> {
    match raw {
        None => Ok(Metadata::new()),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| StateError::invalid(op, format!("expected a JSON object: {e}"))),
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_timestamp(micros: u64) -> String {
    let secs = (micros / 1_000_000) as i64;
    match chrono::DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{} us", micros),
    }
}
