//! CLI entry point for the `nstate` command-line tool.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use narrative_state::cli::commands::{self, Session};
use narrative_state::format::SnapshotReader;
use narrative_state::{CorpusFilter, EngineConfig, QueryRequest, StateResult};

#[derive(Parser)]
#[command(
    name = "nstate",
    about = "NarrativeState CLI: branch-aware, time-gated character knowledge"
)]
struct Cli {
    /// Output format: "text" (default) or "json"
    #[arg(long, default_value = "text")]
    format: String,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty .nstate file
    Create {
        /// Path to the .nstate file to create
        file: PathBuf,
        /// Vector dimension (overrides the configuration)
        #[arg(long)]
        dimension: Option<usize>,
    },
    /// Display information about an .nstate file
    Info {
        /// Path to the .nstate file
        file: PathBuf,
    },
    /// Register a moment
    Moment {
        file: PathBuf,
        /// Moment id
        id: String,
        /// Position in narrative time; may be fractional
        sequence: f64,
        #[arg(long)]
        label: Option<String>,
    },
    /// Create a take (a root unless --parent is given)
    Take {
        file: PathBuf,
        /// Parent take id
        #[arg(long)]
        parent: Option<u64>,
        /// Moment where the branch diverges
        #[arg(long)]
        branch_point: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List takes
    Takes {
        file: PathBuf,
        /// Filter by status: active, archived, trunk
        #[arg(long)]
        status: Option<String>,
        /// Filter by branch point moment
        #[arg(long)]
        branch_point: Option<String>,
    },
    /// Set a take's status
    TakeStatus {
        file: PathBuf,
        take_id: u64,
        /// active, archived or trunk
        status: String,
    },
    /// Show a take's ancestor chain
    Ancestry { file: PathBuf, take_id: u64 },
    /// Register a character
    Character {
        file: PathBuf,
        id: String,
        name: String,
        /// Traits as a JSON object
        #[arg(long)]
        traits: Option<String>,
        /// Voice as a JSON object
        #[arg(long)]
        voice: Option<String>,
    },
    /// Record a world fact
    Fact {
        file: PathBuf,
        content: String,
        /// Moment at which the fact became true
        #[arg(long)]
        moment: String,
        #[arg(long, default_value = "general")]
        category: String,
    },
    /// Record that a character learned a fact
    Know {
        file: PathBuf,
        character: String,
        fact_id: u64,
        #[arg(long)]
        moment: String,
        #[arg(long)]
        take: u64,
        /// witnessed, told, inferred or discovered
        #[arg(long)]
        source: Option<String>,
    },
    /// Store a memory for a character
    Remember {
        file: PathBuf,
        character: String,
        content: String,
        #[arg(long)]
        moment: String,
        #[arg(long)]
        take: u64,
        /// said, heard, internal, perceived, action, or any other name
        #[arg(long = "type", default_value = "internal")]
        chunk_type: String,
    },
    /// Record a line of dialogue
    Dialogue {
        file: PathBuf,
        speaker: String,
        content: String,
        #[arg(long)]
        moment: String,
        #[arg(long)]
        take: u64,
        /// Comma-separated listener ids
        #[arg(long, value_delimiter = ',')]
        listeners: Vec<String>,
    },
    /// Archive a memory
    Archive {
        file: PathBuf,
        memory_id: u64,
        #[arg(long)]
        superseded_by: Option<u64>,
    },
    /// Query a character's knowledge state
    Query {
        file: PathBuf,
        character: String,
        #[arg(long)]
        moment: String,
        #[arg(long)]
        take: u64,
        /// Rank memories and corpus by relevance to this text
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        fact_limit: Option<usize>,
        #[arg(long)]
        memory_limit: Option<usize>,
        /// Include corpus chunks
        #[arg(long)]
        corpus: bool,
        /// Include archived memories
        #[arg(long)]
        include_archived: bool,
    },
    /// Load a text file into the corpus, one chunk per paragraph
    CorpusLoad {
        file: PathBuf,
        document: PathBuf,
        #[arg(long)]
        source: String,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Search the corpus
    CorpusSearch {
        file: PathBuf,
        /// Similarity query; most recent chunks when omitted
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        version: Option<String>,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Remove a corpus source
    CorpusDrop {
        file: PathBuf,
        source: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Record counts
    Stats { file: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    let json = cli.format == "json";

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli, json) {
        eprintln!("Error: {}", e);
        process::exit(commands::exit_code(&e));
    }
}

fn run(cli: Cli, json: bool) -> StateResult<()> {
    let config_path = cli.config;
    match cli.command {
        Commands::Create { file, dimension } => {
            let mut config = load_config(config_path.as_deref())?;
            if let Some(dim) = dimension {
                config.dimension = dim;
                config.embedding.dimension = dim;
            }
            commands::cmd_create(&file, &config)
        }
        Commands::Info { file } => commands::cmd_info(&file, json),
        Commands::Moment {
            file,
            id,
            sequence,
            label,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_moment(&session, &id, sequence, label.as_deref())
        }
        Commands::Take {
            file,
            parent,
            branch_point,
            notes,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_take(&session, parent, branch_point.as_deref(), notes.as_deref())
        }
        Commands::Takes {
            file,
            status,
            branch_point,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_takes(&session, status.as_deref(), branch_point.as_deref())
        }
        Commands::TakeStatus {
            file,
            take_id,
            status,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_take_status(&session, take_id, &status)
        }
        Commands::Ancestry { file, take_id } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_ancestry(&session, take_id)
        }
        Commands::Character {
            file,
            id,
            name,
            traits,
            voice,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_character(&session, &id, &name, traits.as_deref(), voice.as_deref())
        }
        Commands::Fact {
            file,
            content,
            moment,
            category,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_fact(&session, &content, &category, &moment)
        }
        Commands::Know {
            file,
            character,
            fact_id,
            moment,
            take,
            source,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_know(&session, &character, fact_id, &moment, take, source.as_deref())
        }
        Commands::Remember {
            file,
            character,
            content,
            moment,
            take,
            chunk_type,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_remember(&session, &character, &content, &chunk_type, &moment, take)
        }
        Commands::Dialogue {
            file,
            speaker,
            content,
            moment,
            take,
            listeners,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_dialogue(&session, &speaker, &content, &moment, take, &listeners)
        }
        Commands::Archive {
            file,
            memory_id,
            superseded_by,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_archive(&session, memory_id, superseded_by)
        }
        Commands::Query {
            file,
            character,
            moment,
            take,
            text,
            fact_limit,
            memory_limit,
            corpus,
            include_archived,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            let mut request =
                QueryRequest::new(character, moment, take).include_archived(include_archived);
            request.query_text = text;
            request.fact_limit = fact_limit;
            request.memory_limit = memory_limit;
            request.include_corpus = corpus;
            commands::cmd_query(&session, &request)
        }
        Commands::CorpusLoad {
            file,
            document,
            source,
            version,
            category,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_corpus_load(
                &session,
                &document,
                &source,
                version.as_deref(),
                category.as_deref(),
            )
        }
        Commands::CorpusSearch {
            file,
            text,
            source,
            category,
            version,
            limit,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            let filter = CorpusFilter {
                source,
                category,
                version,
            };
            commands::cmd_corpus_search(&session, text.as_deref(), &filter, limit)
        }
        Commands::CorpusDrop {
            file,
            source,
            version,
        } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_corpus_drop(&session, &source, version.as_deref())
        }
        Commands::Stats { file } => {
            let session = open(&file, config_path.as_deref(), json)?;
            commands::cmd_stats(&session)
        }
    }
}

fn load_config(path: Option<&Path>) -> StateResult<EngineConfig> {
    let mut config = match path {
        Some(p) => EngineConfig::load(p)?,
        None => EngineConfig::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

/// Open a snapshot. Without an explicit config file the dimension is taken
/// from the snapshot header.
fn open<'a>(file: &'a Path, config_path: Option<&Path>, json: bool) -> StateResult<Session<'a>> {
    let mut config = load_config(config_path)?;
    if config_path.is_none() && std::env::var_os("NSTATE_DIMENSION").is_none() {
        let header = SnapshotReader::read_header(file)?;
        config.dimension = header.dimension as usize;
        config.embedding.dimension = header.dimension as usize;
    }
    Session::open(file, &config, json)
}
