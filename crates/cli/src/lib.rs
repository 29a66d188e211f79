use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kb_chunker::KnowledgeBaseLoader;
use kb_search::{MultiQuestionRetriever, RetrievalConfig, SearchService};
use kb_vector_store::{Fingerprint, ProviderMode};
use std::path::{Path, PathBuf};

mod output;

use output::FingerprintReport;

/// Picked up from the working directory when `--config` is not given
const DEFAULT_CONFIG_FILE: &str = "kb-retrieval.toml";

#[derive(Parser)]
#[command(name = "kb-retrieval")]
#[command(about = "Priority-aware semantic retrieval over a knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Knowledge base root directory
    #[arg(long, global = true)]
    kb_path: Option<PathBuf>,

    /// Embedding cache directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Embedding backend
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedMode {
    Gemini,
    Stub,
}

impl From<EmbedMode> for ProviderMode {
    fn from(mode: EmbedMode) -> Self {
        match mode {
            EmbedMode::Gemini => Self::Gemini,
            EmbedMode::Stub => Self::Stub,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build or load the index and report on it
    Index(OutputArgs),

    /// Rank knowledge-base passages for a query
    Search(SearchArgs),

    /// Pool context for several questions at once
    Retrieve(RetrieveArgs),

    /// Print the knowledge-base fingerprint without embedding anything
    Fingerprint(OutputArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Emit JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Query text (multiple words are joined)
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,

    /// Maximum number of hits (defaults to ranking.default_top_k)
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct RetrieveArgs {
    /// Questions to retrieve context for
    #[arg(required = true, num_args = 1..)]
    questions: Vec<String>,

    /// Hits per question (defaults to ranking.default_top_k)
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    #[command(flatten)]
    output: OutputArgs,
}

impl Commands {
    const fn json(&self) -> bool {
        match self {
            Self::Index(args) | Self::Fingerprint(args) => args.json,
            Self::Search(args) => args.output.json,
            Self::Retrieve(args) => args.output.json,
        }
    }
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = resolve_config(&cli)?;
    let json = cli.command.json();

    match cli.command {
        Commands::Index(_) => {
            let service = SearchService::from_config(&config)
                .context("Failed to initialise search service")?;
            let report = service.warm().await.context("Failed to build index")?;
            output::print_index(&report, service.state(), json)?;
        }
        Commands::Search(args) => {
            let service = SearchService::from_config(&config)
                .context("Failed to initialise search service")?;
            let limit = args.limit.unwrap_or_else(|| service.default_top_k());
            let query = args.query.join(" ");
            let outcome = service
                .search_detailed(&query, limit)
                .await
                .with_context(|| format!("Search for {query:?} failed"))?;
            output::print_outcome(&outcome, json)?;
        }
        Commands::Retrieve(args) => {
            let service = SearchService::from_config(&config)
                .context("Failed to initialise search service")?;
            let limit = args.limit.unwrap_or_else(|| service.default_top_k());
            let context = MultiQuestionRetriever::new(service)
                .retrieve(&args.questions, limit)
                .await
                .context("Retrieval failed")?;
            output::print_context(&context, json)?;
        }
        Commands::Fingerprint(_) => {
            let loader = KnowledgeBaseLoader::new(config.knowledge_base.clone());
            let chunks = tokio::task::spawn_blocking(move || loader.load())
                .await
                .context("Knowledge base load task failed")?
                .context("Failed to load knowledge base")?;
            let report = FingerprintReport {
                fingerprint: Fingerprint::of(&chunks),
                chunks: chunks.len(),
                root: config.knowledge_base.root.clone(),
            };
            output::print_fingerprint(&report, json)?;
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || cli.command.json() {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

/// Defaults, then config file, then environment, then flags
fn resolve_config(cli: &Cli) -> Result<RetrievalConfig> {
    let mut config = match config_path(cli.config.as_deref()) {
        Some(path) => {
            log::debug!("Loading config from {}", path.display());
            RetrievalConfig::load(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => RetrievalConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid environment override")?;

    if let Some(root) = &cli.kb_path {
        config.knowledge_base.root = root.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache.dir = dir.clone();
    }
    if let Some(mode) = cli.embed_mode {
        config.provider.mode = mode.into();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.is_file().then_some(default)
}
