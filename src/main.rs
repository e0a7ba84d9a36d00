//! # QA Forge CLI (`qag`)
//!
//! The `qag` binary drives the documentation-grounded QA pipeline: it
//! ingests documentation into the knowledge base, inspects retrieval,
//! and generates test cases and Selenium scripts.
//!
//! ## Usage
//!
//! ```bash
//! qag --config ./config/qag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qag init` | Create the SQLite database and run schema migrations |
//! | `qag ingest <paths>` | Parse, chunk, embed, and store documents |
//! | `qag query "<text>"` | Show the nearest chunks for a query |
//! | `qag generate "<request>"` | Generate grounded test cases as JSON |
//! | `qag script <cases.json>` | Generate a Selenium script for one test case |
//! | `qag stats` | Show knowledge-base counters |
//! | `qag reset` | Delete all ingested content |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! qag init
//!
//! # Ingest a docs directory and the page under test
//! qag ingest ./docs ./login_page.html
//!
//! # Inspect what retrieval returns for a topic
//! qag query "password reset flow" --limit 3
//!
//! # Generate test cases and save them
//! qag generate "test cases for the login form" --out cases.json
//!
//! # Generate a Selenium script for the first test case
//! qag script cases.json --index 0 --out test_login.py
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use qa_forge::agents::{ScriptAgent, TestCaseAgent};
use qa_forge::config::{self, Config};
use qa_forge::embedding::{EmbeddingProvider, OpenAiEmbeddings};
use qa_forge::kb::KnowledgeBase;
use qa_forge::llm::{GenerativeModel, OpenAiModel};
use qa_forge::models::{DocumentRecord, TestCase};
use qa_forge::parse::{parse_document, utf8_prefix};
use qa_forge::store::sqlite::SqliteStore;
use qa_forge::store::VectorStore;
use qa_forge::{db, migrate};

/// QA Forge — generate documentation-grounded test cases and Selenium
/// scripts from your product docs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/qag.example.toml` for a full example; a missing file
/// falls back to built-in defaults.
#[derive(Parser)]
#[command(
    name = "qag",
    about = "QA Forge — documentation-grounded test case and Selenium script generation",
    version,
    long_about = "QA Forge ingests product documentation (Markdown, JSON, HTML, PDF) into a \
    local SQLite vector store and uses retrieval-grounded prompting to generate structured \
    test cases and Selenium automation scripts that only reference documented behavior."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/qag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the chunk and markup tables.
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Parse, chunk, embed, and store documents.
    ///
    /// Accepts files and directories; directories are walked recursively.
    /// The format is detected from the file extension unless `--kind`
    /// forces one. Per-file failures are reported without aborting the
    /// rest of the batch.
    Ingest {
        /// Files or directories to ingest.
        paths: Vec<PathBuf>,

        /// Force a format for every input: `text`, `json`, `html`, or `pdf`.
        #[arg(long)]
        kind: Option<String>,
    },

    /// Show the nearest chunks for a query.
    ///
    /// Embeds the query and prints the closest chunks with their cosine
    /// distances and provenance. Useful for checking what the agents
    /// will be grounded in.
    Query {
        /// The query text.
        text: String,

        /// Maximum number of chunks to return.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Generate documentation-grounded test cases.
    ///
    /// Retrieves the nearest documentation chunks for the request and asks
    /// the model for structured test cases based only on that context.
    /// Output is a JSON report with the test cases and the sources used.
    Generate {
        /// What to generate test cases for (e.g. "the login form").
        request: String,

        /// Number of context chunks to retrieve (defaults to the
        /// configured value).
        #[arg(long)]
        chunks: Option<usize>,

        /// Write the JSON report here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Generate a Selenium script for one test case.
    ///
    /// Reads a test-case report produced by `qag generate` (or a bare
    /// JSON array of test cases) and generates a Python Selenium script
    /// grounded in the ingested page markup. Requires an HTML document
    /// to have been ingested.
    Script {
        /// Path to the test-case JSON (`qag generate` output).
        cases: PathBuf,

        /// Which test case in the file to script.
        #[arg(long, default_value_t = 0)]
        index: usize,

        /// Write the script here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show knowledge-base counters.
    Stats,

    /// Delete all ingested content for the configured collection.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.store).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized at {}", cfg.store.path.display());
        }
        Commands::Ingest { paths, kind } => {
            run_ingest(&cfg, &paths, kind.as_deref()).await?;
        }
        Commands::Query { text, limit } => {
            run_query(&cfg, &text, limit).await?;
        }
        Commands::Generate {
            request,
            chunks,
            out,
        } => {
            run_generate(&cfg, &request, chunks, out.as_deref()).await?;
        }
        Commands::Script { cases, index, out } => {
            run_script(&cfg, &cases, index, out.as_deref()).await?;
        }
        Commands::Stats => {
            run_stats(&cfg).await?;
        }
        Commands::Reset => {
            run_reset(&cfg).await?;
        }
    }

    Ok(())
}

/// Open the knowledge base over the configured SQLite collection.
async fn open_kb(cfg: &Config) -> Result<KnowledgeBase> {
    let pool = db::connect(&cfg.store).await?;
    migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool, cfg.store.collection.clone());
    let embedder = build_embedder(cfg)?;
    KnowledgeBase::open(Box::new(store), embedder, &cfg.chunking).await
}

fn build_embedder(cfg: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    if !cfg.embedding.is_enabled() {
        bail!("Embedding provider is disabled; set embedding.provider = \"openai\" to ingest or query");
    }
    Ok(Box::new(OpenAiEmbeddings::new(&cfg.embedding)?))
}

fn build_model(cfg: &Config) -> Result<Box<dyn GenerativeModel>> {
    Ok(Box::new(OpenAiModel::new(&cfg.generation)?))
}

/// Expand files and directories into a flat file list, in a stable order.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("No such file or directory: {}", path.display());
        }
    }
    Ok(files)
}

async fn run_ingest(cfg: &Config, paths: &[PathBuf], kind: Option<&str>) -> Result<()> {
    if paths.is_empty() {
        bail!("Nothing to ingest; pass at least one file or directory");
    }

    let files = collect_files(paths)?;
    let mut records: Vec<DocumentRecord> = Vec::with_capacity(files.len());
    for file in &files {
        let bytes = std::fs::read(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        records.push(parse_document(&bytes, &filename, kind));
    }

    let mut kb = open_kb(cfg).await?;
    let results = kb.ingest_many(&records).await;

    let mut ok = 0usize;
    for result in &results {
        if result.success {
            ok += 1;
            println!(
                "  ✓ {} ({}): {} chunks",
                result.filename,
                result.kind.as_str(),
                result.chunks_created
            );
        } else {
            println!(
                "  ✗ {}: {}",
                result.filename,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let stats = kb.stats();
    println!(
        "\nIngested {}/{} files. Knowledge base now holds {} documents, {} chunks.",
        ok,
        results.len(),
        stats.document_count,
        stats.chunk_count
    );
    Ok(())
}

async fn run_query(cfg: &Config, text: &str, limit: usize) -> Result<()> {
    let kb = open_kb(cfg).await?;
    let results = kb.query(text, limit).await?;

    if let Some(message) = results.message {
        println!("{}", message);
        return Ok(());
    }

    for (rank, m) in results.matches.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} (chunk {}/{})",
            rank + 1,
            m.distance,
            m.metadata.source,
            m.metadata.chunk_index + 1,
            m.metadata.total_chunks
        );
        println!("   {}\n", utf8_prefix(&m.text, 200).replace('\n', " "));
    }
    Ok(())
}

async fn run_generate(
    cfg: &Config,
    request: &str,
    chunks: Option<usize>,
    out: Option<&Path>,
) -> Result<()> {
    let kb = open_kb(cfg).await?;
    let agent = TestCaseAgent::new(build_model(cfg)?);
    let n = chunks.unwrap_or(cfg.generation.context_chunks);

    let report = agent.generate_test_cases(&kb, request, n).await?;
    let json = serde_json::to_string_pretty(&report)?;

    match out {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Wrote {} test cases to {} (sources: {})",
                report.test_cases.len(),
                path.display(),
                report.sources_used.join(", ")
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn run_script(cfg: &Config, cases: &Path, index: usize, out: Option<&Path>) -> Result<()> {
    let test_case = load_test_case(cases, index)?;

    let kb = open_kb(cfg).await?;
    let agent = ScriptAgent::new(build_model(cfg)?, cfg.generation.markup_budget_bytes);
    let result = agent.generate_script(&kb, &test_case).await?;

    match out {
        Some(path) => {
            std::fs::write(path, &result.script)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Wrote script for {} ({}) to {}",
                result.test_case_id,
                result.feature,
                path.display()
            );
        }
        None => {
            println!("# {}: {}\n", result.test_case_id, result.feature);
            println!("{}", result.script);
        }
    }
    Ok(())
}

/// Load one test case from a `qag generate` report or a bare JSON array.
fn load_test_case(path: &Path, index: usize) -> Result<TestCase> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let cases = value
        .get("test_cases")
        .cloned()
        .unwrap_or(value);
    let cases: Vec<TestCase> = serde_json::from_value(cases)
        .with_context(|| format!("{} does not contain a test case list", path.display()))?;

    if index >= cases.len() {
        bail!(
            "Test case index {} out of range; {} has {} test cases",
            index,
            path.display(),
            cases.len()
        );
    }
    Ok(cases[index].clone())
}

async fn run_stats(cfg: &Config) -> Result<()> {
    let pool = db::connect(&cfg.store).await?;
    migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool, cfg.store.collection.clone());

    // Read counters straight from the store so stats never needs an
    // embedding provider or API key.
    let documents = store.document_count().await?;
    let chunks = store.chunk_count().await?;
    let has_html = store.markup().await?.is_some();

    println!("Database:   {}", cfg.store.path.display());
    println!("Collection: {}", cfg.store.collection);
    println!("Documents:  {}", documents);
    println!("Chunks:     {}", chunks);
    println!("HTML page:  {}", if has_html { "ingested" } else { "none" });
    Ok(())
}

async fn run_reset(cfg: &Config) -> Result<()> {
    let pool = db::connect(&cfg.store).await?;
    migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool, cfg.store.collection.clone());

    store.clear().await?;
    println!("Cleared collection '{}'.", cfg.store.collection);
    Ok(())
}
