// LocalDesk/crates/localdesk/src/main.rs

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use localdesk::{config::Config, run_server};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Parser)]
#[command(name = "localdesk", version, about = "LocalDesk backend and maintenance tools")]
struct Cli {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[cfg(feature = "cli")]
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Chunk, embed and store the markdown knowledge base, replacing what is indexed
    Index {
        #[arg(long)]
        docs_dir: Option<PathBuf>,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Check that every required table exists
    VerifySchema,
    /// Check the landing-page keys of every locale's translation file
    VerifyTranslations {
        #[arg(long)]
        messages_dir: Option<PathBuf>,
    },
    /// Print the number of indexed chunks and a few samples
    CheckDocuments {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    localdesk::telemetry::init_tracing();

    let cli = Cli::parse();
    let mut cfg = Config::from_env()?;
    if let Some(database) = cli.database {
        cfg.database_path = database;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(cfg).await,
        Command::Index { docs_dir, chunk_size, chunk_overlap } => {
            if let Some(dir) = docs_dir {
                cfg.docs_dir = dir;
            }
            cfg.chunk_size = chunk_size.unwrap_or(cfg.chunk_size);
            cfg.chunk_overlap = chunk_overlap.unwrap_or(cfg.chunk_overlap);
            commands::index(&cfg).await
        }
        Command::VerifySchema => commands::verify_schema(&cfg),
        Command::VerifyTranslations { messages_dir } => {
            if let Some(dir) = messages_dir {
                cfg.messages_dir = dir;
            }
            commands::verify_translations(&cfg)
        }
        Command::CheckDocuments { limit } => commands::check_documents(&cfg, limit),
    }
}

#[cfg(feature = "cli")]
mod commands {
    use localdesk::config::Config;
    use localdesk::db::Database;
    use localdesk::i18n::{locale_config, verify_translations as check_locales, REQUIRED_KEYS};
    use localdesk::llm::OpenAIClient;
    use localdesk::rag::DocumentIndexer;

    fn open_database(cfg: &Config) -> anyhow::Result<Database> {
        Database::new(&cfg.database_path, cfg.embedding_dimensions, &cfg.embedding_model)
    }

    pub async fn index(cfg: &Config) -> anyhow::Result<()> {
        if cfg.chunk_overlap >= cfg.chunk_size {
            anyhow::bail!("chunk overlap ({}) must be smaller than chunk size ({})", cfg.chunk_overlap, cfg.chunk_size);
        }
        let llm = OpenAIClient::from_config(cfg)?;
        if !llm.is_configured() {
            anyhow::bail!("OPENAI_API_KEY not configured");
        }
        let database = open_database(cfg)?;

        println!("Indexing {} ({} chars per chunk, {} overlap)",
            cfg.docs_dir.display(), cfg.chunk_size, cfg.chunk_overlap);
        let indexer = DocumentIndexer::new(&database.documents, &llm, cfg.chunk_size, cfg.chunk_overlap);
        let report = indexer.index_directory(&cfg.docs_dir).await?;

        println!("Files found:     {}", report.files_found);
        println!("Files processed: {}", report.files_processed);
        println!("Chunks created:  {}", report.chunks_created);
        println!("Failures:        {}", report.failures);
        if report.failures > 0 {
            anyhow::bail!("{} file(s) could not be indexed", report.failures);
        }
        Ok(())
    }

    pub fn verify_schema(cfg: &Config) -> anyhow::Result<()> {
        let database = open_database(cfg)?;
        let report = database.verify_schema()?;

        println!("{}", "=".repeat(40));
        println!("  Database schema: {}", cfg.database_path.display());
        println!("{}", "=".repeat(40));
        for (table, exists) in &report {
            println!("  {:<12} {}", table, if *exists { "ok" } else { "MISSING" });
        }
        let missing = report.iter().filter(|(_, exists)| !exists).count();
        if missing > 0 {
            anyhow::bail!("{} required table(s) missing", missing);
        }
        println!("All {} tables present", report.len());
        Ok(())
    }

    pub fn verify_translations(cfg: &Config) -> anyhow::Result<()> {
        let report = check_locales(&cfg.messages_dir, REQUIRED_KEYS);

        for locale in &report.locales {
            if let Some(config) = locale_config(&locale.locale) {
                println!("{} ({}, {:?})", locale.locale, config.name, config.direction);
            }
            if let Some(error) = &locale.load_error {
                println!("{}: failed to load ({})", locale.locale, error);
                continue;
            }
            if locale.is_complete() {
                println!("{}: all {} keys present", locale.locale, report.keys_checked);
                continue;
            }
            for key in &locale.missing_required {
                println!("{}: missing required key {}", locale.locale, key);
            }
            for key in &locale.missing_from_reference {
                println!("{}: missing key {} (present in reference locale)", locale.locale, key);
            }
        }

        if !report.is_complete() {
            anyhow::bail!("translations are incomplete");
        }
        println!("Verified {} locales x {} keys", report.locales.len(), report.keys_checked);
        Ok(())
    }

    pub fn check_documents(cfg: &Config, limit: usize) -> anyhow::Result<()> {
        let database = open_database(cfg)?;
        println!("Embedding model: {} ({} dimensions)", cfg.embedding_model, cfg.embedding_dimensions);
        println!("Total documents: {}", database.documents.count()?);
        for (i, doc) in database.documents.sample(limit)?.iter().enumerate() {
            println!("\n{}. {}", i + 1, doc.metadata.title);
            println!("   Source: {}", doc.metadata.source);
            if let Some(section) = &doc.metadata.section {
                println!("   Section: {}", section);
            }
            println!("   Content length: {} chars", doc.content.chars().count());
        }
        Ok(())
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
