use anyhow::Result;
use clap::{Parser, Subcommand};
use corpex::{build_slice_segment, Engine, EngineConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "corpex")]
#[command(about = "Segment-based BM25 search over a scientific-paper corpus", long_about = None)]
struct Args {
    /// Index root (holds manifest.bin, metadata.csv and segments/)
    #[arg(long, env = "CORPEX_INDEX_DIR", default_value = "./index")]
    index_dir: PathBuf,

    /// Directory cache JSON files are written to
    #[arg(long, env = "CORPEX_CACHE_DIR", default_value = ".")]
    cache_dir: PathBuf,

    /// Word-embeddings file for semantic query expansion
    #[arg(long, env = "EMBEDDINGS_PATH")]
    embeddings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a corpus slice (metadata.csv + document_parses/) as a new segment
    BuildSlice {
        /// Directory containing the extracted slice
        #[arg(long)]
        slice_root: PathBuf,
    },
    /// Add one paper JSON as a single-document segment
    Add {
        /// Corpus root the relative path is resolved against
        #[arg(long)]
        root: PathBuf,
        /// Paper JSON path relative to the corpus root
        #[arg(long)]
        relpath: String,
        /// Document uid recorded in the segment
        #[arg(long)]
        uid: String,
        /// Title recorded in the segment
        #[arg(long, default_value = "")]
        title: String,
    },
    /// Run a ranked query against the index
    Search {
        query: String,
        /// Number of results (clamped to 1..=100)
        #[arg(short, long, default_value_t = 10)]
        k: usize,
    },
    /// Complete the last token of the input
    Suggest {
        input: String,
        /// Number of suggestions (clamped to 1..=10)
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::new(&args.index_dir).with_cache_dir(&args.cache_dir);
    if let Some(path) = &args.embeddings {
        config = config.with_embeddings_path(path);
    }

    match args.command {
        Command::BuildSlice { slice_root } => {
            let outcome =
                build_slice_segment(&slice_root, &config.index_dir, config.barrel_count)?;
            info!(
                segment = %outcome.segment,
                docs = outcome.doc_count,
                "slice indexed"
            );
            println!("{}", outcome.segment);
        }
        Command::Add {
            root,
            relpath,
            uid,
            title,
        } => {
            let engine = Engine::new(config);
            // A fresh index has nothing to load yet; that is fine for an add
            if let Err(e) = engine.reload() {
                if !e.is_missing_index() {
                    return Err(e.into());
                }
            }
            let response = engine.add_document(&root, &relpath, &uid, &title)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Search { query, k } => {
            let engine = Engine::new(config);
            engine.reload()?;
            let response = engine.search(&query, k)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Suggest { input, limit } => {
            let engine = Engine::new(config);
            engine.reload()?;
            let response = engine.suggest(&input, limit);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
