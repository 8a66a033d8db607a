// lumen CLI: build and query the semantic image index from the terminal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lumen::embedding::ClipVisionEmbedder;
use lumen::scanner::{self, ScanFilter};
use lumen::{
    BuildOutcome, EmbeddingGateway, EngineConfig, IndexBuilder, IndexStore, SearchEngine,
    SearchError, StoreError,
};

#[derive(Parser)]
#[command(name = "lumen", version, about = "Semantic image search across local folders and drives")]
struct Cli {
    /// Configuration file (JSON); missing file means defaults
    #[arg(long, global = true, default_value = "lumen.json")]
    config: PathBuf,

    /// Override the snapshot directory from the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or rebuild) the image index
    Index {
        /// Folder to scan
        folder: Option<PathBuf>,

        /// Scan every mounted drive instead of a single folder
        #[arg(long, conflicts_with = "folder")]
        all_drives: bool,
    },
    /// Find images similar to a query image
    Search {
        /// Query image path
        image: PathBuf,

        /// Number of results to return (defaults to the whole corpus)
        #[arg(short)]
        k: Option<usize>,
    },
    /// Show statistics for the current index snapshot
    Status,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let mut config = EngineConfig::load(&cli.config)?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Index { folder, all_drives } => run_index(config, folder, all_drives).await,
        Commands::Search { image, k } => run_search(config, image, k),
        Commands::Status => run_status(config),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_gateway(config: &EngineConfig) -> Result<Arc<dyn EmbeddingGateway>> {
    let embedder = ClipVisionEmbedder::load(&config.model_path).with_context(|| {
        format!(
            "failed to load vision model from {}",
            config.model_path.display()
        )
    })?;
    Ok(Arc::new(embedder))
}

async fn run_index(
    config: EngineConfig,
    folder: Option<PathBuf>,
    all_drives: bool,
) -> Result<()> {
    let roots = if all_drives {
        let roots = scanner::all_drive_roots();
        eprintln!("Scanning {} mounted locations...", roots.len());
        roots
    } else {
        match folder {
            Some(folder) => {
                if !folder.exists() {
                    bail!("folder {} does not exist", folder.display());
                }
                vec![folder]
            }
            None => {
                let filter = ScanFilter::from_config(&config);
                let suggestions = scanner::common_image_folders(&filter);
                if suggestions.is_empty() {
                    bail!("pass a folder to index, or --all-drives");
                }
                bail!(
                    "pass a folder to index, or --all-drives; image folders detected: {}",
                    suggestions
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
    };

    let gateway = load_gateway(&config)?;
    let store = IndexStore::new(&config.data_dir);
    let builder = IndexBuilder::new();
    let mut handle = builder
        .start(gateway, store, config, roots)
        .map_err(anyhow::Error::new)?;

    let cancel = handle.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancellation requested, finishing the current image...");
            cancel.cancel();
        }
    });

    while let Some(progress) = handle.progress.recv().await {
        eprintln!("[{:3}%] {}", progress.percent, progress.message);
    }

    match handle.wait().await {
        BuildOutcome::Completed(report) => {
            println!("Indexed {} images.", report.indexed);
            if !report.failures.is_empty() {
                println!("{} images could not be embedded:", report.failures.len());
                for failure in &report.failures {
                    println!("  {}: {}", failure.path.display(), failure.reason);
                }
            }
            Ok(())
        }
        BuildOutcome::Failed(message) => bail!("indexing failed: {message}"),
        BuildOutcome::Cancelled => {
            println!("Indexing cancelled; the previous index was left untouched.");
            Ok(())
        }
    }
}

fn run_search(config: EngineConfig, image: PathBuf, k: Option<usize>) -> Result<()> {
    let gateway = load_gateway(&config)?;
    let store = IndexStore::new(&config.data_dir);
    let engine = match SearchEngine::load(&store, gateway, config.max_image_dim) {
        Ok(engine) => engine,
        Err(SearchError::IndexUnavailable(err)) => {
            bail!("no search index available ({err}); run `lumen index` first");
        }
        Err(err) => return Err(err.into()),
    };

    let results = engine.search(&image, k)?;
    if results.is_empty() {
        println!("No similar images found.");
        return Ok(());
    }

    println!("{:>6}  {:>12}  path", "match", "distance");
    for result in &results {
        println!(
            "{:>5.1}%  {:>12.4}  {}",
            result.similarity,
            result.distance,
            result.path.display()
        );
    }
    Ok(())
}

fn run_status(config: EngineConfig) -> Result<()> {
    let store = IndexStore::new(&config.data_dir);
    match store.stats() {
        Ok(stats) => {
            println!("{} images indexed ({}-dim embeddings)", stats.indexed, stats.dimension);
            println!(
                "vector store: {:.1} MB, path list: {:.1} MB in {}",
                stats.vectors_bytes as f64 / 1024.0 / 1024.0,
                stats.paths_bytes as f64 / 1024.0 / 1024.0,
                store.dir().display()
            );
            Ok(())
        }
        Err(StoreError::NotFound(dir)) => {
            println!(
                "No index found in {}; run `lumen index` first.",
                dir.display()
            );
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
