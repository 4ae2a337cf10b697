use anyhow::{Context, Result};
use clap::Parser;
use r2r_ingest::{CancelHandle, Config, PipelineOptions, R2rClient, run_pipeline};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "r2r-ingest")]
#[command(about = "Upload a folder of documents to R2R, extract entities and build the collection graph")]
struct Args {
    /// Config file (defaults to $INGEST_CONFIG, then ./ingest.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder to ingest
    #[arg(short, long)]
    folder: Option<PathBuf>,

    /// Target collection name
    #[arg(short, long)]
    collection: Option<String>,

    /// R2R server base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Number of concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Only ingest files directly inside the folder
    #[arg(long)]
    no_recursive: bool,

    /// Upload only, do not request entity extraction
    #[arg(long)]
    skip_extraction: bool,

    /// Do not build the collection graph at the end
    #[arg(long)]
    skip_graph: bool,

    /// Stop starting new files after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(folder) = &self.folder {
            config.ingest.folder = folder.clone();
        }
        if let Some(collection) = &self.collection {
            config.ingest.collection = collection.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.backend.base_url = base_url.clone();
        }
        if let Some(workers) = self.workers {
            config.ingest.workers = workers;
        }
        if self.no_recursive {
            config.ingest.recursive = false;
        }
        if self.skip_extraction {
            config.ingest.extract = false;
        }
        if self.skip_graph {
            config.ingest.build_graph = false;
        }
        if self.deadline_secs.is_some() {
            config.ingest.run_deadline_secs = self.deadline_secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    log::info!("{}", "=".repeat(60));
    log::info!("🚀 Starting R2R ingestion");
    log::info!("📁 Source folder: {}", config.ingest.folder.display());
    log::info!("📚 Collection: {}", config.ingest.collection);
    log::info!("🌐 Server: {}", config.backend.base_url);
    log::info!("👷 Workers: {}", config.ingest.workers);
    log::info!("{}", "=".repeat(60));

    if config.api_key().is_none() {
        log::debug!("{} not set, sending unauthenticated requests", config.backend.api_key_env);
    }

    let client = R2rClient::from_config(&config).context("Failed to create R2R client")?;
    let options = PipelineOptions::from_config(&config);

    let cancel = CancelHandle::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let summary = run_pipeline(Arc::new(client), &options, cancel)
        .await
        .context("Ingestion aborted")?;

    if args.json {
        println!("{}", summary.to_json().context("Failed to serialize summary")?);
    } else {
        println!("{}", summary);
    }

    Ok(())
}
