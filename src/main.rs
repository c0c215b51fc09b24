use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info};

use incident_citations::config::{
    load_config, resolve_config_path, BuildConfig, Source, SourceConfig,
};
use incident_citations::emit::JsonDirEmitter;
use incident_citations::fetch::{DirSource, HttpSource};
use incident_citations::layout::{Reducer, TsneReducer};
use incident_citations::run_build;

/// Build citation page contexts for every incident and locale
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (overrides CITE_CONFIG environment variable)
    #[arg(short, long)]
    config: Option<String>,

    /// Read the content-store export from this directory
    #[arg(long, conflicts_with = "source_url")]
    source_dir: Option<String>,

    /// Read the content-store export from this base URL
    #[arg(long)]
    source_url: Option<String>,

    /// Output directory for page contexts (overrides config)
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Seed the layout's random initialisation for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    info!("Starting build-citations");

    let args = Args::parse();

    let mut cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => {
            debug!("Using config file: {}", path.display());
            load_config(&path)?
        }
        None => {
            debug!("No config file found, using defaults");
            BuildConfig::default()
        }
    };

    if let Some(dir) = args.source_dir {
        cfg.source = SourceConfig::dir(dir);
    }
    if let Some(url) = args.source_url {
        cfg.source = SourceConfig::url(url);
    }
    if let Some(out) = args.output_dir {
        cfg.output_dir = out.into();
    }
    if args.seed.is_some() {
        cfg.layout_seed = args.seed;
    }
    cfg.validate()?;

    let reducer: Arc<dyn Reducer> = Arc::new(match cfg.layout_seed {
        Some(seed) => TsneReducer::seeded(seed),
        None => TsneReducer::new(),
    });
    let mut emitter = JsonDirEmitter::new(&cfg.output_dir)?;

    let summary = match cfg.source.resolve()? {
        Source::Dir(dir) => {
            debug!("Reading export from directory {}", dir.display());
            run_build(&cfg, &DirSource::new(dir), reducer, &mut emitter).await?
        }
        Source::Url(url) => {
            debug!("Reading export from {}", url);
            let source = HttpSource::new(reqwest::Client::builder().build()?, url)?;
            run_build(&cfg, &source, reducer, &mut emitter).await?
        }
    };

    info!(
        "Done - pages={}, layout_points={}, layout_converged={}, output_dir={}",
        summary.counts.pages,
        summary.layout.points,
        summary.layout.converged,
        cfg.output_dir.display()
    );
    Ok(())
}
