mod batch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipfit_core::transcoder::EncoderCapabilities;
use clipfit_core::{
    create_event_channel, load_config, load_default_config, validate_config, ArtifactCache,
    CatalogPublisher, Config, EventEnvelope, FfmpegTranscoder, LadderController, MediaEffects,
    NormalizeRequest, SqliteCatalog, Transcoder,
};

use batch::BatchRunner;

/// Buffer size for the normalize event channel
const EVENT_BUFFER_SIZE: usize = 1000;

#[derive(Parser)]
#[command(name = "clipfit")]
#[command(version, about = "Fit audio and video under an attachment size limit", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to $CLIPFIT_CONFIG, then config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize one or more files, one after another
    Normalize {
        /// Source files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory for delivered artifacts
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Effects, e.g. "amplify=2,reverse,pitch=-3,clip=10,start=5"
        #[arg(short, long)]
        effects: Option<String>,

        /// Catalog key; only valid with a single file. Defaults to the source path.
        #[arg(long)]
        asset_key: Option<String>,

        /// Print every pipeline event as a JSON line on stdout
        #[arg(long)]
        events: bool,
    },
    /// Show the catalog record for an asset
    Lookup {
        asset_key: String,
    },
    /// Check the ffmpeg installation and list hardware encoders
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = resolve_config(cli.config.as_deref())?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    debug!("Configuration hash: {}", &config_hash[..16]);

    match cli.command {
        Commands::Normalize {
            files,
            output_dir,
            effects,
            asset_key,
            events,
        } => normalize(config, files, output_dir, effects, asset_key, events).await,
        Commands::Lookup { asset_key } => lookup(&config, &asset_key).await,
        Commands::Check => check(&config).await,
    }
}

fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("CLIPFIT_CONFIG").ok().map(PathBuf::from));

    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None if Path::new("config.toml").exists() => {
            info!("Loading configuration from config.toml");
            load_config(Path::new("config.toml")).context("Failed to load config.toml")
        }
        None => load_default_config().context("Failed to load default configuration"),
    }
}

fn open_catalog(config: &Config) -> Result<Option<Arc<SqliteCatalog>>> {
    match &config.catalog.path {
        Some(path) => {
            let catalog = SqliteCatalog::new(path)
                .with_context(|| format!("Failed to open catalog {:?}", path))?;
            info!("Catalog initialized at {:?}", path);
            Ok(Some(Arc::new(catalog)))
        }
        None => Ok(None),
    }
}

async fn normalize(
    config: Config,
    files: Vec<PathBuf>,
    output_dir: PathBuf,
    effects: Option<String>,
    asset_key: Option<String>,
    print_events: bool,
) -> Result<i32> {
    if asset_key.is_some() && files.len() > 1 {
        bail!("--asset-key can only be used with a single file");
    }

    let effects: MediaEffects = match effects {
        Some(spec) => spec
            .parse()
            .with_context(|| format!("Invalid effects {:?}", spec))?,
        None => MediaEffects::default(),
    };

    let transcoder = FfmpegTranscoder::new(config.encoder.clone());
    transcoder
        .validate()
        .await
        .context("ffmpeg is not usable")?;

    let (events, rx) = create_event_channel(EVENT_BUFFER_SIZE);
    let drain = tokio::spawn(drain_events(rx, print_events));

    let mut controller = LadderController::new(config.normalizer.clone(), transcoder)
        .with_events(events);
    if config.cache.enabled {
        controller = controller.with_cache(Arc::new(ArtifactCache::from_config(&config.cache)));
    }
    let catalog = open_catalog(&config)?;
    if let Some(catalog) = &catalog {
        controller = controller.with_publisher(Arc::clone(catalog) as Arc<dyn CatalogPublisher>);
    }

    let requests: Vec<NormalizeRequest> = files
        .into_iter()
        .map(|file| {
            let key = match (&asset_key, &catalog) {
                (Some(key), _) => Some(key.clone()),
                (None, Some(_)) => Some(file.display().to_string()),
                (None, None) => None,
            };
            let mut request =
                NormalizeRequest::new(file, output_dir.clone()).with_effects(effects.clone());
            request.asset_key = key;
            request
        })
        .collect();

    let runner = BatchRunner::new(controller);
    let report = runner.run(requests).await;

    // Closing the channel ends the drain task.
    drop(runner);
    if let Err(e) = drain.await {
        error!("Event drain task failed: {}", e);
    }

    info!(
        "Done: {} fit, {} oversized, {} failed",
        report.fitted(),
        report.oversized(),
        report.failed()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if report.failed() > 0 { 1 } else { 0 })
}

async fn drain_events(mut rx: mpsc::Receiver<EventEnvelope>, print: bool) {
    while let Some(envelope) = rx.recv().await {
        match serde_json::to_string(&envelope) {
            Ok(line) if print => println!("{}", line),
            Ok(line) => debug!(target: "clipfit::events", "{}", line),
            Err(e) => error!("Failed to serialize event: {}", e),
        }
    }
}

async fn lookup(config: &Config, asset_key: &str) -> Result<i32> {
    let Some(catalog) = open_catalog(config)? else {
        bail!("No catalog configured (set [catalog] path)");
    };
    let record = catalog
        .lookup(asset_key)
        .await
        .with_context(|| format!("Lookup of {:?} failed", asset_key))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(0)
}

async fn check(config: &Config) -> Result<i32> {
    let transcoder = FfmpegTranscoder::new(config.encoder.clone());
    transcoder
        .validate()
        .await
        .context("ffmpeg is not usable")?;
    info!("ffmpeg at {:?} is usable", config.encoder.ffmpeg_path);

    let capabilities = EncoderCapabilities::detect(&config.encoder).await;
    println!("{}", serde_json::to_string_pretty(&capabilities)?);
    if !capabilities.has_hardware_encoder() {
        info!("No hardware H.264 encoder compiled into ffmpeg, software encoding only");
        return Ok(0);
    }

    let working = transcoder.detect_hardware_encoder().await;
    info!(
        "Hardware encoder {}: {}",
        config.encoder.hardware_encoder,
        if working { "working" } else { "unavailable" }
    );
    Ok(0)
}
