use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use textgen_config::config::watcher::{spawn_reload_loop, DirectoryWatcher, DEFAULT_DEBOUNCE};
use textgen_config::observability::logging;
use textgen_config::registry::{GisEngine, NoGisEngine, StaticGisEngine};
use textgen_config::{Registry, Shutdown, TextgenSettings};

#[derive(Parser)]
#[command(name = "textgen-config")]
#[command(about = "Load, inspect and watch textgen product configurations", long_about = None)]
struct Cli {
    /// Main configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Geometries to serve instead of a GIS database
    #[arg(short, long)]
    geometries: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every product and report the result
    Check,
    /// Print one product's resolved configuration as JSON
    Show { product: String },
    /// Print the text generator settings of one product
    Settings {
        product: String,
        /// Request override, `name=value`
        #[arg(long = "set")]
        overrides: Vec<String>,
    },
    /// Load, then reload on product file changes until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "textgen-config failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let gis: Arc<dyn GisEngine> = match &cli.geometries {
        Some(path) => Arc::new(StaticGisEngine::from_file(path)?),
        None => Arc::new(NoGisEngine),
    };

    let config = cli.config.clone();
    let registry = tokio::task::spawn_blocking(move || Registry::init(&config, gis)).await??;
    let registry = Arc::new(registry);

    match cli.command {
        Commands::Check => {
            let snapshot = registry.snapshot();
            for (name, product) in snapshot.products() {
                let masks = snapshot.product_masks(name).map_or(0, |m| m.len());
                println!(
                    "{name}: {} (language {}, {} masks)",
                    product.path().display(),
                    product.language(),
                    masks
                );
            }
            println!("{} products OK", snapshot.len());
        }
        Commands::Show { product } => {
            let product = registry.product_config(&product)?;
            println!("{}", serde_json::to_string_pretty(product.as_ref())?);
        }
        Commands::Settings { product, overrides } => {
            let product = registry.product_config(&product)?;
            let overrides: Vec<(String, String)> = overrides
                .iter()
                .map(|o| match o.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (o.clone(), String::new()),
                })
                .collect();
            let mut modified = String::new();
            let settings = TextgenSettings::from_product(&product, &overrides, &mut modified);
            for (key, value) in settings.entries() {
                println!("{key} = {value}");
            }
            if !modified.is_empty() {
                println!("# modified: {modified}");
            }
        }
        Commands::Watch => watch(registry).await?,
    }

    Ok(())
}

async fn watch(registry: Arc<Registry>) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Shutdown::with_cancel_flag(registry.cancel_flag());
    let settings = registry.watch_settings().clone();

    let watcher = DirectoryWatcher::new(
        registry.directories_to_monitor(),
        &settings.file_pattern,
        settings.poll_interval,
    )?;
    let (_guard, rx) = watcher.run()?;
    let reloads = spawn_reload_loop(Arc::clone(&registry), rx, &shutdown, DEFAULT_DEBOUNCE);

    tracing::info!(url = %registry.default_url(), "Watching for configuration changes");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    shutdown.trigger();
    reloads.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
