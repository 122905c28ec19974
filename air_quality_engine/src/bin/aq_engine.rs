use std::collections::HashMap;
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use air_data_ingestor::{
    LocationResolver, MeasurementProvider, WeatherProvider,
    providers::replay::{ReplayFixture, ReplayProvider},
};
use air_quality_engine::{
    AirQualityService,
    cascade::{ProviderClass, ProviderRegistry},
    clock::SystemClock,
    config::{EngineConfig, ProviderCfg, load_config_path},
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shared_utils::env::{get_env_var, parse_env_var};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Air-quality aggregation engine")]
struct Cli {
    /// Engine config (TOML). Falls back to $AQ_ENGINE_CONFIG, then built-in defaults.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Replay fixture (JSON) serving the configured providers.
    #[arg(long, global = true, value_name = "FILE")]
    fixtures: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Cmd {
    /// Current air quality at a coordinate.
    Current {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Hourly forecast at a coordinate.
    Forecast {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },
}

/// `RUST_LOG` if set, otherwise `AQ_LOG_LEVEL` (default `info`). Logs go to
/// stderr so stdout stays parseable.
fn init_tracing() {
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AQ_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_env_filter(env_filter)
        .with_ansi(std::io::stderr().is_terminal())
        .compact()
        .init();
}

fn load_config(cli_path: Option<PathBuf>) -> Result<EngineConfig> {
    let path = cli_path.or_else(|| get_env_var("AQ_ENGINE_CONFIG").ok().map(PathBuf::from));
    let mut config = match path {
        Some(path) => load_config_path(&path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = parse_env_var::<u64>("AQ_FORECAST_SEED")? {
        config.forecast.seed = Some(seed);
    }
    Ok(config)
}

struct Collaborators {
    registry: ProviderRegistry,
    weather: Option<Arc<dyn WeatherProvider>>,
    locator: Option<Arc<dyn LocationResolver>>,
}

/// Binds configured providers to replay adapters. With fixtures but no
/// configured providers, every recorded source is registered as a ground
/// network, in name order.
fn collaborators(config: &mut EngineConfig, fixtures: Option<PathBuf>) -> Result<Collaborators> {
    let Some(path) = fixtures else {
        return Ok(Collaborators {
            registry: ProviderRegistry::from_config(config, &HashMap::new())?,
            weather: None,
            locator: None,
        });
    };

    let fixture = Arc::new(
        ReplayFixture::from_path(&path)
            .with_context(|| format!("load fixtures {}", path.display()))?,
    );

    if config.providers.is_empty() {
        let mut names: Vec<&str> = fixture.provider_names().collect();
        names.sort_unstable();
        for name in names {
            config.providers.insert(
                name.to_string(),
                ProviderCfg {
                    class: ProviderClass::GroundNetwork,
                    timeout_ms: None,
                    coverage: None,
                    specialty: Vec::new(),
                    enabled: true,
                },
            );
        }
    }

    let adapters: HashMap<String, Arc<dyn MeasurementProvider>> = config
        .providers
        .keys()
        .map(|name| {
            let adapter: Arc<dyn MeasurementProvider> =
                Arc::new(ReplayProvider::new(name.clone(), fixture.clone()));
            (name.clone(), adapter)
        })
        .collect();
    let lookups = Arc::new(ReplayProvider::new("fixture", fixture));

    Ok(Collaborators {
        registry: ProviderRegistry::from_config(config, &adapters)?,
        weather: Some(lookups.clone()),
        locator: Some(lookups),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = load_config(cli.config)?;
    let Collaborators {
        registry,
        weather,
        locator,
    } = collaborators(&mut config, cli.fixtures)?;
    config.log_summary();
    info!(providers = registry.len(), "registry ready");

    let service =
        AirQualityService::from_config(&config, registry, weather, locator, Arc::new(SystemClock));

    let rendered = match cli.cmd {
        Cmd::Current { lat, lon } => {
            let current = service.get_current(lat, lon).await?;
            match cli.format {
                Format::Json => serde_json::to_string_pretty(&*current.reading)?,
                Format::Text => current.reading.to_string(),
            }
        }
        Cmd::Forecast { lat, lon, hours } => {
            let series = service.get_forecast(lat, lon, hours).await?;
            match cli.format {
                Format::Json => serde_json::to_string_pretty(&series)?,
                Format::Text => series.to_string(),
            }
        }
    };
    println!("{rendered}");

    Ok(())
}
