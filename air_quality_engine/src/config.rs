//! Engine configuration: parsing, normalization, and loading.
//!
//! The TOML file has four sections, all optional:
//! - `[cache]`: reading TTL
//! - `[resolver]`: outer deadline, dispatch mode, lookup timeouts
//! - `[forecast]`: confidence decay, jitter amplitude, optional RNG seed
//! - `[providers.<name>]`: one table per measurement provider, in priority
//!   order (first declared = highest priority)
//!
//! Key behaviors:
//! - Provider names are trimmed and lowercased; a collision after
//!   normalization is an error.
//! - Specialty pollutant names go through the pollutant alias table
//!   (`PM2.5`, `ozone`, ...), are stored in canonical form and
//!   de-duplicated preserving order. Unknown names are an error.
//! - Zero timeouts, malformed bounding boxes and out-of-range forecast
//!   parameters are rejected; jitter above the cap is clamped.
//! - Coverage defaults by class: satellites get the satellite footprint,
//!   everything else is global. A satellite declared `global` is an error.
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_config_str`]
//! - Parse + normalize from a file path: [`load_config_path`]
//! - In-place normalization of an already-built config: [`normalize_config`]

use std::collections::{BTreeSet, HashSet};
use std::mem;
use std::path::Path;
use std::time::Duration;

use air_data_ingestor::{BoundingBox, Pollutant};
use anyhow::{Context, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    cache::DEFAULT_TTL,
    cascade::{Coverage, DispatchMode, ProviderClass, SATELLITE_COVERAGE},
    forecast::{DEFAULT_DECAY_RATE, DEFAULT_JITTER, MAX_JITTER},
};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    pub cache: CacheCfg,
    pub resolver: ResolverCfg,
    pub forecast: ForecastCfg,
    /// Provider name -> configuration, in priority order.
    pub providers: IndexMap<String, ProviderCfg>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheCfg {
    pub ttl_secs: u64,
}

impl Default for CacheCfg {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ResolverCfg {
    /// Upper bound on a whole resolution; partial results are merged when it expires.
    pub outer_deadline_ms: u64,
    pub dispatch: DispatchMode,
    pub location_timeout_ms: u64,
    pub weather_timeout_ms: u64,
}

impl Default for ResolverCfg {
    fn default() -> Self {
        Self {
            outer_deadline_ms: 10_000,
            dispatch: DispatchMode::Concurrent,
            location_timeout_ms: 2_000,
            weather_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ForecastCfg {
    /// Confidence lost per forecast hour; must be in (0, 0.1].
    pub decay_rate: f64,
    /// Relative jitter amplitude; clamped to 0.15.
    pub jitter: f64,
    /// Fixed RNG seed for reproducible forecasts.
    pub seed: Option<u64>,
}

impl Default for ForecastCfg {
    fn default() -> Self {
        Self {
            decay_rate: DEFAULT_DECAY_RATE,
            jitter: DEFAULT_JITTER,
            seed: None,
        }
    }
}

/// One measurement provider.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderCfg {
    pub class: ProviderClass,
    /// Per-call timeout; defaults by class (satellite 3 s, ground 5 s, model 8 s).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Defaults by class when absent; see [`ProviderCfg::effective_coverage`].
    #[serde(default)]
    pub coverage: Option<CoverageCfg>,
    /// Pollutants this provider is authoritative for.
    #[serde(default)]
    pub specialty: Vec<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// `"global"`, `"satellite"`, or an explicit `{ lat_min, lat_max, lon_min, lon_max }`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CoverageCfg {
    Named(NamedCoverage),
    Region(BoundingBox),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedCoverage {
    Global,
    Satellite,
}

impl CoverageCfg {
    pub fn resolve(&self) -> Coverage {
        match self {
            CoverageCfg::Named(NamedCoverage::Global) => Coverage::Global,
            CoverageCfg::Named(NamedCoverage::Satellite) => Coverage::Region(SATELLITE_COVERAGE),
            CoverageCfg::Region(bbox) => Coverage::Region(*bbox),
        }
    }
}

impl ProviderCfg {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or_else(|| self.class.default_timeout_ms()))
    }

    pub fn effective_coverage(&self) -> Coverage {
        self.coverage
            .map_or_else(|| self.class.default_coverage(), |coverage| coverage.resolve())
    }

    pub fn specialty_set(&self) -> anyhow::Result<BTreeSet<Pollutant>> {
        self.specialty
            .iter()
            .map(|name| name.parse::<Pollutant>().context("invalid specialty pollutant"))
            .collect()
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn outer_deadline(&self) -> Duration {
        Duration::from_millis(self.resolver.outer_deadline_ms)
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver.location_timeout_ms)
    }

    pub fn weather_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver.weather_timeout_ms)
    }

    /// Logs the effective settings at startup.
    pub fn log_summary(&self) {
        info!(
            ttl_secs = self.cache.ttl_secs,
            outer_deadline_ms = self.resolver.outer_deadline_ms,
            dispatch = ?self.resolver.dispatch,
            decay_rate = self.forecast.decay_rate,
            jitter = self.forecast.jitter,
            providers = self.providers.len(),
            "engine configuration"
        );
        for (name, provider) in &self.providers {
            info!(
                provider = %name,
                class = provider.class.as_str(),
                timeout_ms = provider.timeout().as_millis() as u64,
                specialty = ?provider.specialty,
                enabled = provider.enabled,
                "provider configured"
            );
        }
    }
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Provider keys that changed when lowercasing/trimming.
    pub providers_renamed: usize,
    /// Duplicate specialty entries removed (after alias resolution).
    pub specialties_deduped: usize,
    /// Specialty names rewritten to their canonical spelling.
    pub specialties_canonicalized: usize,
    pub jitter_clamped: bool,
}

/// Normalize and validate a configuration in place.
///
/// Errors:
/// - Empty or duplicate provider names after normalization
/// - Unknown specialty pollutant names
/// - Zero timeouts or outer deadline
/// - Malformed coverage bounding boxes
/// - Explicit `global` coverage on a satellite provider
/// - `decay_rate` outside (0, 0.1], negative or non-finite `jitter`
pub fn normalize_config(cfg: &mut EngineConfig) -> anyhow::Result<NormalizationReport> {
    let mut report = NormalizationReport::default();

    if cfg.resolver.outer_deadline_ms == 0 {
        bail!("resolver.outer_deadline_ms must be greater than zero");
    }
    if cfg.resolver.location_timeout_ms == 0 || cfg.resolver.weather_timeout_ms == 0 {
        bail!("resolver lookup timeouts must be greater than zero");
    }

    let decay = cfg.forecast.decay_rate;
    if !(decay > 0.0 && decay <= 0.1) {
        bail!("forecast.decay_rate must be in (0, 0.1], got {decay}");
    }
    let jitter = cfg.forecast.jitter;
    if !jitter.is_finite() || jitter < 0.0 {
        bail!("forecast.jitter must be a non-negative number, got {jitter}");
    }
    if jitter > MAX_JITTER {
        warn!(jitter, cap = MAX_JITTER, "forecast jitter above cap; clamping");
        cfg.forecast.jitter = MAX_JITTER;
        report.jitter_clamped = true;
    }

    let mut rebuilt: IndexMap<String, ProviderCfg> = IndexMap::new();
    for (raw_name, mut provider) in mem::take(&mut cfg.providers) {
        let name = raw_name.trim().to_lowercase();
        if name.is_empty() {
            bail!("provider name cannot be empty after trimming");
        }
        if name != raw_name {
            report.providers_renamed += 1;
        }
        if rebuilt.contains_key(&name) {
            bail!("duplicate provider name after normalization: {name}");
        }

        if provider.timeout_ms == Some(0) {
            bail!("provider `{name}`: timeout_ms must be greater than zero");
        }
        match provider.coverage {
            Some(CoverageCfg::Region(bbox)) if !bbox.is_well_formed() => {
                bail!("provider `{name}`: coverage bounding box is malformed: {bbox:?}");
            }
            Some(CoverageCfg::Named(NamedCoverage::Global))
                if provider.class == ProviderClass::Satellite =>
            {
                bail!("provider `{name}`: a satellite provider cannot have global coverage");
            }
            _ => {}
        }

        let mut seen = HashSet::new();
        let mut specialty = Vec::with_capacity(provider.specialty.len());
        for raw in mem::take(&mut provider.specialty) {
            let pollutant: Pollutant = raw
                .parse()
                .with_context(|| format!("provider `{name}`: invalid specialty"))?;
            if pollutant.as_str() != raw {
                report.specialties_canonicalized += 1;
            }
            if seen.insert(pollutant) {
                specialty.push(pollutant.as_str().to_string());
            } else {
                report.specialties_deduped += 1;
            }
        }
        provider.specialty = specialty;

        rebuilt.insert(name, provider);
    }
    cfg.providers = rebuilt;

    Ok(report)
}

/// Parse and normalize a configuration from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<EngineConfig> {
    let mut cfg: EngineConfig =
        toml::from_str(toml_str).context("failed to parse engine config TOML")?;
    let report = normalize_config(&mut cfg).context("invalid engine config")?;
    debug!(?report, "engine config normalized");
    Ok(cfg)
}

/// Read a configuration file from disk, parse, and normalize it.
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<EngineConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}
