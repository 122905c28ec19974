//! Source cascade: which providers to ask, how to ask them, and how to
//! merge what comes back.
//!
//! Providers are consulted in registry (priority) order, gated by their
//! geographic coverage. The first provider to supply a pollutant wins it,
//! unless a later provider is the designated specialist for that pollutant.
//! When every provider comes back empty the [`estimator::RegionalEstimator`]
//! fills in, so a resolution always produces a reading.

pub mod estimator;
pub mod registry;
pub mod resolver;

use serde::{Deserialize, Serialize};

pub use estimator::{RegionProfile, RegionalEstimator};
pub use registry::{Coverage, ProviderDescriptor, ProviderRegistry, SATELLITE_COVERAGE};
pub use resolver::{AttemptOutcome, CascadeResolver, DispatchMode, ProviderAttempt, Resolution};

/// Broad kind of data source; drives default timeouts and confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderClass {
    Satellite,
    GroundNetwork,
    Model,
}

impl ProviderClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProviderClass::Satellite => "satellite",
            ProviderClass::GroundNetwork => "ground_network",
            ProviderClass::Model => "model",
        }
    }

    pub const fn default_timeout_ms(&self) -> u64 {
        match self {
            ProviderClass::Satellite => 3_000,
            ProviderClass::GroundNetwork => 5_000,
            ProviderClass::Model => 8_000,
        }
    }

    /// Satellites only see their footprint; every other class is global.
    pub const fn default_coverage(&self) -> Coverage {
        match self {
            ProviderClass::Satellite => Coverage::Region(SATELLITE_COVERAGE),
            ProviderClass::GroundNetwork | ProviderClass::Model => Coverage::Global,
        }
    }
}
