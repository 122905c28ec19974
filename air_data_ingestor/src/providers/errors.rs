use std::time::Duration;

use thiserror::Error;

/// Errors that can occur within a provider implementation.
///
/// The engine never surfaces these to its callers; every variant is
/// treated as "no data from this provider" by the cascade.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The call did not finish within its budget.
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    /// Network failure, refused connection, DNS, ...
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider's API returned a specific error message (e.g., invalid API key).
    #[error("API error: {0}")]
    Api(String),

    /// The source answered but has nothing near the coordinate.
    #[error("no data near {latitude:.3}, {longitude:.3}")]
    NoData { latitude: f64, longitude: f64 },

    /// The payload could not be decoded.
    #[error("failed to parse provider payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// An internal error occurred while processing data within the provider.
    #[error("internal provider error: {0}")]
    Internal(String),
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Error)]
pub enum ProviderInitError {
    #[error("failed to read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_json::Error),
}
