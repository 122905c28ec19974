use air_data_ingestor::CoordinateError;
use thiserror::Error;

/// Input rejected before any provider is consulted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid coordinate: {0}")]
    Coordinate(#[from] CoordinateError),

    #[error("forecast horizon must be between 1 and 72 hours, got {0}")]
    ForecastHours(u32),
}

/// The only error type that crosses the service boundary.
///
/// Provider failures, timeouts and empty results are absorbed by the
/// cascade and surface as lower confidence, never as an `EngineError`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<CoordinateError> for EngineError {
    fn from(err: CoordinateError) -> Self {
        EngineError::Validation(err.into())
    }
}
