use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvVarError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// The variable is set but its value could not be parsed.
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Invalid { name: String, value: String },
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, EnvVarError> {
    std::env::var(name).map_err(|_| EnvVarError::Missing(name.to_string()))
}

/// Reads and parses an optional environment variable.
///
/// Returns `Ok(None)` when the variable is unset and an
/// [`EnvVarError::Invalid`] when it is set to something `T` can't parse.
pub fn parse_env_var<T: FromStr>(name: &str) -> Result<Option<T>, EnvVarError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| EnvVarError::Invalid {
                name: name.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}
