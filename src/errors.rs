use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::ConfigError;

/// Error type shared by the calculators, the ledger, and the storage backends.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Persistence error: {0}")]
    Storage(String),
}

impl BillingError {
    /// Conflicts mean the write was already applied; callers surface them as a duplicate notice.
    pub fn is_conflict(&self) -> bool {
        matches!(self, BillingError::Conflict(_))
    }
}

pub type BillingResult<T> = Result<T, BillingError>;

impl From<std::io::Error> for BillingError {
    fn from(err: std::io::Error) -> Self {
        BillingError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for BillingError {
    fn from(err: serde_json::Error) -> Self {
        BillingError::Storage(err.to_string())
    }
}

impl From<ConfigError> for BillingError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(io) => BillingError::Storage(io.to_string()),
            ConfigError::Serde(message) | ConfigError::Invalid(message) => {
                BillingError::Configuration(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_surface_as_configuration() {
        let err = BillingError::from(ConfigError::Invalid("peak rate must be positive".into()));
        assert!(matches!(err, BillingError::Configuration(ref m) if m.contains("peak")));
        assert!(!err.is_conflict());
    }
}
