//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (worker count > 0, file path not empty)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - The log level is not checked here; an unparseable level has its own
//!   fallback policy applied when logging is configured

use std::fmt;

use crate::config::schema::AppConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    ZeroWorkers,
    EmptyLogFile,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ZeroWorkers => write!(f, "workers must be at least 1"),
            ValidationError::EmptyLogFile => write!(f, "log.file must not be empty when set"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.workers == 0 {
        errors.push(ValidationError::ZeroWorkers);
    }

    if let Some(file) = &config.log.file {
        if file.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyLogFile);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = AppConfig::default();
        config.workers = 0;
        config.log.file = Some(PathBuf::new());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ZeroWorkers, ValidationError::EmptyLogFile]
        );
    }
}
