//! `falabot-config`: runtime configuration for falabot.
//!
//! Provides:
//! - Typed settings loaded from environment variables
//! - Fail-fast credential checks (no credential ever lives in source)
//! - Secret redaction for safe logging
//! - Validation with errors and warnings

pub mod redact;
pub mod settings;
pub mod validation;

pub use redact::redact_secret;
pub use settings::{Config, TtsCredential};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::collections::HashMap;

use falabot_core::{FalaError, Result};

/// Load settings from the process environment and validate them.
///
/// Validation messages go to whatever `tracing` subscriber is installed at
/// call time. Binaries that set up logging from the loaded settings should
/// use [`Config::from_env`] and call [`check`] once the logger is up.
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env()?;
    check(&config)?;
    Ok(config)
}

/// Same as [`load_from_env`] over an explicit variable map.
pub fn load_from_map(vars: &HashMap<String, String>) -> Result<Config> {
    let config = Config::from_map(vars)?;
    check(&config)?;
    Ok(config)
}

/// Validate `config`, logging every warning and error. Fails on the first error.
pub fn check(config: &Config) -> Result<()> {
    let report = validate(config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if let Some(first) = report.errors.first() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        return Err(FalaError::Config(first.to_string()));
    }
    Ok(())
}
