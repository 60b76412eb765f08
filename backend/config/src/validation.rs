//! Config validation: semantic checks with user-friendly messages.

use std::time::Duration;

use thiserror::Error;

use crate::settings::Config;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &Config) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_command(config, &mut report);
    validate_voice(config, &mut report);
    validate_timeouts(config, &mut report);
    validate_encoder(config, &mut report);
    report
}

fn validate_command(config: &Config, report: &mut ValidationReport) {
    if config.command.trim().is_empty() {
        report.error("command", "Join command must not be empty");
    } else if config.command.trim() != config.command {
        report.error(
            "command",
            "Join command must not start or end with whitespace; it would never match",
        );
    } else if config.command.chars().any(char::is_whitespace) {
        report.warn("command", "Join command contains whitespace; matching is by prefix");
    }
}

fn validate_voice(config: &Config, report: &mut ValidationReport) {
    if !(0.25..=4.0).contains(&config.speaking_rate) {
        report.warn(
            "speaking_rate",
            format!(
                "Speaking rate {} is outside 0.25..=4.0 and will likely be rejected",
                config.speaking_rate
            ),
        );
    }
    if !config.tts_base_url.starts_with("http://") && !config.tts_base_url.starts_with("https://") {
        report.error("tts_base_url", "Speech service URL must be http(s)");
    }
}

fn validate_timeouts(config: &Config, report: &mut ValidationReport) {
    for (path, value) in [
        ("synthesis_timeout", config.synthesis_timeout),
        ("io_timeout", config.io_timeout),
        ("encode_timeout", config.encode_timeout),
    ] {
        if value == Duration::ZERO {
            report.error(path, "Timeout must be at least one second");
        }
    }
}

fn validate_encoder(config: &Config, report: &mut ValidationReport) {
    if !(6_000..=510_000).contains(&config.opus_bitrate) {
        report.warn(
            "opus_bitrate",
            format!("Opus bitrate {} is outside 6000..=510000", config.opus_bitrate),
        );
    }
    if config.audio_dump.as_ref() == Some(&config.frame_file) {
        report.error("audio_dump", "Audio dump must not overwrite the frame file");
    }
}
