//! Error types for configuration and detection ingestion.
//!
//! Configuration errors are the only fatal class: they are raised while the
//! controller starts and never from inside the decision loop.

use std::fmt;

/// Result type alias for configuration loading and validation
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A value parsed but is outside its allowed range
    OutOfRange {
        parameter: String,
        value: String,
        constraint: String,
    },

    /// An environment override could not be parsed
    InvalidOverride { variable: String, value: String },

    /// The config file could not be read or decoded
    Unreadable { path: String, reason: String },
}

impl ConfigError {
    pub fn out_of_range(
        parameter: impl Into<String>,
        value: impl fmt::Display,
        constraint: impl Into<String>,
    ) -> Self {
        ConfigError::OutOfRange {
            parameter: parameter.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OutOfRange {
                parameter,
                value,
                constraint,
            } => write!(
                f,
                "Invalid configuration: {} = {} (must be {})",
                parameter, value, constraint
            ),
            ConfigError::InvalidOverride { variable, value } => {
                write!(f, "Cannot parse environment override {}={}", variable, value)
            }
            ConfigError::Unreadable { path, reason } => {
                write!(f, "Cannot load config file {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Why a detection was dropped before it reached the tally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionIssue {
    ConfidenceOutOfRange(f32),
    NegativeBox { width: f32, height: f32 },
    NonFiniteBox,
}

impl fmt::Display for DetectionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionIssue::ConfidenceOutOfRange(conf) => {
                write!(f, "confidence {} outside [0, 1]", conf)
            }
            DetectionIssue::NegativeBox { width, height } => {
                write!(f, "negative box dimensions {}x{}", width, height)
            }
            DetectionIssue::NonFiniteBox => write!(f, "non-finite box coordinates"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_parameter() {
        let err = ConfigError::out_of_range("emergency_cooldown_secs", 0.0, "> 0");
        let msg = err.to_string();
        assert!(msg.contains("emergency_cooldown_secs"));
        assert!(msg.contains("> 0"));
    }

    #[test]
    fn detection_issue_display() {
        let issue = DetectionIssue::NegativeBox {
            width: -1.0,
            height: 4.0,
        };
        assert_eq!(issue.to_string(), "negative box dimensions -1x4");
    }
}
