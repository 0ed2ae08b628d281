//! Error types for Newsreel.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a call to an external capability did not produce a usable result.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("{capability} timed out after {}s", .after.as_secs())]
    Timeout {
        capability: &'static str,
        after: Duration,
    },

    #[error("Malformed {capability} response: {detail}")]
    Malformed {
        capability: &'static str,
        detail: String,
    },

    #[error("{capability} failed: {detail}")]
    Service {
        capability: &'static str,
        detail: String,
    },

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cancelled before {0} completed")]
    Cancelled(&'static str),
}

impl CapabilityError {
    pub fn service(capability: &'static str, detail: impl ToString) -> Self {
        Self::Service {
            capability,
            detail: detail.to_string(),
        }
    }

    pub fn malformed(capability: &'static str, detail: impl ToString) -> Self {
        Self::Malformed {
            capability,
            detail: detail.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Library-level error type for Newsreel operations.
#[derive(Error, Debug)]
pub enum NewsreelError {
    #[error("Could not understand the request after {attempts} attempt(s): {last}")]
    UnresolvedIntent { attempts: usize, last: String },

    #[error("Research unavailable: {0}")]
    Fetch(CapabilityError),

    #[error("Content generation failed: {0}")]
    Generation(CapabilityError),

    #[error("Media synthesis failed: {0}")]
    Synthesis(CapabilityError),

    #[error("No research documents to index in {}", .0.display())]
    IndexUnavailable(PathBuf),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl NewsreelError {
    /// Wrap a capability failure raised while fetching research.
    pub fn fetch(err: CapabilityError) -> Self {
        Self::lift(err, Self::Fetch)
    }

    /// Wrap a capability failure raised while generating content.
    pub fn generation(err: CapabilityError) -> Self {
        Self::lift(err, Self::Generation)
    }

    /// Wrap a capability failure raised while synthesizing media.
    pub fn synthesis(err: CapabilityError) -> Self {
        Self::lift(err, Self::Synthesis)
    }

    fn lift(err: CapabilityError, stage: fn(CapabilityError) -> Self) -> Self {
        match err {
            CapabilityError::Cancelled(_) => Self::Cancelled,
            other => stage(other),
        }
    }

    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnresolvedIntent { .. } => {
                "We couldn't work out what you asked for. Try naming a format (text, audio, video) and a subject, e.g. \"AAPL as a video\".".to_string()
            }
            Self::Fetch(_) => "We couldn't gather research for that subject right now. Please try again shortly.".to_string(),
            Self::Generation(e) if e.is_timeout() => {
                "The writing service took too long to respond. Please try again.".to_string()
            }
            Self::Generation(_) => "We couldn't write the brief for that request.".to_string(),
            Self::Synthesis(e) if e.is_timeout() => {
                "Producing the media took too long and was stopped.".to_string()
            }
            Self::Synthesis(_) => "The brief was written but producing the media file failed.".to_string(),
            Self::IndexUnavailable(_) => {
                "There is no research to answer questions from yet. Generate a ticker brief first.".to_string()
            }
            Self::Cancelled => "The request was cancelled.".to_string(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::Config(msg) => format!("Configuration error: {}", msg),
            Self::TomlParse(e) => format!("The configuration file could not be read: {}", e),
            _ => "Something went wrong on our side.".to_string(),
        }
    }

    /// HTTP status for the web interface.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::IndexUnavailable(_) => 404,
            Self::UnresolvedIntent { .. } => 422,
            Self::Fetch(_) => 502,
            Self::Generation(e) | Self::Synthesis(e) if e.is_timeout() => 504,
            Self::Generation(_) => 502,
            Self::Cancelled => 503,
            _ => 500,
        }
    }

    /// Process exit code for the CLI. Fetch and synthesis failures and bad
    /// configuration terminate with a non-zero status; the rest are reported
    /// and the process exits cleanly.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::TomlParse(_) => 2,
            Self::Fetch(_) => 3,
            Self::Synthesis(_) => 4,
            _ => 0,
        }
    }
}

/// Result type alias for Newsreel operations.
pub type Result<T> = std::result::Result<T, NewsreelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_not_a_stage_failure() {
        let err = NewsreelError::synthesis(CapabilityError::Cancelled("speech"));
        assert!(matches!(err, NewsreelError::Cancelled));
    }

    #[test]
    fn test_timeout_message_differs_from_service_failure() {
        let timeout = NewsreelError::generation(CapabilityError::Timeout {
            capability: "completion",
            after: Duration::from_secs(30),
        });
        let failed = NewsreelError::generation(CapabilityError::service("completion", "500"));
        assert_ne!(timeout.user_message(), failed.user_message());
        assert!(timeout.to_string().contains("timed out after 30s"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(NewsreelError::fetch(CapabilityError::service("market data", "down")).exit_code(), 3);
        assert_eq!(NewsreelError::synthesis(CapabilityError::service("ffmpeg", "bad")).exit_code(), 4);
        let unresolved = NewsreelError::UnresolvedIntent {
            attempts: 3,
            last: "no tool call".into(),
        };
        assert_eq!(unresolved.exit_code(), 0);
        assert_eq!(NewsreelError::Config("bad".into()).exit_code(), 2);
    }

    #[test]
    fn test_status_codes_are_distinct_per_kind() {
        let timeout = NewsreelError::synthesis(CapabilityError::Timeout {
            capability: "ffmpeg",
            after: Duration::from_secs(600),
        });
        assert_eq!(timeout.status(), 504);
        assert_eq!(NewsreelError::synthesis(CapabilityError::service("ffmpeg", "x")).status(), 500);
        assert_eq!(NewsreelError::fetch(CapabilityError::service("market data", "x")).status(), 502);
        assert_eq!(NewsreelError::IndexUnavailable(PathBuf::from("research")).status(), 404);
        assert_eq!(
            NewsreelError::UnresolvedIntent {
                attempts: 3,
                last: String::new()
            }
            .status(),
            422
        );
    }
}
