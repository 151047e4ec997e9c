use thiserror::Error;

use crate::api::{CallOutcome, OutcomeKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("API call failed ({kind}): {message}")]
    Api { kind: OutcomeKind, message: String },

    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Converts a non-success outcome into an error.
    pub fn from_outcome(outcome: &CallOutcome) -> Self {
        Error::Api {
            kind: outcome.kind,
            message: outcome.describe(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
