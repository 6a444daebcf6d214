//! Live-reload message protocol.
//!
//! JSON objects tagged by `type`, read by `hotreload.js`:
//!
//! - `reload`: a new build is live, reload the page
//! - `error`: the last rebuild failed, show the overlay
//! - `clear`: the overlay is stale, remove it

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    Reload {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    Error {
        /// Failing stage, e.g. `transform-modules`.
        stage: String,
        /// Text shown in the overlay.
        message: String,
    },

    Clear,
}

impl ReloadMessage {
    pub fn reload(reason: impl Into<String>) -> Self {
        Self::Reload {
            reason: Some(reason.into()),
        }
    }

    pub fn error(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}
