//! Reload protocol messages.
//!
//! JSON objects tagged by `type`:
//!
//! - `connected`: sent once after the handshake
//! - `reload`: full page reload
//! - `error`: show a compile error overlay, no reload
//! - `clear_error`: remove the overlay

use serde::{Deserialize, Serialize};

/// Message sent from the server to browser clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    Connected {
        version: String,
    },

    Reload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    Error {
        /// Source file, relative to the project root
        path: String,
        error: String,
    },

    ClearError,
}

impl ReloadMessage {
    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn reload(reason: impl Into<String>) -> Self {
        Self::Reload {
            reason: Some(reason.into()),
        }
    }

    pub fn error(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Error {
            path: path.into(),
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
