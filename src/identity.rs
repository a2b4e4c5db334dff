//! Session identity shim.
//!
//! Session issuance belongs to an external identity provider; this module
//! only verifies presented session tokens against a token -> owner map, the
//! way the device gate verifies device keys. Kept deliberately thin.

use crate::credentials::AuthError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Verifier for session bearer tokens.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SessionProvider {
    sessions: HashMap<String, String>,
}

impl SessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider recognizing a single token, for tests and local sessions.
    pub fn single(token: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let mut sessions = HashMap::new();
        sessions.insert(token.into(), owner_id.into());
        Self { sessions }
    }

    /// Load the token map from a JSON file, or start empty if absent.
    pub fn load(path: &PathBuf) -> Result<Self, std::io::Error> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(std::io::Error::other)
        } else {
            Ok(Self::new())
        }
    }

    /// Register a session token for an owner.
    pub fn insert(&mut self, token: impl Into<String>, owner_id: impl Into<String>) {
        self.sessions.insert(token.into(), owner_id.into());
    }

    /// Resolve a session token to its owner.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.sessions
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidSession)
    }
}
