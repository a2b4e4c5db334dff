//! Device credential registry and authentication gate.
//!
//! External devices authenticate writes with an issued bearer key. The gate
//! only accepts active keys; revocation flips `is_active` without deleting
//! the row, and successful authenticated writes stamp `last_used_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Authentication error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Bearer key is unknown or revoked
    InvalidCredential,
    /// Session token is unknown
    InvalidSession,
    /// Authorization header missing or malformed
    MissingCredential,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredential => write!(f, "Invalid or inactive API key"),
            AuthError::InvalidSession => write!(f, "Invalid session token"),
            AuthError::MissingCredential => write!(f, "Missing or malformed credential"),
        }
    }
}

impl std::error::Error for AuthError {}

/// An issued device key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCredential {
    /// The bearer key value presented by the device
    pub key_value: String,
    /// Subject the device writes on behalf of
    pub owner_id: String,
    /// Human-readable label, e.g. "bedroom sensor"
    pub label: String,
    /// Device family, e.g. "esp32"
    pub device_type: String,
    /// Revoked keys stay in the registry with this flag cleared
    pub is_active: bool,
    /// When the key was issued
    pub created_at: DateTime<Utc>,
    /// Last successful authenticated write, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl DeviceCredential {
    /// Issue a fresh key for an owner.
    pub fn issue(
        owner_id: impl Into<String>,
        label: impl Into<String>,
        device_type: impl Into<String>,
    ) -> Self {
        Self {
            key_value: format!("vpk_{}", Uuid::new_v4().simple()),
            owner_id: owner_id.into(),
            label: label.into(),
            device_type: device_type.into(),
            is_active: true,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    /// Key value with all but the first eight characters masked, for listings.
    pub fn masked_key(&self) -> String {
        let visible: String = self.key_value.chars().take(8).collect();
        format!("{visible}{}", "•".repeat(12))
    }
}

/// Registry of issued device keys.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CredentialRegistry {
    credentials: HashMap<String, DeviceCredential>,
}

impl CredentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the registry from a JSON file, or start empty if absent.
    pub fn load(path: &PathBuf) -> Result<Self, RegistryError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| RegistryError::Io(e.to_string()))?;
            serde_json::from_str(&content).map_err(|e| RegistryError::Parse(e.to_string()))
        } else {
            Ok(Self::new())
        }
    }

    /// Save the registry to a JSON file.
    pub fn save(&self, path: &PathBuf) -> Result<(), RegistryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RegistryError::Io(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RegistryError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| RegistryError::Io(e.to_string()))
    }

    /// Add a credential, keyed by its key value.
    pub fn insert(&mut self, credential: DeviceCredential) {
        self.credentials
            .insert(credential.key_value.clone(), credential);
    }

    /// Validate a bearer key and return the owner it writes for.
    ///
    /// A key whose value matches but whose `is_active` flag is cleared is
    /// rejected the same way an unknown key is.
    pub fn authenticate(&self, key: &str) -> Result<String, AuthError> {
        match self.credentials.get(key) {
            Some(credential) if credential.is_active => Ok(credential.owner_id.clone()),
            _ => Err(AuthError::InvalidCredential),
        }
    }

    /// Stamp `last_used_at` on a key after a successful authenticated write.
    pub fn touch(&mut self, key: &str) {
        if let Some(credential) = self.credentials.get_mut(key) {
            credential.last_used_at = Some(Utc::now());
        }
    }

    /// Deactivate a key. Returns false if the key is unknown.
    pub fn revoke(&mut self, key: &str) -> bool {
        match self.credentials.get_mut(key) {
            Some(credential) => {
                credential.is_active = false;
                true
            }
            None => false,
        }
    }

    /// All credentials, most recently issued first.
    pub fn list(&self) -> Vec<&DeviceCredential> {
        let mut all: Vec<&DeviceCredential> = self.credentials.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

/// Registry persistence errors.
#[derive(Debug)]
pub enum RegistryError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Io(e) => write!(f, "Registry IO error: {e}"),
            RegistryError::Parse(e) => write!(f, "Registry parse error: {e}"),
        }
    }
}

impl std::error::Error for RegistryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticate_active_key() {
        let mut registry = CredentialRegistry::new();
        let credential = DeviceCredential::issue("patient-1", "bedside", "esp32");
        let key = credential.key_value.clone();
        registry.insert(credential);

        assert_eq!(registry.authenticate(&key).unwrap(), "patient-1");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let registry = CredentialRegistry::new();
        assert_eq!(
            registry.authenticate("vpk_nope").unwrap_err(),
            AuthError::InvalidCredential
        );
    }

    #[test]
    fn test_inactive_key_rejected_even_on_exact_match() {
        let mut registry = CredentialRegistry::new();
        let credential = DeviceCredential::issue("patient-1", "bedside", "esp32");
        let key = credential.key_value.clone();
        registry.insert(credential);
        assert!(registry.revoke(&key));

        assert_eq!(
            registry.authenticate(&key).unwrap_err(),
            AuthError::InvalidCredential
        );
    }

    #[test]
    fn test_touch_updates_last_used() {
        let mut registry = CredentialRegistry::new();
        let credential = DeviceCredential::issue("patient-1", "bedside", "esp32");
        let key = credential.key_value.clone();
        registry.insert(credential);

        assert!(registry.list()[0].last_used_at.is_none());
        registry.touch(&key);
        assert!(registry.list()[0].last_used_at.is_some());
    }

    #[test]
    fn test_issued_keys_are_unique() {
        let a = DeviceCredential::issue("patient-1", "a", "esp32");
        let b = DeviceCredential::issue("patient-1", "b", "esp32");
        assert_ne!(a.key_value, b.key_value);
        assert!(a.key_value.starts_with("vpk_"));
    }

    #[test]
    fn test_masked_key_hides_tail() {
        let credential = DeviceCredential::issue("patient-1", "bedside", "esp32");
        let masked = credential.masked_key();
        assert!(masked.starts_with(&credential.key_value[..8]));
        assert!(!masked.contains(&credential.key_value[8..]));
    }

    #[test]
    fn test_registry_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device_keys.json");

        let mut registry = CredentialRegistry::new();
        let credential = DeviceCredential::issue("patient-1", "bedside", "esp32");
        let key = credential.key_value.clone();
        registry.insert(credential);
        registry.save(&path).unwrap();

        let reloaded = CredentialRegistry::load(&path).unwrap();
        assert_eq!(reloaded.authenticate(&key).unwrap(), "patient-1");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let path = PathBuf::from("/nonexistent/device_keys.json");
        let registry = CredentialRegistry::load(&path).unwrap();
        assert!(registry.is_empty());
    }
}
