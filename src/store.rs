//! The credential store interface: a key-value store of serialized
//! credentials, keyed by credential id. Authorities serialized in ids-only
//! mode lean on a store to hold the credentials themselves.
//!
//! The store is an external collaborator; this module defines the contract
//! and ships an in-memory implementation for tests and embedders that don't
//! need persistence.

use crate::identity::credential::CredentialID;
use std::collections::HashMap;

/// A keyed store of serialized credentials.
pub trait CredentialStore {
    /// Load a serialized credential by id. `None` means the store has never
    /// seen it.
    fn load(&self, id: &CredentialID) -> Option<Vec<u8>>;

    /// Save a serialized credential under its id, returning whether the store
    /// accepted it.
    fn save(&mut self, id: &CredentialID, credential: &[u8]) -> bool;
}

/// An in-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a credential from the store. Mostly useful for testing
    /// missing-credential behavior.
    pub fn remove(&mut self, id: &CredentialID) -> Option<Vec<u8>> {
        self.entries.remove(&id.as_string())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, id: &CredentialID) -> Option<Vec<u8>> {
        self.entries.get(&id.as_string()).cloned()
    }

    fn save(&mut self, id: &CredentialID, credential: &[u8]) -> bool {
        self.entries.insert(id.as_string(), Vec::from(credential));
        true
    }
}
