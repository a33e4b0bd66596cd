use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Per-session key/value store that survives reruns. Values are kept as JSON
/// so pages and fragments can share them without agreeing on Rust types.
/// Clones share the same map.
#[derive(Clone, Default)]
pub struct SessionState {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T>(&self, key: impl Into<String>, value: T) -> Result<(), SessionStateError>
    where
        T: Serialize,
    {
        let value = serde_json::to_value(value)?;
        let mut guard = self.inner.write().map_err(|_| SessionStateError::Poisoned)?;
        guard.insert(key.into(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Value, SessionStateError> {
        let guard = self.inner.read().map_err(|_| SessionStateError::Poisoned)?;
        guard
            .get(key)
            .cloned()
            .ok_or_else(|| SessionStateError::Missing(key.to_string()))
    }

    pub fn get_as<T>(&self, key: &str) -> Result<T, SessionStateError>
    where
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(self.get(key)?)?)
    }

    pub fn get_or_insert_with<T, F>(&self, key: &str, make: F) -> Result<Value, SessionStateError>
    where
        T: Serialize,
        F: FnOnce() -> T,
    {
        if let Ok(value) = self.get(key) {
            return Ok(value);
        }
        let value = serde_json::to_value(make())?;
        let mut guard = self.inner.write().map_err(|_| SessionStateError::Poisoned)?;
        Ok(guard.entry(key.to_string()).or_insert(value).clone())
    }

    pub fn remove(&self, key: &str) -> Result<Option<Value>, SessionStateError> {
        let mut guard = self.inner.write().map_err(|_| SessionStateError::Poisoned)?;
        Ok(guard.remove(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .read()
            .map(|guard| guard.contains_key(key))
            .unwrap_or(false)
    }

    pub fn clear(&self) -> Result<(), SessionStateError> {
        let mut guard = self.inner.write().map_err(|_| SessionStateError::Poisoned)?;
        guard.clear();
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SessionStateError {
    #[error("session state key `{0}` not found")]
    Missing(String),
    #[error("session state value could not be converted: {0}")]
    Conversion(#[from] serde_json::Error),
    #[error("session state poisoned")]
    Poisoned,
}
