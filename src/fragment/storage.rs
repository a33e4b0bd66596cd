use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{RerunError, Result};
use crate::runtime::ScriptRunContext;

/// Stored replay closure for one fragment.
pub type FragmentFn = Arc<dyn Fn(&mut ScriptRunContext) -> Result<()> + Send + Sync>;

/// Key/value store of replayable fragments, owned by one session.
pub trait FragmentStorage: Send {
    /// Returns the stored fragment for `key`.
    fn get(&self, key: &str) -> Result<FragmentFn>;

    /// Saves `value` under `key`, replacing any previous fragment.
    fn set(&mut self, key: &str, value: FragmentFn);

    /// Removes the fragment stored under `key`.
    fn delete(&mut self, key: &str) -> Result<()>;

    /// Removes every stored fragment.
    fn clear(&mut self);

    fn contains(&self, key: &str) -> bool;

    fn keys(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`FragmentStorage`] backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryFragmentStorage {
    fragments: HashMap<String, FragmentFn>,
}

impl MemoryFragmentStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FragmentStorage for MemoryFragmentStorage {
    fn get(&self, key: &str) -> Result<FragmentFn> {
        self.fragments
            .get(key)
            .cloned()
            .ok_or_else(|| RerunError::FragmentNotFound(key.to_string()))
    }

    fn set(&mut self, key: &str, value: FragmentFn) {
        self.fragments.insert(key.to_string(), value);
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.fragments
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| RerunError::FragmentNotFound(key.to_string()))
    }

    fn clear(&mut self) {
        self.fragments.clear();
    }

    fn contains(&self, key: &str) -> bool {
        self.fragments.contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.fragments.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.fragments.len()
    }
}
