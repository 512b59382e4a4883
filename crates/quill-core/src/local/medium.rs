//! Key-value persistence media backing the local store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;

/// A flat string-to-string slot store, shaped like browser `localStorage`.
pub trait KeyValueMedium: Send + Sync {
    /// Read a slot, `None` when it was never written
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Replace a slot's contents
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Drop a slot entirely
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Process-lifetime medium (tests, ephemeral sessions)
#[derive(Debug, Default)]
pub struct MemoryMedium {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueMedium for MemoryMedium {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_medium_set_get_remove() {
        let medium = MemoryMedium::new();
        assert_eq!(medium.get_item("k").unwrap(), None);

        medium.set_item("k", "v1").unwrap();
        medium.set_item("k", "v2").unwrap();
        assert_eq!(medium.get_item("k").unwrap().as_deref(), Some("v2"));

        medium.remove_item("k").unwrap();
        assert_eq!(medium.get_item("k").unwrap(), None);
    }
}
