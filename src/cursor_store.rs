use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::ean::BaseCode;
use crate::error::PersistenceError;

const FREE_FORM_BASE: &str = "__free__";

/// Where the next-to-issue base code of each sequence is kept.
///
/// Writes go through `compare_and_set` only, so a cursor can never be moved
/// by a caller that did not see its current value.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<BaseCode>, PersistenceError>;

    /// Replaces the cursor with `new` if it still equals `expected`
    /// (`None` meaning absent). Returns whether the swap happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&BaseCode>,
        new: &BaseCode,
    ) -> Result<bool, PersistenceError>;

    async fn delete(&self, key: &str) -> Result<(), PersistenceError>;
}

pub fn cursor_key(user: &str, base_name: &str) -> String {
    format!("cursor:{}:{}", user, base_name)
}

pub fn free_form_cursor_key(user: &str) -> String {
    cursor_key(user, FREE_FORM_BASE)
}

pub(crate) fn decode_cursor(key: &str, raw: String) -> Result<BaseCode, PersistenceError> {
    BaseCode::parse(&raw).map_err(|_| PersistenceError::CorruptCursor {
        key: key.to_string(),
        value: raw,
    })
}

#[derive(Debug, Default)]
pub struct InMemoryCursorStore {
    cursors: RwLock<HashMap<String, BaseCode>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        InMemoryCursorStore {
            cursors: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn get(&self, key: &str) -> Result<Option<BaseCode>, PersistenceError> {
        let cursors = self.cursors.read().await;
        Ok(cursors.get(key).copied())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&BaseCode>,
        new: &BaseCode,
    ) -> Result<bool, PersistenceError> {
        let mut cursors = self.cursors.write().await;
        if cursors.get(key) != expected {
            return Ok(false);
        }
        cursors.insert(key.to_string(), *new);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        let mut cursors = self.cursors.write().await;
        cursors.remove(key);
        Ok(())
    }
}
