use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::error::PersistenceError;
use crate::prefix_rule::PrefixRule;

/// Stores each user's named bases.
#[async_trait]
pub trait PrefixRuleManager: Send + Sync {
    async fn register_prefix_rule(&self, user: &str, rule: PrefixRule) -> Result<(), PersistenceError>;
    async fn get_prefix_rule(&self, user: &str, name: &str) -> Result<Option<PrefixRule>, PersistenceError>;
    /// Rules sorted by name.
    async fn list_prefix_rules(&self, user: &str) -> Result<Vec<PrefixRule>, PersistenceError>;
    /// Returns whether a rule was removed.
    async fn delete_prefix_rule(&self, user: &str, name: &str) -> Result<bool, PersistenceError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPrefixRuleManager {
    rules: RwLock<HashMap<String, BTreeMap<String, PrefixRule>>>,
}

impl InMemoryPrefixRuleManager {
    pub fn new() -> Self {
        InMemoryPrefixRuleManager {
            rules: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PrefixRuleManager for InMemoryPrefixRuleManager {
    async fn register_prefix_rule(&self, user: &str, rule: PrefixRule) -> Result<(), PersistenceError> {
        let mut rules = self.rules.write().await;
        rules
            .entry(user.to_string())
            .or_default()
            .insert(rule.name.clone(), rule);
        Ok(())
    }

    async fn get_prefix_rule(&self, user: &str, name: &str) -> Result<Option<PrefixRule>, PersistenceError> {
        let rules = self.rules.read().await;
        Ok(rules.get(user).and_then(|owned| owned.get(name)).cloned())
    }

    async fn list_prefix_rules(&self, user: &str) -> Result<Vec<PrefixRule>, PersistenceError> {
        let rules = self.rules.read().await;
        Ok(rules
            .get(user)
            .map(|owned| owned.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_prefix_rule(&self, user: &str, name: &str) -> Result<bool, PersistenceError> {
        let mut rules = self.rules.write().await;
        Ok(rules
            .get_mut(user)
            .map(|owned| owned.remove(name).is_some())
            .unwrap_or(false))
    }
}
