use async_trait::async_trait;
use redis::{AsyncCommands, Client};

use crate::error::PersistenceError;
use crate::prefix_rule::PrefixRule;
use crate::prefix_rule_manager::PrefixRuleManager;

/// Keeps every user's rules in one Redis hash, field = rule name, value = JSON.
#[derive(Clone, Debug)]
pub struct RedisPrefixRuleManager {
    client: Client,
}

impl RedisPrefixRuleManager {
    pub fn new(redis_url: &str) -> Result<Self, PersistenceError> {
        let client = Client::open(redis_url)?;
        Ok(RedisPrefixRuleManager { client })
    }

    fn rules_key(user: &str) -> String {
        format!("prefix_rules:{}", user)
    }
}

#[async_trait]
impl PrefixRuleManager for RedisPrefixRuleManager {
    async fn register_prefix_rule(&self, user: &str, rule: PrefixRule) -> Result<(), PersistenceError> {
        let mut conn = self.client.get_async_connection().await?;
        let value = serde_json::to_string(&rule)?;
        let _: () = conn.hset(Self::rules_key(user), &rule.name, value).await?;
        Ok(())
    }

    async fn get_prefix_rule(&self, user: &str, name: &str) -> Result<Option<PrefixRule>, PersistenceError> {
        let mut conn = self.client.get_async_connection().await?;
        let result: Option<String> = conn.hget(Self::rules_key(user), name).await?;
        match result {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    async fn list_prefix_rules(&self, user: &str) -> Result<Vec<PrefixRule>, PersistenceError> {
        let mut conn = self.client.get_async_connection().await?;
        let values: Vec<String> = conn.hvals(Self::rules_key(user)).await?;
        let mut rules = values
            .iter()
            .map(|value| serde_json::from_str::<PrefixRule>(value))
            .collect::<Result<Vec<_>, _>>()?;
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rules)
    }

    async fn delete_prefix_rule(&self, user: &str, name: &str) -> Result<bool, PersistenceError> {
        let mut conn = self.client.get_async_connection().await?;
        let removed: u32 = conn.hdel(Self::rules_key(user), name).await?;
        Ok(removed > 0)
    }
}
