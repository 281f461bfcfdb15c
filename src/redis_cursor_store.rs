use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script};

use crate::cursor_store::{decode_cursor, CursorStore};
use crate::ean::BaseCode;
use crate::error::PersistenceError;

// An empty expected value stands for "key absent".
const COMPARE_AND_SET: &str = r"
local current = redis.call('GET', KEYS[1])
if (current == false and ARGV[1] == '') or current == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
end
return 0
";

/// Cursor store backed by Redis. The compare-and-set runs as a Lua script so
/// the check and the write happen atomically on the server.
#[derive(Clone, Debug)]
pub struct RedisCursorStore {
    client: Client,
    script: Script,
}

impl RedisCursorStore {
    pub fn new(redis_url: &str) -> Result<Self, PersistenceError> {
        let client = Client::open(redis_url)?;
        Ok(RedisCursorStore {
            client,
            script: Script::new(COMPARE_AND_SET),
        })
    }
}

#[async_trait]
impl CursorStore for RedisCursorStore {
    async fn get(&self, key: &str) -> Result<Option<BaseCode>, PersistenceError> {
        let mut conn = self.client.get_async_connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|value| decode_cursor(key, value)).transpose()
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&BaseCode>,
        new: &BaseCode,
    ) -> Result<bool, PersistenceError> {
        let mut conn = self.client.get_async_connection().await?;
        let expected = expected.map(|code| code.to_string()).unwrap_or_default();
        let swapped: i32 = self
            .script
            .key(key)
            .arg(expected)
            .arg(new.to_string())
            .invoke_async(&mut conn)
            .await?;
        Ok(swapped == 1)
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
