//! Redis connection pool.

use super::error::StoreError;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Redis-backed adapter for queue and repository operations.
#[derive(Clone)]
pub struct RedisPool {
    pub(super) pool: Pool,
}

impl RedisPool {
    /// Create a new RedisPool with connection pool.
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }

    pub(super) async fn conn(&self) -> Result<Connection, StoreError> {
        Ok(self.pool.get().await?)
    }

    pub(super) async fn get_json<T: DeserializeOwned>(
        conn: &mut Connection,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let json: Option<String> = conn.get(key).await?;
        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    pub(super) async fn set_json<T: Serialize + Sync>(
        conn: &mut Connection,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        conn.set::<_, _, ()>(key, json).await?;
        Ok(())
    }

    /// SET NX; returns whether this call wrote the key
    pub(super) async fn set_json_nx<T: Serialize + Sync>(
        conn: &mut Connection,
        key: &str,
        value: &T,
    ) -> Result<bool, StoreError> {
        let json = serde_json::to_string(value)?;
        Ok(conn.set_nx::<_, _, bool>(key, json).await?)
    }
}
