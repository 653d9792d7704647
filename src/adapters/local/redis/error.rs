//! Failures of the Redis-backed store, folded into `Error::Persistence` at
//! the port boundary.

use deadpool_redis::redis::RedisError;
use deadpool_redis::{CreatePoolError, PoolError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis command failed: {0}")]
    Redis(#[from] RedisError),

    #[error("no redis connection available: {0}")]
    Pool(#[from] PoolError),

    #[error("stored record is not valid JSON: {0}")]
    Record(#[from] serde_json::Error),

    #[error("redis pool could not be created: {0}")]
    CreatePool(#[from] CreatePoolError),
}

impl From<StoreError> for crate::error::Error {
    fn from(err: StoreError) -> Self {
        crate::error::Error::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_corrupt_record_is_a_persistence_error() {
        let parse = serde_json::from_str::<u64>("{not json").unwrap_err();
        let err: Error = StoreError::from(parse).into();
        match err {
            Error::Persistence(message) => {
                assert!(message.starts_with("stored record is not valid JSON"))
            }
            other => panic!("expected persistence error, got {:?}", other),
        }
    }
}
