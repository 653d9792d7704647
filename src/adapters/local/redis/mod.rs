//! Redis adapter for local deployment.
//!
//! This module provides Redis-backed implementations of:
//! - `JobQueuePort` for FIFO job submission and claiming
//! - `ChunkRepository`, `UnitRepository` and `DedupStore` for durable records

mod error;
mod pool;
mod queue;
mod repository;

pub use error::StoreError;
pub use pool::RedisPool;

/// Redis key constants
const CHUNK_PREFIX: &str = "foley:chunk:";
const CHUNK_INDEX_PREFIX: &str = "foley:chunk_index:";
const GROUP_PREFIX: &str = "foley:group:";
const HASH_PREFIX: &str = "foley:hash:";
const UNIT_PREFIX: &str = "foley:unit:";
const JOB_PREFIX: &str = "foley:job:";
const QUEUED_JOBS: &str = "foley:jobs:queued";
