//! Redis JobQueuePort implementation.
//!
//! Job records live under `foley:job:<id>`; the ids of queued jobs sit in a
//! sorted set scored by `created_at`, so ZPOPMIN hands out the oldest job even
//! when submitters race.

use super::error::StoreError;
use super::pool::RedisPool;
use super::{JOB_PREFIX, QUEUED_JOBS};
use crate::domain::jobs::{JobStatus, QueueJob};
use crate::error::{Error, Result};
use crate::ports::queue::JobQueuePort;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use tracing::warn;
use uuid::Uuid;

fn job_key(id: Uuid) -> String {
    format!("{}{}", JOB_PREFIX, id)
}

/// Microseconds since the epoch; exact in an f64 for the foreseeable future.
fn queue_score(job: &QueueJob) -> f64 {
    job.created_at.timestamp_micros() as f64
}

#[async_trait]
impl JobQueuePort for RedisPool {
    async fn enqueue_job(&self, job: &QueueJob) -> Result<()> {
        let mut conn = self.conn().await?;
        RedisPool::set_json(&mut conn, &job_key(job.id), job).await?;
        conn.zadd::<_, _, _, ()>(QUEUED_JOBS, job.id.to_string(), queue_score(job))
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<QueueJob>> {
        let mut conn = self.conn().await?;
        loop {
            let popped: Vec<(String, f64)> = conn
                .zpopmin(QUEUED_JOBS, 1)
                .await
                .map_err(StoreError::from)?;
            let Some((raw_id, _)) = popped.into_iter().next() else {
                return Ok(None);
            };
            let Ok(id) = Uuid::parse_str(&raw_id) else {
                warn!(raw_id, "dropping malformed job id from queue");
                continue;
            };
            let key = job_key(id);
            let Some(mut job) = RedisPool::get_json::<QueueJob>(&mut conn, &key).await? else {
                warn!(job_id = %id, "queued job has no record");
                continue;
            };
            if job.status != JobStatus::Queued {
                continue;
            }
            job.transition(JobStatus::Processing)?;
            RedisPool::set_json(&mut conn, &key, &job).await?;
            return Ok(Some(job));
        }
    }

    async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<QueueJob> {
        let mut conn = self.conn().await?;
        let key = job_key(id);
        let mut job = RedisPool::get_json::<QueueJob>(&mut conn, &key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", id)))?;
        job.transition(status)?;
        RedisPool::set_json(&mut conn, &key, &job).await?;
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<QueueJob>> {
        let mut conn = self.conn().await?;
        Ok(RedisPool::get_json(&mut conn, &job_key(id)).await?)
    }
}
