use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::application::{
    jobs::WorkItem,
    repos::{EnrollmentQueue, RepoError},
};

use super::map_sqlx_error;

/// Retries happen inside the worker, so the queue itself never redelivers.
const QUEUE_MAX_ATTEMPTS: i32 = 1;
const QUEUE_PRIORITY: i32 = 0;

/// Producer side of the durable apalis queue.
#[derive(Clone)]
pub struct PostgresEnrollmentQueue {
    pool: PgPool,
    queue_name: String,
}

impl PostgresEnrollmentQueue {
    pub fn new(pool: PgPool, queue_name: impl Into<String>) -> Self {
        Self {
            pool,
            queue_name: queue_name.into(),
        }
    }
}

#[async_trait]
impl EnrollmentQueue for PostgresEnrollmentQueue {
    async fn enqueue(&self, item: &WorkItem) -> Result<String, RepoError> {
        let payload = serde_json::to_value(item).map_err(|err| RepoError::InvalidInput {
            message: format!("work item could not be encoded: {err}"),
        })?;

        let id: String = sqlx::query_scalar(
            r#"
            SELECT (apalis.push_job($1, $2::json, $3, $4, $5, $6)).id
            "#,
        )
        .bind(&self.queue_name)
        .bind(payload)
        .bind("Pending")
        .bind(OffsetDateTime::now_utc())
        .bind(QUEUE_MAX_ATTEMPTS)
        .bind(QUEUE_PRIORITY)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }
}
