//! Postgres-backed repository implementations.

mod courses;
mod enrollments;
mod queue;
mod requests;
mod students;
mod util;

pub use queue::PostgresEnrollmentQueue;
pub use util::map_sqlx_error;

use std::sync::Arc;

use apalis_sql::postgres::PostgresStorage;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::types::ServiceKind;

/// One service's database. Each service only touches its own tables.
#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    /// Apply the service's schema. The enrollment database also hosts the queue
    /// tables, whose migrations share the `_sqlx_migrations` ledger with ours.
    pub async fn run_migrations(pool: &PgPool, service: ServiceKind) -> Result<(), sqlx::Error> {
        let mut migrator = match service {
            ServiceKind::Courses => sqlx::migrate!("./migrations/courses"),
            ServiceKind::Students => sqlx::migrate!("./migrations/students"),
            ServiceKind::Enrollment => {
                let mut queue = PostgresStorage::migrations();
                queue.set_ignore_missing(true);
                queue.run(pool).await?;
                sqlx::migrate!("./migrations/enrollment")
            }
        };
        migrator.set_ignore_missing(true);
        migrator.run(pool).await.map_err(Into::into)
    }
}
