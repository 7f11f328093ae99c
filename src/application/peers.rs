//! Ports for the course and student stores as seen from the enrollment service.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{Course, CoursePatch, OccupancyChange, Student};

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("course is at capacity")]
    CourseFull,
    #[error("peer unavailable: {0}")]
    Unavailable(String),
    #[error("peer responded with status {status}: {message}")]
    Unexpected { status: u16, message: String },
    #[error("peer response could not be decoded: {0}")]
    Decode(String),
}

impl PeerError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Whether a read may be served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Cached,
    /// Skip the cache; used on write paths.
    Fresh,
}

#[async_trait]
pub trait CourseDirectory: Send + Sync {
    async fn course(&self, id: i64, freshness: Freshness) -> Result<Course, PeerError>;

    async fn update_course(&self, id: i64, patch: CoursePatch) -> Result<Course, PeerError>;

    /// Conditional occupancy change; `PeerError::CourseFull` when the guard rejects it.
    async fn adjust_occupancy(
        &self,
        id: i64,
        change: OccupancyChange,
    ) -> Result<Course, PeerError>;
}

#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn student(&self, id: i64, freshness: Freshness) -> Result<Student, PeerError>;
}
