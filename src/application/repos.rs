//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::jobs::WorkItem;
use crate::domain::entities::{
    Course, CoursePatch, DeadLetterRecord, Enrollment, EnrollmentRequestRecord, NewCourse,
    OccupancyChange, PersistedEnrollment, RemovedEnrollment, Student, StudentDraft,
};
use crate::domain::types::RequestStatus;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Outcome of a conditional occupancy update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccupancyOutcome {
    Applied(Course),
    /// The capacity guard rejected the change; the stored course is returned unchanged.
    Full(Course),
    Missing,
}

#[async_trait]
pub trait CoursesRepo: Send + Sync {
    async fn list_courses(&self) -> Result<Vec<Course>, RepoError>;

    async fn find_course(&self, id: i64) -> Result<Option<Course>, RepoError>;

    async fn create_course(&self, draft: NewCourse) -> Result<Course, RepoError>;

    /// Returns `None` when no course has this id.
    async fn update_course(&self, id: i64, patch: CoursePatch)
    -> Result<Option<Course>, RepoError>;

    async fn adjust_occupancy(
        &self,
        id: i64,
        change: OccupancyChange,
    ) -> Result<OccupancyOutcome, RepoError>;

    /// Returns `false` when no course has this id.
    async fn delete_course(&self, id: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait StudentsRepo: Send + Sync {
    async fn list_students(&self) -> Result<Vec<Student>, RepoError>;

    async fn find_student(&self, id: i64) -> Result<Option<Student>, RepoError>;

    async fn create_student(&self, draft: StudentDraft) -> Result<Student, RepoError>;

    async fn replace_student(
        &self,
        id: i64,
        draft: StudentDraft,
    ) -> Result<Option<Student>, RepoError>;

    async fn delete_student(&self, id: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait EnrollmentsRepo: Send + Sync {
    async fn list_enrollments(&self) -> Result<Vec<Enrollment>, RepoError>;

    async fn list_for_student(&self, student_id: i64) -> Result<Vec<Enrollment>, RepoError>;

    /// Insert keyed on `request_id`; an existing row for the same request is returned as-is.
    async fn persist_enrollment(
        &self,
        request_id: &str,
        student_id: i64,
        course_id: i64,
    ) -> Result<PersistedEnrollment, RepoError>;

    async fn mark_occupancy_applied(&self, enrollment_id: i64) -> Result<(), RepoError>;

    /// Delete and return the removed row, `None` when absent.
    async fn delete_enrollment(&self, id: i64) -> Result<Option<RemovedEnrollment>, RepoError>;

    /// Delete the row persisted for `request_id` if its seat was never claimed.
    async fn discard_unapplied(&self, request_id: &str) -> Result<Option<Enrollment>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewEnrollmentRequest {
    pub request_id: String,
    pub student_id: i64,
    pub course_id: i64,
    pub submitted_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct UpdateRequestStatusParams {
    pub request_id: String,
    pub status: RequestStatus,
    pub detail: Option<String>,
    pub enrollment_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewDeadLetter {
    pub request_id: String,
    pub student_id: i64,
    pub course_id: i64,
    pub attempts: i32,
    pub last_error: String,
}

/// Ledger of accepted submissions and parked work items.
#[async_trait]
pub trait RequestsRepo: Send + Sync {
    async fn record_request(&self, request: NewEnrollmentRequest) -> Result<(), RepoError>;

    async fn update_request_status(&self, params: UpdateRequestStatusParams)
    -> Result<(), RepoError>;

    async fn find_request(
        &self,
        request_id: &str,
    ) -> Result<Option<EnrollmentRequestRecord>, RepoError>;

    async fn record_dead_letter(&self, letter: NewDeadLetter)
    -> Result<DeadLetterRecord, RepoError>;

    async fn list_dead_letters(&self) -> Result<Vec<DeadLetterRecord>, RepoError>;
}

/// Durable producer side of the enrollment queue.
#[async_trait]
pub trait EnrollmentQueue: Send + Sync {
    /// Returns the queue-assigned job id once the item is durably stored.
    async fn enqueue(&self, item: &WorkItem) -> Result<String, RepoError>;
}
