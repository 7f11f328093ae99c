use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::context::{JobWorkerContext, job_aborted, job_failed};

const REQUEST_ID_LEN: usize = 32;

/// Queue payload for one accepted enrollment submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Idempotency key shared by every delivery of this submission.
    pub request_id: String,
    pub student_id: i64,
    pub course_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

impl WorkItem {
    pub fn new(student_id: i64, course_id: i64, submitted_at: OffsetDateTime) -> Self {
        let request_id = request_id(student_id, course_id, submitted_at, Uuid::new_v4());
        Self {
            request_id,
            student_id,
            course_id,
            submitted_at,
        }
    }
}

/// Hex sha256 over the pair, the submission instant and a per-submission nonce.
fn request_id(
    student_id: i64,
    course_id: i64,
    submitted_at: OffsetDateTime,
    nonce: Uuid,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(student_id.to_be_bytes());
    hasher.update(course_id.to_be_bytes());
    hasher.update(submitted_at.unix_timestamp_nanos().to_be_bytes());
    hasher.update(nonce.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(REQUEST_ID_LEN);
    digest
}

#[derive(Debug, Error)]
#[error("work item carries no request id")]
pub struct MissingRequestId;

pub async fn process_enrollment_job(
    item: WorkItem,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    if item.request_id.trim().is_empty() {
        return Err(job_aborted(MissingRequestId));
    }

    let outcome = context.worker.process(&item).await.map_err(job_failed)?;

    info!(
        target = "application::jobs::process_enrollment_job",
        request_id = %item.request_id,
        student_id = item.student_id,
        course_id = item.course_id,
        outcome = outcome.label(),
        "enrollment work item settled"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn request_ids_are_stable_for_identical_inputs() {
        let at = datetime!(2026-01-05 10:00:00 UTC);
        let nonce = Uuid::nil();
        let first = request_id(1, 2, at, nonce);
        assert_eq!(first, request_id(1, 2, at, nonce));
        assert_eq!(first.len(), REQUEST_ID_LEN);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn request_ids_differ_per_submission() {
        let at = datetime!(2026-01-05 10:00:00 UTC);
        let a = WorkItem::new(1, 2, at);
        let b = WorkItem::new(1, 2, at);
        assert_ne!(a.request_id, b.request_id);
        assert_ne!(
            request_id(1, 2, at, Uuid::nil()),
            request_id(2, 1, at, Uuid::nil())
        );
    }

    #[test]
    fn payload_round_trips_through_queue_json() {
        let item = WorkItem::new(3, 4, datetime!(2026-02-01 08:30:00 UTC));
        let json = serde_json::to_value(&item).expect("encode");
        assert_eq!(json["student_id"], 3);
        assert_eq!(json["submitted_at"], "2026-02-01T08:30:00Z");
        let decoded: WorkItem = serde_json::from_value(json).expect("decode");
        assert_eq!(decoded, item);
    }
}
