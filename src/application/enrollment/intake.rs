use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::jobs::WorkItem;
use crate::application::peers::{CourseDirectory, Freshness, StudentDirectory};
use crate::application::repos::{
    EnrollmentQueue, NewEnrollmentRequest, RequestsRepo, UpdateRequestStatusParams,
};
use crate::domain::admission;
use crate::domain::types::RequestStatus;

use super::EnrollmentError;

const SOURCE: &str = "application::enrollment::intake";
pub const PENDING_MESSAGE: &str = "Enrollment queued for processing";

/// Acknowledgment returned once a work item is durably queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub status: &'static str,
    pub message: &'static str,
    pub request_id: String,
}

/// Admission control in front of the enrollment queue.
#[derive(Clone)]
pub struct EnrollmentIntake {
    students: Arc<dyn StudentDirectory>,
    courses: Arc<dyn CourseDirectory>,
    requests: Arc<dyn RequestsRepo>,
    queue: Arc<dyn EnrollmentQueue>,
}

impl EnrollmentIntake {
    pub fn new(
        students: Arc<dyn StudentDirectory>,
        courses: Arc<dyn CourseDirectory>,
        requests: Arc<dyn RequestsRepo>,
        queue: Arc<dyn EnrollmentQueue>,
    ) -> Self {
        Self {
            students,
            courses,
            requests,
            queue,
        }
    }

    /// Validate against cached snapshots and enqueue; nothing is queued on any failure.
    pub async fn submit(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> Result<Accepted, EnrollmentError> {
        let student = self
            .students
            .student(student_id, Freshness::Cached)
            .await
            .map_err(|err| EnrollmentError::from_lookup("student", err))?;
        let course = self
            .courses
            .course(course_id, Freshness::Cached)
            .await
            .map_err(|err| EnrollmentError::from_lookup("course", err))?;

        if let Err(rejection) = admission::check(&course, &student) {
            counter!("registrar_enroll_rejected_total", "reason" => rejection.label()).increment(1);
            return Err(EnrollmentError::ValidationFailed(rejection));
        }

        let item = WorkItem::new(student_id, course_id, OffsetDateTime::now_utc());
        self.requests
            .record_request(NewEnrollmentRequest {
                request_id: item.request_id.clone(),
                student_id,
                course_id,
                submitted_at: item.submitted_at,
            })
            .await?;

        let job_id = match self.queue.enqueue(&item).await {
            Ok(job_id) => job_id,
            Err(err) => {
                self.mark_enqueue_failed(&item, &err.to_string()).await;
                return Err(EnrollmentError::DependencyUnavailable(format!(
                    "enrollment queue rejected the work item: {err}"
                )));
            }
        };

        counter!("registrar_enroll_accepted_total").increment(1);
        info!(
            target = SOURCE,
            request_id = %item.request_id,
            job_id = %job_id,
            student_id,
            course_id,
            "enrollment queued"
        );

        Ok(Accepted {
            status: RequestStatus::Pending.as_str(),
            message: PENDING_MESSAGE,
            request_id: item.request_id,
        })
    }

    async fn mark_enqueue_failed(&self, item: &WorkItem, detail: &str) {
        let params = UpdateRequestStatusParams {
            request_id: item.request_id.clone(),
            status: RequestStatus::Failed,
            detail: Some(format!("enqueue failed: {detail}")),
            enrollment_id: None,
        };
        if let Err(err) = self.requests.update_request_status(params).await {
            warn!(
                target = SOURCE,
                request_id = %item.request_id,
                error = %err,
                "could not record enqueue failure"
            );
        }
    }
}
