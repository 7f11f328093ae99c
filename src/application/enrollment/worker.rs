use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, warn};

use crate::application::jobs::WorkItem;
use crate::application::peers::{CourseDirectory, Freshness, PeerError, StudentDirectory};
use crate::application::repos::{
    EnrollmentsRepo, NewDeadLetter, RequestsRepo, UpdateRequestStatusParams,
};
use crate::application::retry::RetryPolicy;
use crate::domain::admission::{self, Rejection};
use crate::domain::entities::{CoursePatch, Enrollment, OccupancyChange};
use crate::domain::types::{OccupancyMode, RequestStatus};

use super::EnrollmentError;

const SOURCE: &str = "application::enrollment::worker";

/// Terminal result of one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    Applied { enrollment_id: i64 },
    /// Redelivery of an item that had already settled.
    Duplicate { status: RequestStatus },
    Rejected { reason: String },
    DeadLettered { attempts: u32 },
}

impl WorkOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            WorkOutcome::Applied { .. } => "applied",
            WorkOutcome::Duplicate { .. } => "duplicate",
            WorkOutcome::Rejected { .. } => "rejected",
            WorkOutcome::DeadLettered { .. } => "dead_lettered",
        }
    }
}

/// Applies queued enrollments: persist, adjust occupancy, settle the ledger.
pub struct EnrollmentWorker {
    enrollments: Arc<dyn EnrollmentsRepo>,
    requests: Arc<dyn RequestsRepo>,
    courses: Arc<dyn CourseDirectory>,
    students: Arc<dyn StudentDirectory>,
    mode: OccupancyMode,
    retry: RetryPolicy,
}

impl EnrollmentWorker {
    pub fn new(
        enrollments: Arc<dyn EnrollmentsRepo>,
        requests: Arc<dyn RequestsRepo>,
        courses: Arc<dyn CourseDirectory>,
        students: Arc<dyn StudentDirectory>,
        mode: OccupancyMode,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            enrollments,
            requests,
            courses,
            students,
            mode,
            retry,
        }
    }

    pub fn mode(&self) -> OccupancyMode {
        self.mode
    }

    /// Apply `item` with bounded retries. Exhausted items are dead-lettered.
    ///
    /// An error means the item could not even be parked and must stay visible
    /// in the queue as failed.
    pub async fn process(&self, item: &WorkItem) -> Result<WorkOutcome, EnrollmentError> {
        let started = Instant::now();
        let mut attempt = 0;
        let outcome = loop {
            match self.apply_once(item).await {
                Ok(outcome) => break outcome,
                Err(err) if self.retry.has_attempts_after(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    counter!("registrar_worker_retry_total").increment(1);
                    warn!(
                        target = SOURCE,
                        request_id = %item.request_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "enrollment apply failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => break self.dead_letter(item, attempt + 1, &err).await?,
            }
        };

        histogram!("registrar_worker_apply_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        match &outcome {
            WorkOutcome::Applied { .. } => counter!("registrar_worker_applied_total").increment(1),
            WorkOutcome::Duplicate { .. } => {
                counter!("registrar_worker_duplicate_total").increment(1)
            }
            WorkOutcome::Rejected { .. } => {
                counter!("registrar_worker_rejected_total").increment(1)
            }
            WorkOutcome::DeadLettered { .. } => {}
        }
        Ok(outcome)
    }

    async fn apply_once(&self, item: &WorkItem) -> Result<WorkOutcome, EnrollmentError> {
        if let Some(request) = self.requests.find_request(&item.request_id).await?
            && request.status.is_terminal()
        {
            debug!(
                target = SOURCE,
                request_id = %item.request_id,
                status = %request.status,
                "work item already settled"
            );
            return Ok(WorkOutcome::Duplicate {
                status: request.status,
            });
        }

        let persisted = self
            .enrollments
            .persist_enrollment(&item.request_id, item.student_id, item.course_id)
            .await
            .map_err(|err| EnrollmentError::ApplyFailure(err.to_string()))?;
        let enrollment = persisted.enrollment;

        if !persisted.occupancy_applied {
            if let Some(rejection) = self.apply_occupancy(item).await? {
                return self.compensate(item, &enrollment, rejection).await;
            }
            self.enrollments
                .mark_occupancy_applied(enrollment.id)
                .await
                .map_err(|err| EnrollmentError::ApplyFailure(err.to_string()))?;
        }

        self.settle(
            item,
            RequestStatus::Applied,
            None,
            Some(enrollment.id),
        )
        .await?;
        Ok(WorkOutcome::Applied {
            enrollment_id: enrollment.id,
        })
    }

    /// `Ok(Some(_))` is a permanent refusal; `Err` is retryable.
    async fn apply_occupancy(&self, item: &WorkItem) -> Result<Option<String>, EnrollmentError> {
        match self.mode {
            OccupancyMode::FetchThenWrite => {
                let course = match self.courses.course(item.course_id, Freshness::Fresh).await {
                    Ok(course) => course,
                    Err(PeerError::NotFound { .. }) => return Ok(Some(course_missing())),
                    Err(err) => return Err(unavailable(err)),
                };
                let enrolled = course.enrolled.checked_add(1).ok_or_else(|| {
                    EnrollmentError::ApplyFailure(format!(
                        "course {} occupancy cannot be incremented past {}",
                        item.course_id, course.enrolled
                    ))
                })?;
                match self
                    .courses
                    .update_course(item.course_id, CoursePatch::enrolled(enrolled))
                    .await
                {
                    Ok(_) => Ok(None),
                    Err(PeerError::NotFound { .. }) => Ok(Some(course_missing())),
                    Err(err) => Err(unavailable(err)),
                }
            }
            OccupancyMode::Conditional => {
                let student = match self.students.student(item.student_id, Freshness::Fresh).await {
                    Ok(student) => student,
                    Err(PeerError::NotFound { .. }) => {
                        return Ok(Some("Student not found".to_string()));
                    }
                    Err(err) => return Err(unavailable(err)),
                };
                let course = match self.courses.course(item.course_id, Freshness::Fresh).await {
                    Ok(course) => course,
                    Err(PeerError::NotFound { .. }) => return Ok(Some(course_missing())),
                    Err(err) => return Err(unavailable(err)),
                };
                let missing = admission::missing_prerequisites(&course, &student);
                if !missing.is_empty() {
                    let rejection = Rejection::PrerequisitesNotMet { missing };
                    return Ok(Some(rejection.reason().to_string()));
                }
                match self
                    .courses
                    .adjust_occupancy(item.course_id, OccupancyChange::claim_seat())
                    .await
                {
                    Ok(_) => Ok(None),
                    Err(PeerError::CourseFull) => Ok(Some(admission::COURSE_FULL.to_string())),
                    Err(PeerError::NotFound { .. }) => Ok(Some(course_missing())),
                    Err(err) => Err(unavailable(err)),
                }
            }
        }
    }

    async fn compensate(
        &self,
        item: &WorkItem,
        enrollment: &Enrollment,
        reason: String,
    ) -> Result<WorkOutcome, EnrollmentError> {
        self.enrollments
            .delete_enrollment(enrollment.id)
            .await
            .map_err(|err| EnrollmentError::ApplyFailure(err.to_string()))?;
        warn!(
            target = SOURCE,
            request_id = %item.request_id,
            enrollment_id = enrollment.id,
            reason = %reason,
            "enrollment rejected at apply time and compensated"
        );
        self.settle(item, RequestStatus::Rejected, Some(reason.clone()), None)
            .await?;
        Ok(WorkOutcome::Rejected { reason })
    }

    async fn dead_letter(
        &self,
        item: &WorkItem,
        attempts: u32,
        err: &EnrollmentError,
    ) -> Result<WorkOutcome, EnrollmentError> {
        let last_error = err.to_string();
        match self.enrollments.discard_unapplied(&item.request_id).await {
            Ok(Some(discarded)) => warn!(
                target = SOURCE,
                request_id = %item.request_id,
                enrollment_id = discarded.id,
                "unapplied enrollment removed before dead-lettering"
            ),
            Ok(None) => {}
            Err(discard_err) => error!(
                target = SOURCE,
                request_id = %item.request_id,
                error = %discard_err,
                "unapplied enrollment could not be removed before dead-lettering"
            ),
        }
        self.requests
            .record_dead_letter(NewDeadLetter {
                request_id: item.request_id.clone(),
                student_id: item.student_id,
                course_id: item.course_id,
                attempts: i32::try_from(attempts).unwrap_or(i32::MAX),
                last_error: last_error.clone(),
            })
            .await?;
        self.settle(item, RequestStatus::DeadLettered, Some(last_error.clone()), None)
            .await?;

        counter!("registrar_worker_dead_lettered_total").increment(1);
        error!(
            target = SOURCE,
            request_id = %item.request_id,
            student_id = item.student_id,
            course_id = item.course_id,
            attempts,
            error = %last_error,
            "enrollment work item dead-lettered"
        );
        Ok(WorkOutcome::DeadLettered { attempts })
    }

    async fn settle(
        &self,
        item: &WorkItem,
        status: RequestStatus,
        detail: Option<String>,
        enrollment_id: Option<i64>,
    ) -> Result<(), EnrollmentError> {
        self.requests
            .update_request_status(UpdateRequestStatusParams {
                request_id: item.request_id.clone(),
                status,
                detail,
                enrollment_id,
            })
            .await
            .map_err(EnrollmentError::from)
    }
}

fn course_missing() -> String {
    "Course not found".to_string()
}

fn unavailable(err: PeerError) -> EnrollmentError {
    EnrollmentError::DependencyUnavailable(err.to_string())
}
