use std::sync::Arc;

use metrics::counter;
use tracing::{error, info, warn};

use crate::application::peers::{CourseDirectory, Freshness, PeerError};
use crate::application::repos::EnrollmentsRepo;
use crate::domain::entities::{CoursePatch, Enrollment, OccupancyChange};
use crate::domain::types::OccupancyMode;

use super::EnrollmentError;

const SOURCE: &str = "application::enrollment::drop";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropOutcome {
    pub enrollment: Enrollment,
    /// `false` when no seat was handed back: the enrollment never claimed one,
    /// or the course-side decrement failed after the row was removed.
    pub occupancy_released: bool,
}

/// Removes an enrollment and hands its seat back to the course.
#[derive(Clone)]
pub struct DropPipeline {
    enrollments: Arc<dyn EnrollmentsRepo>,
    courses: Arc<dyn CourseDirectory>,
    mode: OccupancyMode,
}

impl DropPipeline {
    pub fn new(
        enrollments: Arc<dyn EnrollmentsRepo>,
        courses: Arc<dyn CourseDirectory>,
        mode: OccupancyMode,
    ) -> Self {
        Self {
            enrollments,
            courses,
            mode,
        }
    }

    pub async fn drop_enrollment(
        &self,
        enrollment_id: i64,
    ) -> Result<DropOutcome, EnrollmentError> {
        let removed = self
            .enrollments
            .delete_enrollment(enrollment_id)
            .await?
            .ok_or(EnrollmentError::NotFound {
                entity: "enrollment",
            })?;
        let enrollment = removed.enrollment;

        counter!("registrar_drop_total").increment(1);
        let occupancy_released = if !removed.occupancy_applied {
            warn!(
                target = SOURCE,
                enrollment_id,
                course_id = enrollment.course_id,
                "enrollment never claimed a seat, course occupancy left as is"
            );
            false
        } else {
            match self.release_seat(enrollment.course_id).await {
                Ok(()) => true,
                Err(err) => {
                    counter!("registrar_drop_occupancy_failed_total").increment(1);
                    error!(
                        target = SOURCE,
                        enrollment_id,
                        course_id = enrollment.course_id,
                        error = %err,
                        "enrollment removed but course occupancy was not decremented"
                    );
                    false
                }
            }
        };

        info!(
            target = SOURCE,
            enrollment_id,
            student_id = enrollment.student_id,
            course_id = enrollment.course_id,
            occupancy_released,
            "enrollment dropped"
        );
        Ok(DropOutcome {
            enrollment,
            occupancy_released,
        })
    }

    async fn release_seat(&self, course_id: i64) -> Result<(), EnrollmentError> {
        match self.mode {
            OccupancyMode::FetchThenWrite => {
                let course = self
                    .courses
                    .course(course_id, Freshness::Fresh)
                    .await
                    .map_err(peer_failure)?;
                let enrolled = course.enrolled.checked_sub(1).ok_or_else(|| {
                    EnrollmentError::ApplyFailure(format!(
                        "course {course_id} occupancy cannot be decremented below {}",
                        course.enrolled
                    ))
                })?;
                self.courses
                    .update_course(course_id, CoursePatch::enrolled(enrolled))
                    .await
                    .map_err(peer_failure)?;
            }
            OccupancyMode::Conditional => {
                self.courses
                    .adjust_occupancy(course_id, OccupancyChange::release_seat())
                    .await
                    .map_err(peer_failure)?;
            }
        }
        Ok(())
    }
}

fn peer_failure(err: PeerError) -> EnrollmentError {
    EnrollmentError::DependencyUnavailable(err.to_string())
}
