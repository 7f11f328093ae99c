use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::enrollment::EnrollmentError;
use crate::domain::admission::Rejection;
use crate::infra::http::repo_error_to_api;

use super::error::{ApiError, codes};
use super::models::{EnrollRequest, HealthResponse};
use super::state::EnrollmentState;

pub async fn health(State(state): State<EnrollmentState>) -> impl IntoResponse {
    let mut body = HealthResponse::healthy("enrollment");
    body.worker = Some(state.worker.state().as_str());
    Json(body)
}

pub async fn enroll(
    State(state): State<EnrollmentState>,
    Json(request): Json<EnrollRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accepted = state
        .intake
        .submit(request.student_id, request.course_id)
        .await
        .map_err(enrollment_to_api)?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

pub async fn list_enrollments(
    State(state): State<EnrollmentState>,
) -> Result<impl IntoResponse, ApiError> {
    let enrollments = state
        .enrollments
        .list_enrollments()
        .await
        .map_err(repo_error_to_api)?;
    Ok(Json(enrollments))
}

pub async fn list_for_student(
    State(state): State<EnrollmentState>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let enrollments = state
        .enrollments
        .list_for_student(student_id)
        .await
        .map_err(repo_error_to_api)?;
    Ok(Json(enrollments))
}

pub async fn drop_enrollment(
    State(state): State<EnrollmentState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.drops.drop_enrollment(id).await.map_err(enrollment_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_request(
    State(state): State<EnrollmentState>,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .requests
        .find_request(&request_id)
        .await
        .map_err(repo_error_to_api)?
        .ok_or_else(|| ApiError::not_found("Enrollment request not found"))?;
    Ok(Json(record))
}

pub async fn list_dead_letters(
    State(state): State<EnrollmentState>,
) -> Result<impl IntoResponse, ApiError> {
    let letters = state
        .requests
        .list_dead_letters()
        .await
        .map_err(repo_error_to_api)?;
    Ok(Json(letters))
}

fn enrollment_to_api(err: EnrollmentError) -> ApiError {
    match err {
        EnrollmentError::NotFound { entity } => ApiError::not_found(match entity {
            "student" => "Student not found",
            "course" => "Course not found",
            _ => "Enrollment not found",
        }),
        EnrollmentError::ValidationFailed(rejection) => {
            let code = match rejection {
                Rejection::PrerequisitesNotMet { .. } => codes::PREREQUISITES_NOT_MET,
                Rejection::CourseFull { .. } => codes::COURSE_FULL,
            };
            ApiError::new(
                StatusCode::BAD_REQUEST,
                code,
                rejection.reason(),
                Some(rejection.detail()),
            )
        }
        EnrollmentError::DependencyUnavailable(detail) => {
            ApiError::unavailable("Dependency unavailable", detail)
        }
        EnrollmentError::ApplyFailure(detail) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::APPLY_FAILURE,
            "Enrollment could not be applied",
            Some(detail),
        ),
        EnrollmentError::Repo(repo) => repo_error_to_api(repo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_failures_name_the_missing_entity() {
        let err = enrollment_to_api(EnrollmentError::NotFound { entity: "course" });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rejections_are_bad_requests() {
        let err = enrollment_to_api(EnrollmentError::ValidationFailed(Rejection::CourseFull {
            capacity: 1,
            enrolled: 1,
        }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = enrollment_to_api(EnrollmentError::DependencyUnavailable("down".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
