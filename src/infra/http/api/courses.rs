use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::courses::CourseError;
use crate::domain::entities::{CoursePatch, NewCourse, OccupancyChange};
use crate::infra::http::{repo_error_to_api, requested_freshness};

use super::error::{ApiError, codes};
use super::models::HealthResponse;
use super::state::CoursesState;

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::healthy("courses"))
}

pub async fn list_courses(
    State(state): State<CoursesState>,
) -> Result<impl IntoResponse, ApiError> {
    let courses = state.courses.list().await.map_err(course_to_api)?;
    Ok(Json(courses))
}

pub async fn get_course(
    State(state): State<CoursesState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let course = state
        .courses
        .get(id, requested_freshness(&headers))
        .await
        .map_err(course_to_api)?;
    Ok(Json(course))
}

pub async fn create_course(
    State(state): State<CoursesState>,
    Json(draft): Json<NewCourse>,
) -> Result<impl IntoResponse, ApiError> {
    let course = state.courses.create(draft).await.map_err(course_to_api)?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn update_course(
    State(state): State<CoursesState>,
    Path(id): Path<i64>,
    Json(patch): Json<CoursePatch>,
) -> Result<impl IntoResponse, ApiError> {
    let course = state
        .courses
        .update(id, patch)
        .await
        .map_err(course_to_api)?;
    Ok(Json(course))
}

pub async fn adjust_occupancy(
    State(state): State<CoursesState>,
    Path(id): Path<i64>,
    Json(change): Json<OccupancyChange>,
) -> Result<impl IntoResponse, ApiError> {
    let course = state
        .courses
        .adjust_occupancy(id, change)
        .await
        .map_err(course_to_api)?;
    Ok(Json(course))
}

pub async fn delete_course(
    State(state): State<CoursesState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.courses.delete(id).await.map_err(course_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

fn course_to_api(err: CourseError) -> ApiError {
    match err {
        CourseError::NotFound => ApiError::not_found("Course not found"),
        CourseError::Invalid(err) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid course",
            Some(err.to_string()),
        ),
        CourseError::Full(course) => ApiError::new(
            StatusCode::CONFLICT,
            codes::COURSE_FULL,
            "Course is full",
            Some(format!(
                "enrolled {} of capacity {}",
                course.enrolled, course.capacity
            )),
        ),
        CourseError::Repo(repo) => repo_error_to_api(repo),
    }
}
