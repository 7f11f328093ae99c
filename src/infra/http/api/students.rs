use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::students::StudentError;
use crate::domain::entities::StudentDraft;
use crate::infra::http::{repo_error_to_api, requested_freshness};

use super::error::{ApiError, codes};
use super::models::HealthResponse;
use super::state::StudentsState;

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::healthy("students"))
}

pub async fn list_students(
    State(state): State<StudentsState>,
) -> Result<impl IntoResponse, ApiError> {
    let students = state.students.list().await.map_err(student_to_api)?;
    Ok(Json(students))
}

pub async fn get_student(
    State(state): State<StudentsState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let student = state
        .students
        .get(id, requested_freshness(&headers))
        .await
        .map_err(student_to_api)?;
    Ok(Json(student))
}

pub async fn create_student(
    State(state): State<StudentsState>,
    Json(draft): Json<StudentDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let student = state
        .students
        .create(draft)
        .await
        .map_err(student_to_api)?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn replace_student(
    State(state): State<StudentsState>,
    Path(id): Path<i64>,
    Json(draft): Json<StudentDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let student = state
        .students
        .replace(id, draft)
        .await
        .map_err(student_to_api)?;
    Ok(Json(student))
}

pub async fn delete_student(
    State(state): State<StudentsState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.students.delete(id).await.map_err(student_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

fn student_to_api(err: StudentError) -> ApiError {
    match err {
        StudentError::NotFound => ApiError::not_found("Student not found"),
        StudentError::Invalid(err) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid student",
            Some(err.to_string()),
        ),
        StudentError::Repo(repo) => repo_error_to_api(repo),
    }
}
