pub mod api;
mod middleware;

pub use api::{
    CoursesState, EnrollmentState, StudentsState, build_courses_router, build_enrollment_router,
    build_students_router,
};

use axum::http::{HeaderMap, StatusCode, header};

use crate::application::peers::Freshness;
use crate::application::repos::RepoError;

use api::error::{ApiError, codes};

/// `Cache-Control: no-cache` asks for a read that skips the cache.
pub fn requested_freshness(headers: &HeaderMap) -> Freshness {
    let bypass = headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"));
    if bypass {
        Freshness::Fresh
    } else {
        Freshness::Cached
    }
}

/// Map a repository error to a consistent API error response.
pub fn repo_error_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(message),
        ),
    }
}
