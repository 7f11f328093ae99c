pub mod courses;
pub mod enrollment;
pub mod error;
pub mod models;
pub mod state;
pub mod students;

pub use state::{CoursesState, EnrollmentState, StudentsState};

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

fn with_http_layers(router: Router) -> Router {
    router
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

pub fn build_courses_router(state: CoursesState) -> Router {
    let router = Router::new()
        .route("/health", get(courses::health))
        .route(
            "/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route(
            "/courses/{id}",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route(
            "/courses/{id}/occupancy",
            post(courses::adjust_occupancy),
        )
        .with_state(state);
    with_http_layers(router)
}

pub fn build_students_router(state: StudentsState) -> Router {
    let router = Router::new()
        .route("/health", get(students::health))
        .route(
            "/students",
            get(students::list_students).post(students::create_student),
        )
        .route(
            "/students/{id}",
            get(students::get_student)
                .put(students::replace_student)
                .delete(students::delete_student),
        )
        .with_state(state);
    with_http_layers(router)
}

pub fn build_enrollment_router(state: EnrollmentState) -> Router {
    let router = Router::new()
        .route("/health", get(enrollment::health))
        .route("/enroll", post(enrollment::enroll))
        .route("/enrollments", get(enrollment::list_enrollments))
        .route(
            "/enrollments/student/{id}",
            get(enrollment::list_for_student),
        )
        .route(
            "/enrollments/requests/{request_id}",
            get(enrollment::get_request),
        )
        .route(
            "/enrollments/dead-letters",
            get(enrollment::list_dead_letters),
        )
        .route("/enrollments/{id}", delete(enrollment::drop_enrollment))
        .with_state(state);
    with_http_layers(router)
}
