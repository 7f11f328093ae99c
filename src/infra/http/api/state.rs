use std::sync::Arc;

use crate::application::courses::CourseService;
use crate::application::enrollment::{DropPipeline, EnrollmentIntake};
use crate::application::repos::{EnrollmentsRepo, RequestsRepo};
use crate::application::students::StudentService;
use crate::infra::worker::WorkerHealth;

#[derive(Clone)]
pub struct CoursesState {
    pub courses: Arc<CourseService>,
}

#[derive(Clone)]
pub struct StudentsState {
    pub students: Arc<StudentService>,
}

#[derive(Clone)]
pub struct EnrollmentState {
    pub intake: Arc<EnrollmentIntake>,
    pub drops: Arc<DropPipeline>,
    pub enrollments: Arc<dyn EnrollmentsRepo>,
    pub requests: Arc<dyn RequestsRepo>,
    pub worker: WorkerHealth,
}
