//! Application services: the course and student stores and the enrollment saga.

pub mod courses;
pub mod enrollment;
pub mod error;
pub mod jobs;
pub mod peers;
pub mod repos;
pub mod retry;
pub mod students;
