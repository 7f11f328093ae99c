//! Admission rules shared by intake and the conditional apply path.

use std::collections::HashSet;

use crate::domain::entities::{Course, Student};

pub const PREREQUISITES_NOT_MET: &str = "Prerequisites not met";
pub const COURSE_FULL: &str = "Course is full";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    PrerequisitesNotMet { missing: Vec<String> },
    CourseFull { capacity: i32, enrolled: i32 },
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::PrerequisitesNotMet { .. } => PREREQUISITES_NOT_MET,
            Rejection::CourseFull { .. } => COURSE_FULL,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Rejection::PrerequisitesNotMet { missing } => {
                format!("missing prerequisites: {}", missing.join(", "))
            }
            Rejection::CourseFull { capacity, enrolled } => {
                format!("enrolled {enrolled} of capacity {capacity}")
            }
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::PrerequisitesNotMet { .. } => "prerequisites",
            Rejection::CourseFull { .. } => "capacity",
        }
    }
}

/// Prerequisite codes the student has not completed, in course order.
pub fn missing_prerequisites(course: &Course, student: &Student) -> Vec<String> {
    let completed: HashSet<&str> = student
        .completed_courses
        .iter()
        .map(String::as_str)
        .collect();
    course
        .prerequisites
        .iter()
        .filter(|code| !completed.contains(code.as_str()))
        .cloned()
        .collect()
}

pub fn has_open_seat(course: &Course) -> bool {
    course.enrolled < course.capacity
}

/// Prerequisites first, then capacity.
pub fn check(course: &Course, student: &Student) -> Result<(), Rejection> {
    let missing = missing_prerequisites(course, student);
    if !missing.is_empty() {
        return Err(Rejection::PrerequisitesNotMet { missing });
    }
    if !has_open_seat(course) {
        return Err(Rejection::CourseFull {
            capacity: course.capacity,
            enrolled: course.enrolled,
        });
    }
    Ok(())
}
