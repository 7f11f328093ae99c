//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{error::DomainError, types::RequestStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub capacity: i32,
    pub enrolled: i32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCourse {
    pub name: String,
    pub code: String,
    pub capacity: i32,
    #[serde(default)]
    pub enrolled: i32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl NewCourse {
    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("name", &self.name)?;
        require_text("code", &self.code)?;
        if self.capacity < 0 {
            return Err(DomainError::negative("capacity", self.capacity));
        }
        if self.enrolled < 0 {
            return Err(DomainError::negative("enrolled", self.enrolled));
        }
        require_codes("prerequisites", &self.prerequisites)
    }
}

/// Partial course update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoursePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrolled: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisites: Option<Vec<String>>,
}

impl CoursePatch {
    pub fn enrolled(value: i32) -> Self {
        Self {
            enrolled: Some(value),
            ..Self::default()
        }
    }

    /// `enrolled` is deliberately unbounded below so compensations can drive it negative.
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = self.name.as_deref() {
            require_text("name", name)?;
        }
        if let Some(code) = self.code.as_deref() {
            require_text("code", code)?;
        }
        if let Some(capacity) = self.capacity
            && capacity < 0
        {
            return Err(DomainError::negative("capacity", capacity));
        }
        if let Some(prerequisites) = self.prerequisites.as_deref() {
            require_codes("prerequisites", prerequisites)?;
        }
        Ok(())
    }

    pub fn apply(self, course: &mut Course) {
        if let Some(name) = self.name {
            course.name = name;
        }
        if let Some(code) = self.code {
            course.code = code;
        }
        if let Some(capacity) = self.capacity {
            course.capacity = capacity;
        }
        if let Some(enrolled) = self.enrolled {
            course.enrolled = enrolled;
        }
        if let Some(prerequisites) = self.prerequisites {
            course.prerequisites = prerequisites;
        }
    }
}

/// Atomic occupancy adjustment executed by the course store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyChange {
    pub delta: i32,
    #[serde(default)]
    pub enforce_capacity: bool,
}

impl OccupancyChange {
    pub fn claim_seat() -> Self {
        Self {
            delta: 1,
            enforce_capacity: true,
        }
    }

    pub fn release_seat() -> Self {
        Self {
            delta: -1,
            enforce_capacity: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub completed_courses: Vec<String>,
}

/// Body for both student creation and full replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDraft {
    pub name: String,
    #[serde(default)]
    pub completed_courses: Vec<String>,
}

impl StudentDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("name", &self.name)?;
        require_codes("completed_courses", &self.completed_courses)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
}

/// Result of the idempotent insert keyed on a submission's request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedEnrollment {
    pub enrollment: Enrollment,
    /// `false` when the row already existed for this request id.
    pub created: bool,
    pub occupancy_applied: bool,
}

/// Row taken out of the enrollments table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEnrollment {
    pub enrollment: Enrollment,
    /// Whether the course had counted this enrollment's seat.
    pub occupancy_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentRequestRecord {
    pub request_id: String,
    pub student_id: i64,
    pub course_id: i64,
    pub status: RequestStatus,
    pub detail: Option<String>,
    pub enrollment_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLetterRecord {
    pub id: i64,
    pub request_id: String,
    pub student_id: i64,
    pub course_id: i64,
    pub attempts: i32,
    pub last_error: String,
    #[serde(with = "time::serde::rfc3339")]
    pub failed_at: OffsetDateTime,
}

fn require_text(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::blank(field));
    }
    Ok(())
}

fn require_codes(field: &'static str, codes: &[String]) -> Result<(), DomainError> {
    if codes.iter().any(|code| code.trim().is_empty()) {
        return Err(DomainError::BlankCode { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course() -> Course {
        Course {
            id: 7,
            name: "Web Systems".to_string(),
            code: "CS326".to_string(),
            capacity: 100,
            enrolled: 3,
            prerequisites: vec!["CS220".to_string()],
        }
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut stored = course();
        CoursePatch {
            capacity: Some(120),
            ..CoursePatch::default()
        }
        .apply(&mut stored);

        assert_eq!(stored.capacity, 120);
        assert_eq!(stored.enrolled, 3);
        assert_eq!(stored.prerequisites, vec!["CS220".to_string()]);
    }

    #[test]
    fn patch_accepts_negative_enrollment_but_not_negative_capacity() {
        assert!(CoursePatch::enrolled(-1).validate().is_ok());
        let err = CoursePatch {
            capacity: Some(-5),
            ..CoursePatch::default()
        }
        .validate()
        .expect_err("negative capacity rejected");
        assert_eq!(err, DomainError::negative("capacity", -5));
    }

    #[test]
    fn new_course_requires_name_and_code() {
        let draft = NewCourse {
            name: " ".to_string(),
            code: "CS101".to_string(),
            capacity: 10,
            enrolled: 0,
            prerequisites: Vec::new(),
        };
        assert_eq!(draft.validate(), Err(DomainError::blank("name")));
    }

    #[test]
    fn course_json_defaults_missing_prerequisites() {
        let parsed: Course = serde_json::from_str(
            r#"{"id":1,"name":"Intro","code":"CS101","capacity":2,"enrolled":0}"#,
        )
        .expect("course json");
        assert!(parsed.prerequisites.is_empty());
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let json = serde_json::to_string(&CoursePatch::enrolled(4)).expect("patch json");
        assert_eq!(json, r#"{"enrolled":4}"#);
    }
}
