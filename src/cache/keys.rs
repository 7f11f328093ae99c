//! Cache key definitions.
//!
//! Keys render as `course:{id}` and `student:{id}` so entries written by any
//! service instance sharing a backend address the same record.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Course,
    Student,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Course => "course",
            EntityKind::Student => "student",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: EntityKind,
    pub id: i64,
}

impl CacheKey {
    pub fn course(id: i64) -> Self {
        Self {
            kind: EntityKind::Course,
            id,
        }
    }

    pub fn student(id: i64) -> Self {
        Self {
            kind: EntityKind::Student,
            id,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}
