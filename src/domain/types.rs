//! Shared domain enumerations aligned with persisted columns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of an accepted enrollment submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Applied,
    Rejected,
    DeadLettered,
    Failed,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Applied => "applied",
            RequestStatus::Rejected => "rejected",
            RequestStatus::DeadLettered => "dead_lettered",
            RequestStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl TryFrom<&str> for RequestStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(RequestStatus::Pending),
            "applied" => Ok(RequestStatus::Applied),
            "rejected" => Ok(RequestStatus::Rejected),
            "dead_lettered" => Ok(RequestStatus::DeadLettered),
            "failed" => Ok(RequestStatus::Failed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the worker and the drop pipeline adjust course occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyMode {
    /// Fresh read of the course followed by a blind write of `enrolled ± 1`.
    #[default]
    FetchThenWrite,
    /// Single conditional update executed by the course store.
    Conditional,
}

impl OccupancyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OccupancyMode::FetchThenWrite => "fetch_then_write",
            OccupancyMode::Conditional => "conditional",
        }
    }
}

impl TryFrom<&str> for OccupancyMode {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "fetch_then_write" => Ok(OccupancyMode::FetchThenWrite),
            "conditional" => Ok(OccupancyMode::Conditional),
            _ => Err(()),
        }
    }
}

/// The three independently deployed stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Courses,
    Students,
    Enrollment,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Courses => "courses",
            ServiceKind::Students => "students",
            ServiceKind::Enrollment => "enrollment",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_status_round_trips_through_column_text() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Applied,
            RequestStatus::Rejected,
            RequestStatus::DeadLettered,
            RequestStatus::Failed,
        ] {
            assert_eq!(RequestStatus::try_from(status.as_str()), Ok(status));
        }
        assert!(RequestStatus::try_from("queued").is_err());
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::DeadLettered.is_terminal());
    }

    #[test]
    fn occupancy_mode_defaults_to_fetch_then_write() {
        assert_eq!(OccupancyMode::default(), OccupancyMode::FetchThenWrite);
        assert_eq!(
            OccupancyMode::try_from("conditional"),
            Ok(OccupancyMode::Conditional)
        );
    }
}
