//! The enrollment saga: synchronous admission, queued application and the
//! compensating drop.

mod drop;
mod intake;
mod worker;

pub use drop::{DropOutcome, DropPipeline};
pub use intake::{Accepted, EnrollmentIntake};
pub use worker::{EnrollmentWorker, WorkOutcome};

use thiserror::Error;

use crate::application::peers::PeerError;
use crate::application::repos::RepoError;
use crate::domain::admission::Rejection;

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("{}", .0.reason())]
    ValidationFailed(Rejection),
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("apply failure: {0}")]
    ApplyFailure(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl EnrollmentError {
    /// Map a peer failure for a lookup of `entity`.
    pub(crate) fn from_lookup(entity: &'static str, err: PeerError) -> Self {
        match err {
            PeerError::NotFound { .. } => Self::NotFound { entity },
            other => Self::DependencyUnavailable(other.to_string()),
        }
    }
}
