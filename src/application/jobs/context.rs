use std::sync::Arc;

use apalis::prelude::Error as ApalisError;

use crate::application::enrollment::EnrollmentWorker;

/// Shared context handed to the enrollment job handler.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub worker: Arc<EnrollmentWorker>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}

/// Convert any error into an [`ApalisError::Abort`] so the job is not retried.
pub fn job_aborted<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Abort(Arc::new(boxed))
}
