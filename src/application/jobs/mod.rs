mod context;
mod enrollment;

pub use context::{JobWorkerContext, job_aborted, job_failed};
pub use enrollment::{MissingRequestId, WorkItem, process_enrollment_job};
