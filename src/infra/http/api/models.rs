use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct EnrollRequest {
    pub student_id: i64,
    pub course_id: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<&'static str>,
}

impl HealthResponse {
    pub fn healthy(service: &'static str) -> Self {
        Self {
            status: "healthy",
            service,
            worker: None,
        }
    }
}
