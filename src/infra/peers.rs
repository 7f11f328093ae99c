//! HTTP clients for the course and student stores.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, header};
use serde::de::DeserializeOwned;

use crate::application::peers::{CourseDirectory, Freshness, PeerError, StudentDirectory};
use crate::domain::entities::{Course, CoursePatch, OccupancyChange, Student};

use super::error::InfraError;

fn user_agent() -> &'static str {
    concat!("registrar/", env!("CARGO_PKG_VERSION"))
}

/// Shared plumbing: base url, bounded timeout, status mapping.
#[derive(Clone, Debug)]
struct PeerClient {
    client: Client,
    base: Url,
    entity: &'static str,
}

impl PeerClient {
    fn new(base: &Url, timeout: Duration, entity: &'static str) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::peer(format!("failed to build http client: {err}")))?;
        let base = base
            .join("/")
            .map_err(|err| InfraError::peer(format!("invalid peer url `{base}`: {err}")))?;
        Ok(Self {
            client,
            base,
            entity,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, PeerError> {
        let url = self
            .base
            .join(path)
            .map_err(|err| PeerError::Unexpected {
                status: 0,
                message: format!("invalid path `{path}`: {err}"),
            })?;
        Ok(self.client.request(method, url))
    }

    fn get(&self, path: &str, freshness: Freshness) -> Result<RequestBuilder, PeerError> {
        let request = self.request(Method::GET, path)?;
        Ok(match freshness {
            Freshness::Cached => request,
            Freshness::Fresh => request.header(header::CACHE_CONTROL, "no-cache"),
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PeerError> {
        let response = request.send().await.map_err(PeerError::unavailable)?;
        let response = self.check(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| PeerError::Decode(err.to_string()))
    }

    async fn check(&self, response: Response) -> Result<Response, PeerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        match status {
            StatusCode::NOT_FOUND => Err(PeerError::NotFound {
                entity: self.entity,
            }),
            StatusCode::CONFLICT => Err(PeerError::CourseFull),
            StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::BAD_GATEWAY
            | StatusCode::GATEWAY_TIMEOUT => Err(PeerError::Unavailable(format!(
                "{} store answered {status}",
                self.entity
            ))),
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(PeerError::Unexpected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpCourseDirectory {
    peer: PeerClient,
}

impl HttpCourseDirectory {
    pub fn new(base: &Url, timeout: Duration) -> Result<Self, InfraError> {
        Ok(Self {
            peer: PeerClient::new(base, timeout, "course")?,
        })
    }
}

#[async_trait]
impl CourseDirectory for HttpCourseDirectory {
    async fn course(&self, id: i64, freshness: Freshness) -> Result<Course, PeerError> {
        let request = self.peer.get(&format!("courses/{id}"), freshness)?;
        self.peer.send(request).await
    }

    async fn update_course(&self, id: i64, patch: CoursePatch) -> Result<Course, PeerError> {
        let request = self
            .peer
            .request(Method::PUT, &format!("courses/{id}"))?
            .json(&patch);
        self.peer.send(request).await
    }

    async fn adjust_occupancy(
        &self,
        id: i64,
        change: OccupancyChange,
    ) -> Result<Course, PeerError> {
        let request = self
            .peer
            .request(Method::POST, &format!("courses/{id}/occupancy"))?
            .json(&change);
        self.peer.send(request).await
    }
}

#[derive(Clone, Debug)]
pub struct HttpStudentDirectory {
    peer: PeerClient,
}

impl HttpStudentDirectory {
    pub fn new(base: &Url, timeout: Duration) -> Result<Self, InfraError> {
        Ok(Self {
            peer: PeerClient::new(base, timeout, "student")?,
        })
    }
}

#[async_trait]
impl StudentDirectory for HttpStudentDirectory {
    async fn student(&self, id: i64, freshness: Freshness) -> Result<Student, PeerError> {
        let request = self.peer.get(&format!("students/{id}"), freshness)?;
        self.peer.send(request).await
    }
}
