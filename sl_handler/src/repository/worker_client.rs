use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use reqwest_middleware::ClientWithMiddleware;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to reach the worker at {0}: {1}")]
    Transport(String, reqwest_middleware::Error),
    #[error("Failed to read the answer of the worker at {0}: {1}")]
    Body(String, reqwest::Error),
}

/// A call as it is sent to one worker.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub method:       Method,
    pub url:          String,
    pub content_type: Option<String>,
    pub body:         Bytes,
}

/// What the worker answered, passed back to the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerResponse {
    pub status:       u16,
    pub content_type: Option<String>,
    pub body:         Bytes,
}

#[async_trait]
pub trait WorkerClient: Debug + Sync + Send {
    /// Any HTTP answer, whatever its status, is a success.
    async fn forward(
        &self,
        request: &WorkerRequest,
    ) -> Result<WorkerResponse, Error>;
}

#[derive(Debug)]
pub struct WorkerClientImpl {
    client: Arc<ClientWithMiddleware>,
}

impl WorkerClientImpl {
    pub fn new(client: Arc<ClientWithMiddleware>) -> Self { Self { client } }
}

#[async_trait]
impl WorkerClient for WorkerClientImpl {
    #[instrument(level = "trace", skip(self, request), fields(url = %request.url))]
    async fn forward(
        &self,
        request: &WorkerRequest,
    ) -> Result<WorkerResponse, Error> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .body(request.body.clone());
        if let Some(content_type) = &request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| Error::Transport(request.url.clone(), err))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|err| Error::Body(request.url.clone(), err))?;

        Ok(WorkerResponse { status, content_type, body })
    }
}
