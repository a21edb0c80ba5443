use bytes::Bytes;
use helper::retry::{Exhausted, RetryPolicy};
use model::domain::deployment::DeploymentStage;
use model::{FunctionName, WorkerPort};
use reqwest::Method;
use std::sync::Arc;
use tracing::{instrument, trace};

use crate::repository::deployment_tracking::{self, DeploymentTracking};
use crate::repository::worker_client::{
    self, WorkerClient, WorkerRequest, WorkerResponse,
};
use crate::repository::worker_pool;

pub const CALL_PREFIX: &str = "/call/";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serverless endpoint not provided in {0}")]
    MalformedCallPath(String),
    #[error("Function {0} is not deployed")]
    UnknownFunction(String),
    #[error("Function {0} is not ready yet ({1:?})")]
    FunctionNotReady(FunctionName, DeploymentStage),
    #[error("Function {0} has no worker available")]
    EmptyPool(FunctionName),
    #[error("Method {0} cannot be forwarded")]
    InvalidMethod(String),
    #[error("Time out calling function {name} after {attempts} attempt(s): {last}")]
    DispatchTimeout {
        name:     FunctionName,
        attempts: usize,
        last:     worker_client::Error,
    },
}

/// `/call/<function>/<rest>`, split on the first `/` after the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPath {
    pub function: String,
    pub rest:     String,
}

impl CallPath {
    pub fn parse(path: &str) -> Result<Self, Error> {
        let malformed = || Error::MalformedCallPath(path.to_string());
        let remainder = path.strip_prefix(CALL_PREFIX).ok_or_else(malformed)?;
        let (function, rest) = remainder.split_once('/').ok_or_else(malformed)?;
        if function.is_empty() {
            return Err(malformed());
        }
        Ok(CallPath { function: function.to_string(), rest: rest.to_string() })
    }
}

/// An invocation as received from the caller.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method:       String,
    pub query:        String,
    pub content_type: Option<String>,
    pub body:         Bytes,
}

/// Routes invocations to the workers of ready functions.
#[derive(Debug)]
pub struct Dispatcher {
    tracking:    Arc<DeploymentTracking>,
    workers:     Arc<dyn WorkerClient>,
    worker_port: WorkerPort,
    retry:       RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        tracking: Arc<DeploymentTracking>,
        workers: Arc<dyn WorkerClient>,
        worker_port: WorkerPort,
        retry: RetryPolicy,
    ) -> Self {
        Self { tracking, workers, worker_port, retry }
    }

    /// Forward the call to the next worker of `function_name`, targeting
    /// `rest` on it.
    #[instrument(level = "trace", skip(self, request))]
    pub async fn dispatch(
        &self,
        function_name: &str,
        rest: &str,
        request: InboundRequest,
    ) -> Result<WorkerResponse, Error> {
        let unknown = || Error::UnknownFunction(function_name.to_string());
        let name = FunctionName::try_new(function_name).map_err(|_| unknown())?;
        let record = self.tracking.get_ready(&name).map_err(|err| match err {
            deployment_tracking::Error::NotReady(name, stage) => {
                Error::FunctionNotReady(name, stage)
            }
            _ => unknown(),
        })?;

        let worker = record.pool.next().await.map_err(|err| match err {
            worker_pool::Error::EmptyPool | worker_pool::Error::NotReady(_) => {
                Error::EmptyPool(name.clone())
            }
        })?;

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidMethod(request.method.clone()))?;
        let worker_request = WorkerRequest {
            method,
            url: self.worker_url(&worker.address, rest, &request.query),
            content_type: request.content_type,
            body: request.body,
        };
        trace!(
            "Calling container {} of {} at {}",
            worker.container_id,
            name,
            worker_request.url
        );

        self.retry
            .retry(|| self.workers.forward(&worker_request))
            .await
            .map_err(|Exhausted { attempts, last }| Error::DispatchTimeout {
                name: name.clone(),
                attempts,
                last,
            })
    }

    fn worker_url(&self, address: &str, rest: &str, query: &str) -> String {
        let host = if address.contains(':') {
            format!("[{}]", address)
        } else {
            address.to_string()
        };
        let mut url = format!("http://{}:{}/{}", host, self.worker_port, rest);
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::deployment_tracking::DeploymentRecord;
    use crate::repository::worker_pool::WorkerPool;
    use crate::test_utils::{quick_retry, FakeWorkerClient};
    use chrono::Utc;
    use model::domain::deployment::BindingStatus;
    use model::domain::worker::Worker;
    use std::collections::HashMap;
    use yare::parameterized;

    #[parameterized(
        simple = {"/call/echo/", "echo", ""},
        nested = {"/call/echo/a/b", "echo", "a/b"},
        keeps_slashes = {"/call/echo//x", "echo", "/x"}
    )]
    fn test_parse_call_path(path: &str, function: &str, rest: &str) {
        assert_eq!(
            CallPath::parse(path).unwrap(),
            CallPath { function: function.to_string(), rest: rest.to_string() }
        );
    }

    #[parameterized(
        no_separator = {"/call/foo"},
        no_function = {"/call/"},
        empty_function = {"/call//rest"},
        other_prefix = {"/serverless/foo/"}
    )]
    fn test_parse_malformed_call_path(path: &str) {
        assert!(matches!(
            CallPath::parse(path),
            Err(Error::MalformedCallPath(_))
        ));
    }

    async fn deploy_ready(
        tracking: &DeploymentTracking,
        name: &str,
        workers: usize,
    ) {
        let name = FunctionName::try_new(name).unwrap();
        let pool = Arc::new(WorkerPool::new());
        for ii in 0..workers {
            let worker = Worker::provisioning(format!("c{}", ii))
                .to_ready(format!("10.0.0.{}", ii));
            pool.add(worker).await.unwrap();
        }
        tracking.begin(&name).unwrap();
        tracking.save_building(&name);
        tracking.save_provisioning(&name);
        tracking.save_binding(&name);
        tracking.save_ready(DeploymentRecord {
            name,
            pool,
            port: "8000".parse().unwrap(),
            binding: BindingStatus::Bound,
            deployed_at: Utc::now(),
        });
    }

    fn dispatcher(
        tracking: Arc<DeploymentTracking>,
        client: Arc<FakeWorkerClient>,
        attempts: usize,
    ) -> Dispatcher {
        Dispatcher::new(tracking, client, "8080".parse().unwrap(), quick_retry(attempts))
    }

    fn get(query: &str) -> InboundRequest {
        InboundRequest {
            method:       "GET".to_string(),
            query:        query.to_string(),
            content_type: None,
            body:         Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_unknown_function_makes_no_call() {
        let client = Arc::new(FakeWorkerClient::default());
        let dispatcher =
            dispatcher(Arc::new(DeploymentTracking::new()), client.clone(), 3);

        let err = dispatcher.dispatch("nope", "", get("")).await.unwrap_err();
        assert!(matches!(err, Error::UnknownFunction(name) if name == "nope"));

        let err = dispatcher.dispatch("Not A Name", "", get("")).await.unwrap_err();
        assert!(matches!(err, Error::UnknownFunction(_)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_not_ready_makes_no_call() {
        let tracking = Arc::new(DeploymentTracking::new());
        tracking.begin(&FunctionName::try_new("echo").unwrap()).unwrap();
        let client = Arc::new(FakeWorkerClient::default());
        let dispatcher = dispatcher(tracking, client.clone(), 3);

        let err = dispatcher.dispatch("echo", "", get("")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::FunctionNotReady(_, DeploymentStage::Received)
        ));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let tracking = Arc::new(DeploymentTracking::new());
        deploy_ready(&tracking, "echo", 0).await;
        let client = Arc::new(FakeWorkerClient::default());
        let dispatcher = dispatcher(tracking, client.clone(), 3);

        let err = dispatcher.dispatch("echo", "", get("")).await.unwrap_err();
        assert!(matches!(err, Error::EmptyPool(_)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_forwards_request() {
        let tracking = Arc::new(DeploymentTracking::new());
        deploy_ready(&tracking, "echo", 1).await;
        let client = Arc::new(FakeWorkerClient::default());
        let dispatcher = dispatcher(tracking, client.clone(), 3);

        let request = InboundRequest {
            method:       "POST".to_string(),
            query:        "x=1&y=2".to_string(),
            content_type: Some("application/json".to_string()),
            body:         Bytes::from_static(b"{\"a\":1}"),
        };
        let response =
            dispatcher.dispatch("echo", "api/sum", request).await.unwrap();

        assert_eq!(response.status, 200);
        let sent = client.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].url, "http://10.0.0.0:8080/api/sum?x=1&y=2");
        assert_eq!(sent[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(sent[0].body, Bytes::from_static(b"{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_worker_answer_is_passed_through() {
        let tracking = Arc::new(DeploymentTracking::new());
        deploy_ready(&tracking, "echo", 1).await;
        let client = Arc::new(FakeWorkerClient::answering(
            418,
            Some("text/plain"),
            "short and stout",
        ));
        let dispatcher = dispatcher(tracking, client, 3);

        let response = dispatcher.dispatch("echo", "", get("")).await.unwrap();
        assert_eq!(
            response,
            WorkerResponse {
                status:       418,
                content_type: Some("text/plain".to_string()),
                body:         Bytes::from_static(b"short and stout"),
            }
        );
    }

    #[tokio::test]
    async fn test_round_robin_over_workers() {
        let tracking = Arc::new(DeploymentTracking::new());
        deploy_ready(&tracking, "echo", 3).await;
        let client = Arc::new(FakeWorkerClient::default());
        let dispatcher = dispatcher(tracking, client.clone(), 1);

        for _ in 0..300 {
            dispatcher.dispatch("echo", "", get("")).await.unwrap();
        }

        let urls: Vec<String> =
            client.requests().into_iter().map(|req| req.url).collect();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for url in urls.iter() {
            *counts.entry(url.as_str()).or_default() += 1;
        }
        assert_eq!(counts.len(), 3);
        assert!(counts.values().all(|count| *count == 100));
        // Never twice the same worker before the others had their turn
        for window in urls.windows(3) {
            assert_ne!(window[0], window[1]);
            assert_ne!(window[0], window[2]);
            assert_ne!(window[1], window[2]);
        }
    }

    #[tokio::test]
    async fn test_retries_until_worker_answers() {
        let tracking = Arc::new(DeploymentTracking::new());
        deploy_ready(&tracking, "echo", 1).await;
        let client = Arc::new(FakeWorkerClient::failing(3));
        let dispatcher = dispatcher(tracking, client.clone(), 10);

        dispatcher.dispatch("echo", "", get("")).await.unwrap();
        assert_eq!(client.calls(), 4);
    }

    #[tokio::test]
    async fn test_dispatch_timeout() {
        let tracking = Arc::new(DeploymentTracking::new());
        deploy_ready(&tracking, "echo", 2).await;
        let client = Arc::new(FakeWorkerClient::failing(usize::MAX));
        let dispatcher = dispatcher(tracking, client.clone(), 5);

        let err = dispatcher.dispatch("echo", "", get("")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DispatchTimeout { attempts: 5, .. }
        ));
        assert_eq!(client.calls(), 5);
    }

    #[test]
    fn test_worker_url_brackets_ipv6() {
        let dispatcher = dispatcher(
            Arc::new(DeploymentTracking::new()),
            Arc::new(FakeWorkerClient::default()),
            1,
        );
        assert_eq!(
            dispatcher.worker_url("fd00::2", "run", ""),
            "http://[fd00::2]:8080/run"
        );
    }
}
