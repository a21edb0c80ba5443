use async_trait::async_trait;
use bytes::Bytes;
use docker::{ContainerEngine, FileArtifact};
use helper::retry::{MaxAttempts, RetryDelayMs, RetryPolicy};
use model::view::registry::Announcement;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::repository::registry::{self, ServiceRegistry};
use crate::repository::worker_client::{
    self, WorkerClient, WorkerRequest, WorkerResponse,
};

pub fn quick_retry(max_attempts: usize) -> RetryPolicy {
    RetryPolicy::new(
        MaxAttempts::try_new(max_attempts).unwrap(),
        RetryDelayMs::try_new(1).unwrap(),
    )
}

#[derive(Debug, Default)]
pub struct EngineCalls {
    pub builds:         Vec<(String, Vec<FileArtifact>)>,
    pub created:        usize,
    pub started:        usize,
    pub stopped:        Vec<String>,
    pub deleted:        Vec<String>,
    pub deleted_images: Vec<String>,
}

/// In-memory container engine. The first `failing_creates` creations and the
/// first `failing_starts` starts fail. Builds fail when `fail_build` is set or
/// once `healthy_builds` builds went through, each one taking `build_delay`.
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub fail_build:      bool,
    pub healthy_builds:  Option<usize>,
    pub build_delay:     Duration,
    pub failing_creates: usize,
    pub failing_starts:  usize,
    pub calls:           Mutex<EngineCalls>,
}

impl FakeEngine {
    pub fn builds(&self) -> Vec<(String, Vec<FileArtifact>)> {
        self.calls.lock().unwrap().builds.clone()
    }

    pub fn created(&self) -> usize { self.calls.lock().unwrap().created }

    pub fn stopped_containers(&self) -> Vec<String> {
        self.calls.lock().unwrap().stopped.clone()
    }

    pub fn deleted_containers(&self) -> Vec<String> {
        self.calls.lock().unwrap().deleted.clone()
    }

    pub fn deleted_images(&self) -> Vec<String> {
        self.calls.lock().unwrap().deleted_images.clone()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn build_image(
        &self,
        name: &str,
        files: &[FileArtifact],
    ) -> Result<(), docker::Error> {
        tokio::time::sleep(self.build_delay).await;
        let builds = {
            let mut calls = self.calls.lock().unwrap();
            calls.builds.push((name.to_string(), files.to_vec()));
            calls.builds.len()
        };
        if self.fail_build || self.healthy_builds.is_some_and(|n| builds > n) {
            return Err(docker::Error::Build("syntax error".to_string()));
        }
        Ok(())
    }

    async fn create_container(
        &self,
        _image_name: &str,
    ) -> Result<String, docker::Error> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.created;
        calls.created += 1;
        if index < self.failing_creates {
            return Err(std::io::Error::other("daemon unavailable").into());
        }
        Ok(format!("container-{}", index))
    }

    async fn start_container(
        &self,
        container_id: &str,
    ) -> Result<String, docker::Error> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.started;
        calls.started += 1;
        if index < self.failing_starts {
            return Err(docker::Error::NoAddress(
                container_id.to_string(),
                "bridge".to_string(),
            ));
        }
        Ok(format!("10.0.{}.{}", index / 250, index % 250 + 1))
    }

    async fn stop_container(
        &self,
        container_id: &str,
    ) -> Result<(), docker::Error> {
        self.calls.lock().unwrap().stopped.push(container_id.to_string());
        Ok(())
    }

    async fn delete_container(
        &self,
        container_id: &str,
    ) -> Result<(), docker::Error> {
        self.calls.lock().unwrap().deleted.push(container_id.to_string());
        Ok(())
    }

    async fn delete_image(&self, name: &str) -> Result<(), docker::Error> {
        self.calls.lock().unwrap().deleted_images.push(name.to_string());
        Ok(())
    }
}

/// Registry rejecting the first `failures` announcements.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    failures:      usize,
    calls:         AtomicUsize,
    announcements: Mutex<Vec<Announcement>>,
}

impl FakeRegistry {
    pub fn failing(failures: usize) -> Self {
        Self { failures, ..Default::default() }
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    /// Accepted announcements only.
    pub fn announcements(&self) -> Vec<Announcement> {
        self.announcements.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceRegistry for FakeRegistry {
    async fn announce(
        &self,
        announcement: &Announcement,
    ) -> Result<(), registry::Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(registry::Error::Rejected(
                "http://registry/bind/".to_string(),
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
                "not yet".to_string(),
            ));
        }
        self.announcements.lock().unwrap().push(announcement.clone());
        Ok(())
    }
}

/// Worker endpoint refusing the first `failures` connections then always
/// giving the same answer.
#[derive(Debug)]
pub struct FakeWorkerClient {
    failures: usize,
    answer:   WorkerResponse,
    calls:    AtomicUsize,
    requests: Mutex<Vec<WorkerRequest>>,
}

impl Default for FakeWorkerClient {
    fn default() -> Self { Self::answering(200, Some("text/plain"), "ok") }
}

impl FakeWorkerClient {
    pub fn answering(
        status: u16,
        content_type: Option<&str>,
        body: &'static str,
    ) -> Self {
        Self {
            failures: 0,
            answer:   WorkerResponse {
                status,
                content_type: content_type.map(str::to_string),
                body: Bytes::from_static(body.as_bytes()),
            },
            calls:    AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(failures: usize) -> Self {
        Self { failures, ..Default::default() }
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    /// Requests that got an answer.
    pub fn requests(&self) -> Vec<WorkerRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkerClient for FakeWorkerClient {
    async fn forward(
        &self,
        request: &WorkerRequest,
    ) -> Result<WorkerResponse, worker_client::Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(worker_client::Error::Transport(
                request.url.clone(),
                reqwest_middleware::Error::Middleware(anyhow::anyhow!(
                    "connection refused"
                )),
            ));
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.answer.clone())
    }
}
