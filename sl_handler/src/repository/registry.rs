use async_trait::async_trait;
use helper::reqwest_helper::failure_body;
use model::view::registry::Announcement;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{instrument, trace};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to reach the service name registry: {0}")]
    Unreachable(#[from] reqwest_middleware::Error),
    #[error("Registry at {0} answered with code {1}: {2}")]
    Rejected(String, StatusCode, String),
}

/// Service name registry that external clients query to find a function.
#[async_trait]
pub trait ServiceRegistry: Debug + Sync + Send {
    /// Send one announcement. Announcing twice the same thing is accepted.
    async fn announce(&self, announcement: &Announcement) -> Result<(), Error>;
}

#[derive(Debug)]
pub struct ServiceRegistryImpl {
    client:   Arc<ClientWithMiddleware>,
    bind_url: String,
}

impl ServiceRegistryImpl {
    pub fn new(client: Arc<ClientWithMiddleware>, host: &str, port: u16) -> Self {
        Self { client, bind_url: format!("http://{}:{}/bind/", host, port) }
    }
}

#[async_trait]
impl ServiceRegistry for ServiceRegistryImpl {
    #[instrument(level = "trace", skip(self))]
    async fn announce(&self, announcement: &Announcement) -> Result<(), Error> {
        let response =
            self.client.post(&self.bind_url).json(announcement).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Rejected(
                self.bind_url.clone(),
                status,
                failure_body(response).await,
            ));
        }

        trace!("Registry at {} accepted {}", self.bind_url, announcement.name);
        Ok(())
    }
}
