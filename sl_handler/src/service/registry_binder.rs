use helper::retry::{Exhausted, RetryPolicy};
use model::view::registry::Announcement;
use model::{ExternalPort, FunctionName, RunnerPort};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::repository::registry::{self, ServiceRegistry};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to bind function {name} in the service name registry after {attempts} attempt(s): {last}")]
    BindTimeout {
        name:     FunctionName,
        attempts: usize,
        last:     registry::Error,
    },
}

/// Tells the service name registry where a function can be reached.
#[derive(Debug)]
pub struct RegistryBinder {
    registry: Arc<dyn ServiceRegistry>,
    retry:    RetryPolicy,
}

impl RegistryBinder {
    pub fn new(registry: Arc<dyn ServiceRegistry>, retry: RetryPolicy) -> Self {
        Self { registry, retry }
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn bind(
        &self,
        name: &FunctionName,
        host_ip: &str,
        internal_port: RunnerPort,
        external_port: ExternalPort,
    ) -> Result<(), Error> {
        let announcement = Announcement {
            name:        name.clone(),
            host_runner: host_ip.to_string(),
            port_runner: internal_port,
            port:        external_port,
        };

        self.retry
            .retry(|| self.registry.announce(&announcement))
            .await
            .map_err(|Exhausted { attempts, last }| Error::BindTimeout {
                name: name.clone(),
                attempts,
                last,
            })?;

        info!(
            "Function {} bound to {}:{} (public port {})",
            name, host_ip, internal_port, external_port
        );
        Ok(())
    }
}
