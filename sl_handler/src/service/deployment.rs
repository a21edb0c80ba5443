use chrono::Utc;
use docker::ContainerEngine;
use futures::future::join_all;
use model::domain::deployment::{BindingStatus, DeploymentStage};
use model::domain::function::DeployFunction;
use model::domain::worker::Worker;
use model::view::deployment::DeploymentView;
use model::{FunctionName, PoolSize, RunnerPort};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::repository::deployment_tracking::{
    self, DeploymentRecord, DeploymentTracking, States,
};
use crate::repository::worker_pool::WorkerPool;
use crate::service::provisioner::{self, ProvisionReport, Provisioner};
use crate::service::registry_binder::{self, RegistryBinder};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Provision(#[from] provisioner::Error),
    #[error("A deploy of function {0} is already in progress ({1:?})")]
    Conflict(FunctionName, DeploymentStage),
    #[error("Function {0} is not deployed")]
    UnknownFunction(String),
    #[error("Deploy of function {0} was interrupted: {1}")]
    Interrupted(FunctionName, String),
}

impl From<deployment_tracking::Error> for Error {
    fn from(value: deployment_tracking::Error) -> Self {
        match value {
            deployment_tracking::Error::Conflict(name, stage) => {
                Error::Conflict(name, stage)
            }
            deployment_tracking::Error::Unknown(name)
            | deployment_tracking::Error::NotReady(name, _) => {
                Error::UnknownFunction(name.to_string())
            }
        }
    }
}

/// Outcome of a deploy that left the function ready for calls.
#[derive(Debug)]
pub struct Deployed {
    pub name:         FunctionName,
    pub report:       ProvisionReport,
    /// Set when the registry could not be told about the function.
    pub bind_failure: Option<registry_binder::Error>,
}

/// Runs the deploy pipeline: build and start workers, bind in the registry,
/// then open the function to calls.
#[derive(Debug, Clone)]
pub struct DeploymentCoordinator {
    tracking:    Arc<DeploymentTracking>,
    provisioner: Arc<Provisioner>,
    binder:      Arc<RegistryBinder>,
    engine:      Arc<dyn ContainerEngine>,
    pool_size:   PoolSize,
    host_ip:     String,
    runner_port: RunnerPort,
}

impl DeploymentCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tracking: Arc<DeploymentTracking>,
        provisioner: Arc<Provisioner>,
        binder: Arc<RegistryBinder>,
        engine: Arc<dyn ContainerEngine>,
        pool_size: PoolSize,
        host_ip: String,
        runner_port: RunnerPort,
    ) -> Self {
        Self {
            tracking,
            provisioner,
            binder,
            engine,
            pool_size,
            host_ip,
            runner_port,
        }
    }

    /// Run the deploy pipeline of `deploy`. The pipeline runs detached from
    /// the caller: dropping the returned future does not stop it, and the
    /// function still ends up `Ready` or `Failed`.
    #[instrument(level = "trace", skip(self, deploy), fields(function = %deploy.name()))]
    pub async fn deploy(&self, deploy: DeployFunction) -> Result<Deployed, Error> {
        let name = deploy.name().clone();
        let previous = self.tracking.begin(&name)?;
        if previous.is_some() {
            info!("Replacing the running deployment of {}", name);
        }

        let pipeline =
            tokio::spawn(self.clone().run(deploy, previous).in_current_span());
        match pipeline.await {
            Ok(res) => res,
            Err(join_err) => {
                let reason = format!("deploy task died: {}", join_err);
                error!("Deploy of {} did not finish: {}", name, reason);
                self.tracking.save_failed(&name, reason.clone());
                Err(Error::Interrupted(name, reason))
            }
        }
    }

    async fn run(
        self,
        deploy: DeployFunction,
        previous: Option<DeploymentRecord>,
    ) -> Result<Deployed, Error> {
        let name = deploy.name().clone();
        self.tracking.save_building(&name);
        let provisioned = match self
            .provisioner
            .provision(&deploy.image, self.pool_size, || {
                self.tracking.save_provisioning(&name)
            })
            .await
        {
            Ok(provisioned) => provisioned,
            Err(err) => {
                self.settle_failure(&name, err.to_string(), previous);
                return Err(err.into());
            }
        };
        if provisioned.report.failed > 0 {
            warn!(
                "Function {} runs with {} out of {} workers",
                name,
                provisioned.report.succeeded,
                self.pool_size
            );
        }

        self.tracking.save_binding(&name);
        let bind_failure = self
            .binder
            .bind(&name, &self.host_ip, self.runner_port, deploy.port)
            .await
            .err();
        let binding = match &bind_failure {
            None => BindingStatus::Bound,
            Some(err) => {
                warn!("Function {} is callable but not bound: {}", name, err);
                BindingStatus::BindFailed
            }
        };

        self.tracking.save_ready(DeploymentRecord {
            name: name.clone(),
            pool: provisioned.pool,
            port: deploy.port,
            binding,
            deployed_at: Utc::now(),
        });
        info!("Function {} is ready", name);

        if let Some(previous) = previous {
            debug!("Tearing down the previous pool of {}", name);
            self.spawn_teardown(previous.pool);
        }

        Ok(Deployed { name, report: provisioned.report, bind_failure })
    }

    /// A failed redeploy gives the name back to the pool it was replacing.
    fn settle_failure(
        &self,
        name: &FunctionName,
        reason: String,
        previous: Option<DeploymentRecord>,
    ) {
        match previous {
            Some(previous) => {
                warn!(
                    "Redeploy of {} failed, the previous pool keeps serving: {}",
                    name, reason
                );
                self.tracking.save_restored(previous);
            }
            None => {
                warn!("Deploy of {} failed: {}", name, reason);
                self.tracking.save_failed(name, reason);
            }
        }
    }

    /// Stop and delete every worker of the function, then its image.
    #[instrument(level = "trace", skip(self))]
    pub async fn undeploy(&self, name: &FunctionName) -> Result<(), Error> {
        if let Some(record) = self.tracking.remove_settled(name)? {
            let workers = record.pool.drain().await;
            teardown(self.engine.clone(), workers).await;
        }
        if let Err(err) = self.engine.delete_image(name.as_ref()).await {
            warn!("Failed to delete the image of {}: {}", name, err);
        }
        info!("Function {} removed", name);
        Ok(())
    }

    pub async fn list(&self) -> Vec<DeploymentView> {
        let mut views = Vec::new();
        for (name, state) in self.tracking.list() {
            let stage = state.stage();
            let view = match state {
                States::Ready(record) => DeploymentView {
                    name,
                    stage,
                    workers: record.pool.size().await,
                    port: Some(record.port),
                    binding: Some(record.binding),
                    deployed_at: Some(record.deployed_at),
                    failure: None,
                },
                States::Failed(reason) => DeploymentView {
                    name,
                    stage,
                    workers: 0,
                    port: None,
                    binding: None,
                    deployed_at: None,
                    failure: Some(reason),
                },
                _ => DeploymentView {
                    name,
                    stage,
                    workers: 0,
                    port: None,
                    binding: Some(BindingStatus::Unbound),
                    deployed_at: None,
                    failure: None,
                },
            };
            views.push(view);
        }
        views
    }

    fn spawn_teardown(&self, pool: Arc<WorkerPool>) {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let workers = pool.drain().await;
            teardown(engine, workers).await;
        });
    }
}

/// Stop then delete the containers of `workers`. Failures are logged and do
/// not prevent the other workers from being removed.
async fn teardown(engine: Arc<dyn ContainerEngine>, workers: Vec<Worker>) {
    let count = workers.len();
    join_all(workers.into_iter().map(|worker| {
        let engine = engine.clone();
        async move {
            if let Err(err) = engine.stop_container(&worker.container_id).await
            {
                warn!("Failed to stop container {}: {}", worker.container_id, err);
            }
            if let Err(err) =
                engine.delete_container(&worker.container_id).await
            {
                warn!(
                    "Failed to delete container {}: {}",
                    worker.container_id, err
                );
            }
            let worker = worker.to_stopped();
            debug!("Container {} stopped", worker.container_id);
        }
    }))
    .await;
    debug!("Tore down {} worker(s)", count);
}
