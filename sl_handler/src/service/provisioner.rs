use anyhow::{anyhow, Context};
use docker::{ContainerEngine, FileArtifact};
use futures::future::join_all;
use helper::err::IndividualErrorList;
use model::domain::function::FunctionImage;
use model::domain::worker::Worker;
use model::{FunctionName, PoolSize, DOCKERFILE};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::repository::worker_pool::WorkerPool;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Docker image of function {name} not created: {source}")]
    BuildFailed {
        name:   FunctionName,
        #[source]
        source: docker::Error,
    },
    #[error("None of the {requested} workers of function {name} started: {errors}")]
    NoWorkersAvailable {
        name:      FunctionName,
        requested: usize,
        errors:    IndividualErrorList,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionReport {
    pub succeeded: usize,
    pub failed:    usize,
}

#[derive(Debug)]
pub struct Provisioned {
    pub pool:   Arc<WorkerPool>,
    pub report: ProvisionReport,
}

/// Turns a function image into a pool of running workers.
#[derive(Debug)]
pub struct Provisioner {
    engine: Arc<dyn ContainerEngine>,
}

impl Provisioner {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self { Self { engine } }

    /// Build the image then start `pool_size` workers in parallel.
    /// `on_built` runs once the image exists, before any container is
    /// created.
    #[instrument(level = "trace", skip(self, image, on_built), fields(function = %image.name))]
    pub async fn provision<F: FnOnce()>(
        &self,
        image: &FunctionImage,
        pool_size: PoolSize,
        on_built: F,
    ) -> Result<Provisioned, Error> {
        let files = [
            FileArtifact::new(DOCKERFILE, image.dockerfile.as_str()),
            FileArtifact::new(image.code_file_name.as_ref(), image.code.as_str()),
        ];
        self.engine
            .build_image(image.name.as_ref(), &files)
            .await
            .map_err(|source| Error::BuildFailed {
                name: image.name.clone(),
                source,
            })?;
        info!("Image {} built, starting {} workers", image.name, pool_size);
        on_built();

        let requested = pool_size.into_inner();
        let pool = Arc::new(WorkerPool::new());
        let tasks = (0..requested).map(|index| {
            let engine = self.engine.clone();
            let pool = pool.clone();
            let image_name = image.name.to_string();
            tokio::spawn(async move {
                start_worker(index, engine, pool, image_name).await
            })
        });

        let mut errors = IndividualErrorList::default();
        for outcome in join_all(tasks).await {
            match outcome {
                Ok(Ok(())) => (),
                Ok(Err(err)) => {
                    warn!("Worker of {} not started: {:#}", image.name, err);
                    errors.push(err);
                }
                Err(join_err) => {
                    warn!("Worker creation of {} panicked", image.name);
                    errors.push(anyhow!(join_err).context("Worker task died"));
                }
            }
        }

        let report = ProvisionReport {
            succeeded: pool.size().await,
            failed:    errors.len(),
        };
        if report.succeeded == 0 {
            return Err(Error::NoWorkersAvailable {
                name: image.name.clone(),
                requested,
                errors,
            });
        }

        if errors.is_empty() {
            debug!(
                "Pool of {} ready with {} worker(s)",
                image.name, report.succeeded
            );
        } else {
            debug!(
                "Pool of {} ready with {} worker(s), {} failed: {}",
                image.name, report.succeeded, report.failed, errors
            );
        }
        Ok(Provisioned { pool, report })
    }
}

/// Create, start and register one worker. A container that does not start is
/// removed.
async fn start_worker(
    index: usize,
    engine: Arc<dyn ContainerEngine>,
    pool: Arc<WorkerPool>,
    image_name: String,
) -> anyhow::Result<()> {
    let container_id = engine
        .create_container(&image_name)
        .await
        .with_context(|| format!("Failed to create container #{}", index))?;
    let worker = Worker::provisioning(container_id);

    let address = match engine.start_container(&worker.container_id).await {
        Ok(address) => address,
        Err(err) => {
            let worker = worker.to_failed();
            if let Err(cleanup) =
                engine.delete_container(&worker.container_id).await
            {
                warn!(
                    "Failed to remove container {} that did not start: {}",
                    worker.container_id, cleanup
                );
            }
            return Err(anyhow::Error::new(err).context(format!(
                "Failed to start container #{} ({})",
                index, worker.container_id
            )));
        }
    };

    pool.add(worker.to_ready(address)).await?;
    Ok(())
}
