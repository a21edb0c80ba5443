use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};
use anyhow::Context;
use docker::DockerEngine;
#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;
use reqwest_middleware::ClientBuilder;
use std::env::var;
use std::sync::Arc;
use tracing::subscriber::set_global_default;
use tracing::{debug, info, Subscriber};
use tracing_actix_web::TracingLogger;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_forest::ForestLayer;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::Config;
use crate::handler::routes;
use crate::repository::deployment_tracking::DeploymentTracking;
use crate::repository::registry::ServiceRegistryImpl;
use crate::repository::worker_client::WorkerClientImpl;
use crate::service::deployment::DeploymentCoordinator;
use crate::service::dispatcher::Dispatcher;
use crate::service::provisioner::Provisioner;
use crate::service::registry_binder::RegistryBinder;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod config;
mod controller;
mod handler;
mod repository;
mod service;
#[cfg(test)]
mod test_utils;

/// Compose multiple layers into a `tracing`'s subscriber. The returned guard
/// flushes the log file when dropped.
pub fn get_subscriber(
    env_filter: String,
) -> (impl Subscriber + Send + Sync, WorkerGuard) {
    // Env variable LOG_CONFIG_PATH points at the path where
    // LOG_CONFIG_FILENAME is located
    let log_config_path =
        var("LOG_CONFIG_PATH").unwrap_or_else(|_| "./".to_string());
    // Env variable LOG_CONFIG_FILENAME names the log file
    let log_config_filename = var("LOG_CONFIG_FILENAME")
        .unwrap_or_else(|_| "sl_handler.log".to_string());

    let file_appender =
        tracing_appender::rolling::never(log_config_path, log_config_filename);
    let (non_blocking_file, guard) =
        tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env_filter));

    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt::Layer::default().with_writer(non_blocking_file))
        .with(ForestLayer::default());

    (subscriber, guard)
}

/// Register a subscriber as global default to process span data.
///
/// It should only be called once!
pub fn init_subscriber(
    subscriber: impl Subscriber + Send + Sync,
) -> anyhow::Result<()> {
    LogTracer::init().context("Failed to set logger")?;
    set_global_default(subscriber).context("Failed to set subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (subscriber, _guard) = get_subscriber("info".into());
    init_subscriber(subscriber)?;

    debug!("Tracing initialized.");

    let config = Config::from_env()?;
    debug!("Loaded configuration: {:?}", config);

    let engine = Arc::new(
        DockerEngine::new(config.docker())
            .context("Cannot build the Docker daemon client")?,
    );
    engine.ping().await.context("The Docker daemon does not answer")?;
    info!("Connected to the Docker daemon");

    let http_client =
        Arc::new(ClientBuilder::new(reqwest::Client::new()).build());

    // Repositories
    let tracking = Arc::new(DeploymentTracking::new());
    let registry = Arc::new(ServiceRegistryImpl::new(
        http_client.clone(),
        config.registry_host.as_ref(),
        config.registry_port.into(),
    ));
    let worker_client = Arc::new(WorkerClientImpl::new(http_client));

    // Services
    let provisioner = Arc::new(Provisioner::new(engine.clone()));
    let binder = Arc::new(RegistryBinder::new(registry, config.bind_retry));
    let coordinator = Arc::new(DeploymentCoordinator::new(
        tracking.clone(),
        provisioner,
        binder,
        engine,
        config.pool_size,
        config.host_ip.to_string(),
        config.server_port,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        tracking,
        worker_client,
        config.worker_port,
        config.dispatch_retry,
    ));

    info!(
        "Starting HTTP server on 0.0.0.0:{}, announced as {}",
        config.server_port, config.host_ip
    );

    let coordinator = Data::from(coordinator);
    let dispatcher = Data::from(dispatcher);
    let max_payload = config.max_payload.into_inner();

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::PayloadConfig::new(max_payload))
            .app_data(Data::clone(&coordinator))
            .app_data(Data::clone(&dispatcher))
            .configure(routes)
    })
    .bind(("0.0.0.0", u16::from(config.server_port)))?
    .run()
    .await?;

    Ok(())
}
