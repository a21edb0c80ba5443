use anyhow::{Context, Result};
use helper::retry::{MaxAttempts, RetryDelayMs, RetryPolicy};
use helper::{env_load, env_var};
use model::{PoolSize, RegistryPort, RunnerPort, WorkerPort};
use nutype::nutype;
use std::env::var;
use std::net::{IpAddr, UdpSocket};
use std::str::FromStr;
use tracing::warn;

env_var!(SERVER_PORT);
env_var!(SERVICE_NAME_HOST);
env_var!(SERVICE_NAME_PORT);
env_var!(HOST_IP);
env_var!(POOL_SIZE);
env_var!(WORKER_PORT);
env_var!(DISPATCH_MAX_ATTEMPTS);
env_var!(DISPATCH_RETRY_DELAY_MS);
env_var!(BIND_MAX_ATTEMPTS);
env_var!(BIND_RETRY_DELAY_MS);
env_var!(DOCKER_HOST);
env_var!(DOCKER_NETWORK);
env_var!(MAX_PAYLOAD_BYTES);

#[nutype(
    sanitize(trim),
    validate(not_empty),
    derive(Clone, Debug, Display, AsRef)
)]
pub struct RegistryHost(String);

#[nutype(
    sanitize(trim),
    validate(not_empty),
    derive(Clone, Debug, Display, AsRef)
)]
pub struct DockerNetwork(String);

#[nutype(validate(greater = 0), derive(Clone, Copy, Debug))]
pub struct MaxPayloadBytes(usize);

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port:    RunnerPort,
    pub registry_host:  RegistryHost,
    pub registry_port:  RegistryPort,
    /// Address announced to the registry.
    pub host_ip:        IpAddr,
    pub pool_size:      PoolSize,
    pub worker_port:    WorkerPort,
    pub dispatch_retry: RetryPolicy,
    pub bind_retry:     RetryPolicy,
    pub docker_host:    Option<String>,
    pub docker_network: DockerNetwork,
    pub max_payload:    MaxPayloadBytes,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let registry_host = env_load!(
            RegistryHost,
            SERVICE_NAME_HOST,
            String,
            default = "localhost".to_string()
        );
        let registry_port: RegistryPort = load_port(SERVICE_NAME_PORT, 9090)?;
        let host_ip = match var(HOST_IP).ok() {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{} is not an IP address", HOST_IP))?,
            None => detect_host_ip(registry_host.as_ref(), registry_port.into())
                .context("Failed to find the IP of this host, set HOST_IP")?,
        };

        Ok(Config {
            server_port: load_port(SERVER_PORT, 9096)?,
            registry_host,
            registry_port,
            host_ip,
            pool_size: env_load!(PoolSize, POOL_SIZE, usize, default = 10),
            worker_port: load_port(WORKER_PORT, 8080)?,
            dispatch_retry: RetryPolicy::new(
                env_load!(
                    MaxAttempts,
                    DISPATCH_MAX_ATTEMPTS,
                    usize,
                    default = 2000
                ),
                env_load!(
                    RetryDelayMs,
                    DISPATCH_RETRY_DELAY_MS,
                    u64,
                    default = 10
                ),
            ),
            bind_retry: RetryPolicy::new(
                env_load!(MaxAttempts, BIND_MAX_ATTEMPTS, usize, default = 2000),
                env_load!(RetryDelayMs, BIND_RETRY_DELAY_MS, u64, default = 10),
            ),
            docker_host: var(DOCKER_HOST).ok().filter(|x| !x.trim().is_empty()),
            docker_network: env_load!(
                DockerNetwork,
                DOCKER_NETWORK,
                String,
                default = "bridge".to_string()
            ),
            max_payload: env_load!(
                MaxPayloadBytes,
                MAX_PAYLOAD_BYTES,
                usize,
                default = 16 * 1024 * 1024
            ),
        })
    }

    pub fn docker(&self) -> docker::Configuration {
        docker::Configuration {
            address: self.docker_host.clone(),
            network: self.docker_network.to_string(),
            ..Default::default()
        }
    }
}

fn load_port<T>(name: &str, default: u16) -> Result<T>
where
    T: FromStr + TryFrom<u16>,
    <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
    <T as TryFrom<u16>>::Error: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} was not formatted right", name)),
        Err(_) => T::try_from(default)
            .with_context(|| format!("Invalid default for {}", name)),
    }
}

/// Source address the host would use to reach `target`. Connecting a UDP
/// socket sends nothing, it only resolves the route.
fn route_source(target: (&str, u16)) -> Result<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0))?;
    socket.connect(target)?;
    Ok(socket.local_addr()?.ip())
}

/// IP this host is reachable at: the one routing to the registry, or the one
/// holding the default route when the registry is local or not resolvable
/// yet.
fn detect_host_ip(registry_host: &str, registry_port: u16) -> Result<IpAddr> {
    pick_host_ip(route_source((registry_host, registry_port)), || {
        route_source(("8.8.8.8", 53))
    })
}

fn pick_host_ip<F>(
    via_registry: Result<IpAddr>,
    via_default_route: F,
) -> Result<IpAddr>
where
    F: FnOnce() -> Result<IpAddr>,
{
    match via_registry {
        Ok(ip) if !ip.is_loopback() => return Ok(ip),
        Ok(_) => (),
        Err(err) => {
            warn!("No route to the registry ({:#}), using the default route", err)
        }
    }
    let ip = via_default_route().context("No default route")?;
    if ip.is_loopback() || ip.is_unspecified() {
        anyhow::bail!("Only a loopback address is available");
    }
    Ok(ip)
}
