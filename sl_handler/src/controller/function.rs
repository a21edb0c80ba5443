use model::domain::function::DeployFunction;
use model::view::deploy::DeployRequest;
use model::view::deployment::DeploymentView;
use model::FunctionName;
use tracing::trace;

use super::ControllerError;
use crate::service::deployment::{self, Deployed, DeploymentCoordinator};

/// Decode the body of a deploy call. Missing or mistyped fields are
/// rejected before anything is built.
pub fn parse_deploy(body: &[u8]) -> Result<DeployFunction, ControllerError> {
    let request: DeployRequest = serde_json::from_slice(body)?;
    Ok(request.into())
}

/// Run the whole deploy pipeline, can take a while.
pub async fn deploy(
    body: &[u8],
    coordinator: &DeploymentCoordinator,
) -> Result<Deployed, ControllerError> {
    let deploy = parse_deploy(body)?;
    trace!("deploy function: {}", deploy.name());
    Ok(coordinator.deploy(deploy).await?)
}

/// Text returned to the caller once the function accepts calls.
pub fn created_message(deployed: &Deployed) -> String {
    let mut message = format!("Function created at /call/{}/\n", deployed.name);
    if let Some(err) = &deployed.bind_failure {
        message.push_str(&format!(
            "Warning: the service name registry was not updated: {}\n",
            err
        ));
    }
    message
}

pub async fn undeploy(
    name: &str,
    coordinator: &DeploymentCoordinator,
) -> Result<FunctionName, ControllerError> {
    let name = FunctionName::try_new(name).map_err(|_| {
        deployment::Error::UnknownFunction(name.to_string())
    })?;
    coordinator.undeploy(&name).await?;
    Ok(name)
}

pub async fn list(coordinator: &DeploymentCoordinator) -> Vec<DeploymentView> {
    coordinator.list().await
}
