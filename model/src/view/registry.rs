use serde::{Deserialize, Serialize};

use crate::{ExternalPort, FunctionName, RunnerPort};

/// Tells the service-name registry that `name` is reachable through the
/// handler at `host_runner:port_runner` and owns the public `port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub name:        FunctionName,
    pub host_runner: String,
    pub port_runner: RunnerPort,
    pub port:        ExternalPort,
}
