use serde::{Deserialize, Serialize};

/// Whether the registry has been told where to find the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingStatus {
    Unbound,
    Bound,
    BindFailed,
}

/// Stage of the deploy pipeline a function is in. Only `Ready` functions
/// accept calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStage {
    Received,
    Building,
    Provisioning,
    Binding,
    Ready,
    Failed,
}

impl DeploymentStage {
    /// A deploy is still running for this function.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            DeploymentStage::Received
                | DeploymentStage::Building
                | DeploymentStage::Provisioning
                | DeploymentStage::Binding
        )
    }
}
