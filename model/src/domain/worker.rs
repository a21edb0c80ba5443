use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Provisioning,
    Ready,
    Failed,
    Stopped,
}

/// One container instance serving a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    pub container_id: String,
    /// Empty until the container is started and its address resolved.
    pub address:      String,
    pub state:        WorkerState,
}

impl Worker {
    pub fn provisioning(container_id: String) -> Self {
        Self {
            container_id,
            address: String::new(),
            state: WorkerState::Provisioning,
        }
    }

    pub fn to_ready(self, address: String) -> Self {
        Self { address, state: WorkerState::Ready, ..self }
    }

    pub fn to_failed(self) -> Self { Self { state: WorkerState::Failed, ..self } }

    pub fn to_stopped(self) -> Self {
        Self { state: WorkerState::Stopped, ..self }
    }

    pub fn is_ready(&self) -> bool { self.state == WorkerState::Ready }
}
