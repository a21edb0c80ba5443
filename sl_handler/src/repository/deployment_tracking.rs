use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use model::domain::deployment::{BindingStatus, DeploymentStage};
use model::{ExternalPort, FunctionName};
use std::sync::Arc;
use tracing::warn;

use super::worker_pool::WorkerPool;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Function {0} is not deployed")]
    Unknown(FunctionName),
    #[error("Function {0} is not ready ({1:?})")]
    NotReady(FunctionName, DeploymentStage),
    #[error("A deploy of function {0} is already in progress ({1:?})")]
    Conflict(FunctionName, DeploymentStage),
}

/// A function that went through the whole deploy pipeline.
#[derive(Debug, Clone)]
pub struct DeploymentRecord {
    pub name:        FunctionName,
    pub pool:        Arc<WorkerPool>,
    pub port:        ExternalPort,
    pub binding:     BindingStatus,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum States {
    Received,
    Building,
    Provisioning,
    Binding,
    Ready(DeploymentRecord),
    Failed(String),
}

impl From<DeploymentRecord> for States {
    fn from(value: DeploymentRecord) -> Self { States::Ready(value) }
}

impl States {
    pub fn stage(&self) -> DeploymentStage {
        match self {
            States::Received => DeploymentStage::Received,
            States::Building => DeploymentStage::Building,
            States::Provisioning => DeploymentStage::Provisioning,
            States::Binding => DeploymentStage::Binding,
            States::Ready(_) => DeploymentStage::Ready,
            States::Failed(_) => DeploymentStage::Failed,
        }
    }
}

/// Deploy pipeline state of every function name known to the handler.
#[derive(Debug, Default)]
pub struct DeploymentTracking {
    database: dashmap::DashMap<FunctionName, States>,
}

impl DeploymentTracking {
    pub fn new() -> Self { Self::default() }

    /// Start a deploy of `name`. Fails if a deploy of the same name is still
    /// running; otherwise returns the record being replaced, if any.
    pub fn begin(
        &self,
        name: &FunctionName,
    ) -> Result<Option<DeploymentRecord>, Error> {
        match self.database.entry(name.clone()) {
            Entry::Occupied(mut entry) => {
                let stage = entry.get().stage();
                if stage.is_in_flight() {
                    return Err(Error::Conflict(name.clone(), stage));
                }
                match entry.insert(States::Received) {
                    States::Ready(previous) => Ok(Some(previous)),
                    _ => Ok(None),
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(States::Received);
                Ok(None)
            }
        }
    }

    pub fn save_building(&self, name: &FunctionName) {
        self.transition(name, DeploymentStage::Received, States::Building);
    }

    pub fn save_provisioning(&self, name: &FunctionName) {
        self.transition(
            name,
            DeploymentStage::Building,
            States::Provisioning,
        );
    }

    pub fn save_binding(&self, name: &FunctionName) {
        self.transition(name, DeploymentStage::Provisioning, States::Binding);
    }

    pub fn save_ready(&self, record: DeploymentRecord) {
        let name = record.name.clone();
        self.transition(&name, DeploymentStage::Binding, record.into());
    }

    pub fn save_failed(&self, name: &FunctionName, reason: String) {
        let Some(mut previous_record) = self.database.get_mut(name) else {
            return;
        };
        let value = previous_record.value_mut();
        if value.stage().is_in_flight() {
            *value = States::Failed(reason);
        }
    }

    /// Put `record` back in place of the deploy that was meant to replace it.
    pub fn save_restored(&self, record: DeploymentRecord) {
        let name = record.name.clone();
        let Some(mut previous_record) = self.database.get_mut(&name) else {
            return;
        };
        let value = previous_record.value_mut();
        if value.stage().is_in_flight() {
            *value = record.into();
        }
    }

    fn transition(
        &self,
        name: &FunctionName,
        expected: DeploymentStage,
        next: States,
    ) {
        let Some(mut previous_record) = self.database.get_mut(name) else {
            return;
        };
        let value = previous_record.value_mut();
        if value.stage() == expected {
            *value = next;
        } else {
            warn!(
                "Function {} is {:?}, expected {:?} before {:?}",
                name,
                value.stage(),
                expected,
                next.stage()
            );
        }
    }

    pub fn get_ready(
        &self,
        name: &FunctionName,
    ) -> Result<DeploymentRecord, Error> {
        let Some(state) = self.database.get(name) else {
            return Err(Error::Unknown(name.clone()));
        };
        match state.value() {
            States::Ready(record) => Ok(record.clone()),
            other => Err(Error::NotReady(name.clone(), other.stage())),
        }
    }

    pub fn get_stage(&self, name: &FunctionName) -> Option<DeploymentStage> {
        self.database.get(name).map(|state| state.value().stage())
    }

    /// Forget about a function whose deploy is over. Returns its record when
    /// it was ready.
    pub fn remove_settled(
        &self,
        name: &FunctionName,
    ) -> Result<Option<DeploymentRecord>, Error> {
        match self.database.entry(name.clone()) {
            Entry::Occupied(entry) => {
                let stage = entry.get().stage();
                if stage.is_in_flight() {
                    return Err(Error::Conflict(name.clone(), stage));
                }
                match entry.remove() {
                    States::Ready(record) => Ok(Some(record)),
                    _ => Ok(None),
                }
            }
            Entry::Vacant(_) => Err(Error::Unknown(name.clone())),
        }
    }

    /// Snapshot of every tracked function, sorted by name.
    pub fn list(&self) -> Vec<(FunctionName, States)> {
        let mut all: Vec<_> = self
            .database
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}
