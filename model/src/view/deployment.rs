use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::deployment::{BindingStatus, DeploymentStage};
use crate::{ExternalPort, FunctionName};

/// One entry of `GET /functions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentView {
    pub name:        FunctionName,
    pub stage:       DeploymentStage,
    pub workers:     usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port:        Option<ExternalPort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding:     Option<BindingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure:     Option<String>,
}
