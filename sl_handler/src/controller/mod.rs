#[derive(thiserror::Error, Debug)]
pub enum ControllerError {
    #[error("Malformed deploy request: {0}")]
    MalformedRequest(#[from] serde_json::Error),
    #[error(transparent)]
    Deployment(#[from] crate::service::deployment::Error),
    #[error(transparent)]
    Dispatch(#[from] crate::service::dispatcher::Error),
}

pub(crate) mod call;
pub(crate) mod function;
