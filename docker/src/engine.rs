use async_trait::async_trait;
use std::fmt::Debug;

use crate::Error;

/// A file placed at the root of an image build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    pub name:    String,
    pub content: String,
}

impl FileArtifact {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { name: name.into(), content: content.into() }
    }
}

/// Image and container lifecycle of a container runtime.
#[async_trait]
pub trait ContainerEngine: Debug + Sync + Send {
    /// Build an image tagged `name` from a context made of `files`.
    async fn build_image(
        &self,
        name: &str,
        files: &[FileArtifact],
    ) -> Result<(), Error>;

    /// Return the id of the created container.
    async fn create_container(&self, image_name: &str)
        -> Result<String, Error>;

    /// Start the container and return the address it is reachable at.
    async fn start_container(&self, container_id: &str)
        -> Result<String, Error>;

    async fn stop_container(&self, container_id: &str) -> Result<(), Error>;

    async fn delete_container(&self, container_id: &str) -> Result<(), Error>;

    async fn delete_image(&self, name: &str) -> Result<(), Error>;
}
