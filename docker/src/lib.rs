pub use self::client::DockerEngine;
pub use self::configuration::Configuration;
pub use self::engine::{ContainerEngine, FileArtifact};

mod client;
pub mod configuration;
pub mod engine;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Docker(#[from] bollard::errors::Error),
    #[error("Failed to assemble the build context: {0}")]
    BuildContext(#[from] std::io::Error),
    #[error("Image build failed: {0}")]
    Build(String),
    #[error("Container {0} has no address on network {1}")]
    NoAddress(String, String),
}
