use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions,
    KillContainerOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::image::{BuildImageOptions, RemoveImageOptions};
use bollard::models::ContainerInspectResponse;
use bollard::Docker;
use futures::StreamExt;
use tracing::{debug, instrument, trace};

use crate::configuration::Configuration;
use crate::engine::{ContainerEngine, FileArtifact};
use crate::Error;

const BUILD_MANIFEST: &str = "Dockerfile";

#[derive(Clone, Debug)]
pub struct DockerEngine {
    configuration: Configuration,
    client:        Docker,
}

impl DockerEngine {
    pub fn new(configuration: Configuration) -> Result<DockerEngine, Error> {
        let timeout = configuration.timeout_secs;
        let client = match configuration.address.as_deref() {
            None => Docker::connect_with_local_defaults()?,
            Some(address)
                if address.starts_with("tcp://")
                    || address.starts_with("http://") =>
            {
                let address = address
                    .trim_start_matches("tcp://")
                    .trim_start_matches("http://");
                Docker::connect_with_http(
                    &format!("http://{}", address),
                    timeout,
                    bollard::API_DEFAULT_VERSION,
                )?
            }
            Some(address) => Docker::connect_with_socket(
                address.trim_start_matches("unix://"),
                timeout,
                bollard::API_DEFAULT_VERSION,
            )?,
        };

        Ok(DockerEngine { configuration, client })
    }

    /// Liveness check of the daemon, used at startup.
    pub async fn ping(&self) -> Result<(), Error> {
        self.client.ping().await?;
        Ok(())
    }

    fn address_of(
        &self,
        container_id: &str,
        inspected: ContainerInspectResponse,
    ) -> Result<String, Error> {
        let network = &self.configuration.network;
        inspected
            .network_settings
            .and_then(|settings| settings.networks)
            .and_then(|mut networks| networks.remove(network))
            .and_then(|endpoint| endpoint.ip_address)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| {
                Error::NoAddress(container_id.to_string(), network.clone())
            })
    }
}

/// Pack the files into an uncompressed tar archive, as expected by the
/// daemon's build endpoint.
pub(crate) fn build_context(files: &[FileArtifact]) -> Result<Vec<u8>, Error> {
    let mut archive = tar::Builder::new(Vec::new());
    for file in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(file.content.len() as u64);
        header.set_mode(0o600);
        archive.append_data(
            &mut header,
            &file.name,
            file.content.as_bytes(),
        )?;
    }
    Ok(archive.into_inner()?)
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    #[instrument(level = "trace", skip(self, files))]
    async fn build_image(
        &self,
        name: &str,
        files: &[FileArtifact],
    ) -> Result<(), Error> {
        let context = build_context(files)?;
        trace!("Build context of {} is {} bytes", name, context.len());

        let options = BuildImageOptions {
            t: name.to_string(),
            dockerfile: BUILD_MANIFEST.to_string(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut stream =
            self.client.build_image(options, None, Some(context.into()));
        while let Some(info) = stream.next().await {
            let info = info?;
            if let Some(error) = info.error {
                return Err(Error::Build(error));
            }
            if let Some(message) = info.stream {
                let message = message.trim();
                if !message.is_empty() {
                    debug!("[build {}] {}", name, message);
                }
            }
        }

        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn create_container(
        &self,
        image_name: &str,
    ) -> Result<String, Error> {
        let config = Config {
            image: Some(image_name.to_string()),
            ..Default::default()
        };
        let response = self
            .client
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await?;
        for warning in response.warnings {
            debug!("Container {} created with warning: {}", response.id, warning);
        }
        Ok(response.id)
    }

    #[instrument(level = "trace", skip(self))]
    async fn start_container(
        &self,
        container_id: &str,
    ) -> Result<String, Error> {
        self.client
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;
        let inspected = self
            .client
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await?;
        self.address_of(container_id, inspected)
    }

    #[instrument(level = "trace", skip(self))]
    async fn stop_container(&self, container_id: &str) -> Result<(), Error> {
        self.client
            .kill_container(container_id, None::<KillContainerOptions<String>>)
            .await?;
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn delete_container(&self, container_id: &str) -> Result<(), Error> {
        self.client
            .remove_container(
                container_id,
                Some(RemoveContainerOptions { force: true, ..Default::default() }),
            )
            .await?;
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn delete_image(&self, name: &str) -> Result<(), Error> {
        let deleted = self
            .client
            .remove_image(name, None::<RemoveImageOptions>, None)
            .await?;
        trace!("Deleted {} layer(s) of image {}", deleted.len(), name);
        Ok(())
    }
}
