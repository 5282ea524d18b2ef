//! Throwaway NATS servers for integration tests.

use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::nats::Nats;

const NATS_TAG: &str = "2.10-alpine";
const CLIENT_PORT: u16 = 4222;

/// A NATS server with JetStream enabled. Stopped on drop.
pub struct NatsContainer {
    _container: ContainerAsync<Nats>,
    url: String,
}

impl NatsContainer {
    pub async fn start() -> anyhow::Result<Self> {
        let container = Nats::default()
            .with_tag(NATS_TAG)
            .with_cmd(["-js"])
            .start()
            .await?;

        let url = format!(
            "nats://{}:{}",
            container.get_host().await?,
            container.get_host_port_ipv4(CLIENT_PORT).await?
        );

        Ok(Self {
            _container: container,
            url,
        })
    }

    /// Client URL reachable from the test process.
    pub fn url(&self) -> &str {
        &self.url
    }
}
