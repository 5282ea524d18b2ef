//! Process configuration.
//!
//! Sources, lowest precedence first: built-in defaults, `promptgate.toml`
//! (or `--config`), `PROMPTGATE__<SECTION>__<KEY>` variables, then the
//! conventional `PORT`, `NATS_URL` and `GEMINI_API_KEY` shortcuts.

use anyhow::{Context, bail};
use config::{Config, Environment, File};
use promptgate_compute::ComputeConfig;
use promptgate_nats::NatsConfig;
use promptgate_trace::TracingConfig;
use promptgate_worker::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_BASENAME: &str = "promptgate";
const ENV_PREFIX: &str = "PROMPTGATE";

/// Which store and queue the process talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Nats,
    /// Single-process store and queue; workers always run embedded.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl ServerConfig {
    /// `host:port`, resolved when bound.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Everything the binary reads at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendKind,
    pub nats: NatsConfig,
    pub compute: ComputeConfig,
    pub cache: CacheConfig,
    pub worker: WorkerConfig,
    pub telemetry: TracingConfig,
}

impl AppConfig {
    /// Load from `.env`, the config file and the process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        // A missing .env is normal.
        let _ = dotenvy::dotenv();
        Self::from_sources(path, std::env::vars().collect())
    }

    /// Load with an explicit environment instead of the process one.
    pub fn from_sources(path: Option<&Path>, env: HashMap<String, String>) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("nats.urls")
                .source(Some(env.clone())),
        );

        if let Some(port) = env.get("PORT") {
            let port: u16 = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {port}"))?;
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(urls) = env.get("NATS_URL") {
            let urls: Vec<String> = urls
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
            builder = builder.set_override("nats.urls", urls)?;
        }
        if let Some(key) = env.get("GEMINI_API_KEY") {
            builder = builder.set_override("compute.gemini.api_key", key.as_str())?;
        }

        let mut config: AppConfig = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        config.reconcile()?;
        Ok(config)
    }

    /// Check cross-section constraints and settle the values they imply.
    fn reconcile(&mut self) -> anyhow::Result<()> {
        self.worker.validate()?;

        if self.cache.ttl_secs == 0 {
            bail!("cache.ttl_secs must be at least 1");
        }

        match self.backend {
            BackendKind::Memory => self.worker.embedded = true,
            BackendKind::Nats => {
                if self.nats.urls.is_empty() {
                    bail!("nats.urls must name at least one server");
                }
                // Redelivery is driven by the consumer's ack_wait, so the
                // ledger lease has to match it.
                if self.worker.lease_secs != self.nats.ack_wait_secs {
                    self.worker.lease_secs = self.nats.ack_wait_secs;
                    self.worker.validate()?;
                }
            }
        }
        Ok(())
    }

    /// Pretty JSON with secrets masked.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut shown = self.clone();
        if shown.compute.gemini.api_key.is_some() {
            shown.compute.gemini.api_key = Some("***".to_string());
        }
        Ok(serde_json::to_string_pretty(&shown)?)
    }
}
