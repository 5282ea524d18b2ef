//! Compute provider configuration.

use crate::error::ComputeError;
use crate::gemini::GeminiClient;
use crate::simulated::SimulatedCompute;
use promptgate_core::ports::ComputeService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Which implementation answers prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeProvider {
    Gemini,
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API base, without the `/models/...` suffix.
    pub api_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-pro".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl GeminiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    pub delay_ms: u64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self { delay_ms: 5000 }
    }
}

impl SimulatedConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Provider choice for the chat path and the heavy path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Answers `POST /chat` cache misses.
    pub chat_provider: ComputeProvider,
    /// Executes heavy jobs on workers.
    pub heavy_provider: ComputeProvider,
    pub gemini: GeminiConfig,
    pub simulated: SimulatedConfig,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            chat_provider: ComputeProvider::Gemini,
            heavy_provider: ComputeProvider::Simulated,
            gemini: GeminiConfig::default(),
            simulated: SimulatedConfig::default(),
        }
    }
}

impl ComputeConfig {
    pub fn build(&self, provider: ComputeProvider) -> Result<Arc<dyn ComputeService>, ComputeError> {
        let service: Arc<dyn ComputeService> = match provider {
            ComputeProvider::Gemini => Arc::new(GeminiClient::new(&self.gemini)?),
            ComputeProvider::Simulated => Arc::new(SimulatedCompute::new(self.simulated.delay())),
        };
        Ok(service)
    }

    pub fn chat_service(&self) -> Result<Arc<dyn ComputeService>, ComputeError> {
        self.build(self.chat_provider)
    }

    pub fn heavy_service(&self) -> Result<Arc<dyn ComputeService>, ComputeError> {
        self.build(self.heavy_provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_gateway_paths() {
        let config = ComputeConfig::default();
        assert_eq!(config.chat_provider, ComputeProvider::Gemini);
        assert_eq!(config.heavy_provider, ComputeProvider::Simulated);
        assert_eq!(config.simulated.delay(), Duration::from_secs(5));
        assert_eq!(config.gemini.model, "gemini-pro");
    }

    #[test]
    fn test_gemini_without_key_is_rejected() {
        let config = ComputeConfig::default();
        assert!(matches!(
            config.chat_service(),
            Err(ComputeError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_build_simulated() {
        let config = ComputeConfig::default();
        let service = config.heavy_service().unwrap();
        assert_eq!(service.name(), "simulated");
    }

    #[test]
    fn test_provider_names_deserialize() {
        let config: ComputeConfig =
            serde_json::from_str(r#"{"chat_provider":"simulated","simulated":{"delay_ms":10}}"#)
                .unwrap();
        assert_eq!(config.chat_provider, ComputeProvider::Simulated);
        assert_eq!(config.simulated.delay(), Duration::from_millis(10));
    }
}
