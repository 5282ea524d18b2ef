//! Compute service clients for promptgate.
//!
//! [`GeminiClient`] answers chat prompts through the Gemini
//! `generateContent` API; [`SimulatedCompute`] stands in for long-running
//! work on the heavy path and in tests.

pub mod config;
pub mod error;
pub mod gemini;
pub mod simulated;

pub use config::{ComputeConfig, ComputeProvider, GeminiConfig, SimulatedConfig};
pub use error::ComputeError;
pub use gemini::GeminiClient;
pub use simulated::SimulatedCompute;
