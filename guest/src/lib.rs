//! Trusted Registries - Guest Policy Module
//!
//! Admission policy that only lets workloads run images pulled from a
//! configured set of registry prefixes. Built natively as a library and for
//! `wasm32-unknown-unknown` as a policy module loaded by the host.

pub mod engine;
pub mod error;
pub mod logger;
pub mod registry;
pub mod settings;
pub mod trust;
pub mod workload;

#[cfg(target_arch = "wasm32")]
mod abi;

pub use engine::{DecisionEngine, Verdict};
pub use error::{PolicyError, PolicyResult};
pub use logger::{PolicyLogger, TracingLogger};
pub use registry::RegistrySet;
pub use settings::Settings;
pub use workload::Workload;

use shared::ValidationResponse;

/// Evaluate a `ValidationRequest` envelope and encode the response
pub fn validate(payload: &[u8], log: &dyn PolicyLogger) -> PolicyResult<Vec<u8>> {
    let response: ValidationResponse = DecisionEngine::new(log).validate(payload).into();
    serde_json::to_vec(&response).map_err(PolicyError::Encode)
}

/// Validate raw settings and encode the response
pub fn validate_settings(payload: &[u8]) -> PolicyResult<Vec<u8>> {
    let response = settings::validate_settings(payload);
    serde_json::to_vec(&response).map_err(PolicyError::Encode)
}
