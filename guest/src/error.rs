//! Error types for the trusted registries policy

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    /// The envelope delivered by the host is not valid JSON
    #[error("{0}")]
    InvalidPayload(serde_json::Error),

    #[error("{0}")]
    InvalidSettings(serde_json::Error),

    #[error("no trusted registries provided")]
    NoTrustedRegistries,

    #[error("Cannot decode workload object: {0}")]
    InvalidObject(serde_json::Error),

    #[error("Cannot encode response: {0}")]
    Encode(serde_json::Error),
}

pub type PolicyResult<T> = Result<T, PolicyError>;
