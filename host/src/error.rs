//! Error types for the policy host

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to load WASM module: {0}")]
    WasmLoadError(String),

    #[error("Policy execution failed: {0}")]
    PolicyExecutionError(String),

    #[error("Fuel limit exceeded after {consumed} units")]
    FuelExhausted { consumed: u64 },

    #[error("Memory access out of bounds at offset {offset}")]
    MemoryOutOfBounds { offset: usize },

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Policy rejected the configured settings: {0}")]
    SettingsRejected(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    WasmtimeError(#[from] wasmtime::Error),
}

pub type HostResult<T> = Result<T, HostError>;
