//! Trusted Registries Policy Host
//!
//! Loads the trusted registries policy module with wasmtime and serves its
//! admission decisions over HTTP.

pub mod config;
pub mod error;
pub mod policy_runtime;
pub mod watcher;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use config::HostConfig;
use error::{HostError, HostResult};
use policy_runtime::{PolicyEvaluator, WasmPolicy};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{
    AdmissionRequest, PolicyResponse, SettingsValidationResponse, ValidationRequest,
    ValidationResponse, BAD_REQUEST,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// The module currently serving decisions and the version it reports
#[derive(Clone)]
struct ActivePolicy {
    runtime: Arc<dyn PolicyEvaluator>,
    version: String,
}

/// Application state shared across handlers
pub struct AppState {
    active: RwLock<ActivePolicy>,
    settings: Value,
    config: HostConfig,
}

impl AppState {
    pub fn new(
        runtime: Arc<dyn PolicyEvaluator>,
        policy_version: String,
        settings: Value,
        config: HostConfig,
    ) -> Self {
        Self {
            active: RwLock::new(ActivePolicy {
                runtime,
                version: policy_version,
            }),
            settings,
            config,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub async fn policy_version(&self) -> String {
        self.active.read().await.version.clone()
    }

    /// Runtime and version read together, so a verdict is never paired with
    /// the version of another module.
    async fn snapshot(&self) -> ActivePolicy {
        self.active.read().await.clone()
    }

    /// Recompile the policy file and swap it in; returns the new version.
    pub async fn reload_from_disk(&self) -> HostResult<(usize, String)> {
        let bytes = tokio::fs::read(self.config.policy_path()).await?;
        let fuel_limit = self.config.fuel_limit;
        let settings = self.settings.clone();
        let size = bytes.len();

        let policy = tokio::task::spawn_blocking(move || load_policy(&bytes, fuel_limit, &settings))
            .await
            .map_err(|e| HostError::PolicyExecutionError(format!("Policy load join error: {}", e)))??;

        let new_version = make_policy_version(size);
        self.install(policy, new_version.clone()).await;
        Ok((size, new_version))
    }

    /// Swap in a new runtime together with the version it reports
    pub async fn install(&self, runtime: Arc<dyn PolicyEvaluator>, version: String) {
        *self.active.write().await = ActivePolicy { runtime, version };
    }
}

/// Compile a policy module and make sure it accepts `settings`
pub fn load_policy(wasm_bytes: &[u8], fuel_limit: u64, settings: &Value) -> HostResult<Arc<dyn PolicyEvaluator>> {
    let policy = WasmPolicy::new(wasm_bytes, fuel_limit)?;
    check_settings(&policy, settings)?;
    Ok(Arc::new(policy))
}

/// Run the policy's settings validation and turn a rejection into an error
pub fn check_settings(policy: &dyn PolicyEvaluator, settings: &Value) -> HostResult<()> {
    let raw = serde_json::to_vec(settings)?;
    let response: SettingsValidationResponse = serde_json::from_slice(&policy.validate_settings(&raw)?)?;
    if response.valid {
        return Ok(());
    }
    Err(HostError::SettingsRejected(
        response.message.unwrap_or_else(|| "no reason given".to_string()),
    ))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/validate", post(evaluate_policy))
        .route("/validate_settings", post(validate_settings))
        .route("/reload", post(reload_policy))
        .with_state(state)
}

/// The part of a Kubernetes `AdmissionReview` the host forwards
#[derive(Deserialize)]
struct AdmissionReview {
    request: AdmissionRequest,
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Policy evaluation endpoint
async fn evaluate_policy(State(state): State<Arc<AppState>>, body: Bytes) -> Json<PolicyResponse> {
    let ActivePolicy {
        runtime,
        version: policy_version,
    } = state.snapshot().await;

    let review: AdmissionReview = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting malformed admission review");
            return Json(PolicyResponse {
                response: ValidationResponse::reject(format!("Invalid JSON: {}", e), Some(BAD_REQUEST)),
                policy_version,
                error: None,
            });
        }
    };

    let uid = review.request.uid.clone();
    let envelope = ValidationRequest {
        request: review.request,
        settings: state.settings.clone(),
    };

    let eval_result = tokio::task::spawn_blocking(move || -> HostResult<ValidationResponse> {
        let payload = serde_json::to_vec(&envelope)?;
        let raw = runtime.validate(&payload)?;
        Ok(serde_json::from_slice(&raw)?)
    })
    .await;

    let failure = |error: String| {
        tracing::error!(%uid, %error, "policy evaluation failed");
        Json(PolicyResponse {
            response: ValidationResponse {
                accepted: false,
                message: None,
                code: None,
            },
            policy_version: policy_version.clone(),
            error: Some(error),
        })
    };

    match eval_result {
        Ok(Ok(response)) => {
            tracing::info!(%uid, accepted = response.accepted, "admission decision");
            Json(PolicyResponse {
                response,
                policy_version: policy_version.clone(),
                error: None,
            })
        }
        Ok(Err(e)) => failure(e.to_string()),
        Err(e) => failure(format!("Policy execution join error: {}", e)),
    }
}

/// Settings-only validation endpoint
async fn validate_settings(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Json<SettingsValidationResponse> {
    let runtime = state.snapshot().await.runtime;
    let settings = body.to_vec();

    let result = tokio::task::spawn_blocking(move || -> HostResult<SettingsValidationResponse> {
        let raw = runtime.validate_settings(&settings)?;
        Ok(serde_json::from_slice(&raw)?)
    })
    .await;

    match result {
        Ok(Ok(response)) => Json(response),
        Ok(Err(e)) => Json(SettingsValidationResponse::reject(e.to_string())),
        Err(e) => Json(SettingsValidationResponse::reject(format!(
            "Policy execution join error: {}",
            e
        ))),
    }
}

/// Force policy reload endpoint
async fn reload_policy(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.reload_from_disk().await {
        Ok((size, new_version)) => {
            tracing::info!(policy_version = %new_version, "policy manually reloaded");
            Json(json!({
                "success": true,
                "message": "Policy reloaded successfully",
                "size_bytes": size,
                "policy_version": new_version
            }))
        }
        Err(e) => {
            tracing::error!(error = %e, "policy reload failed");
            Json(json!({
                "success": false,
                "error": format!("Failed to reload policy: {}", e)
            }))
        }
    }
}

pub fn make_policy_version(bytes_len: usize) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}-{}b-{}", env!("CARGO_PKG_VERSION"), bytes_len, ts)
}
