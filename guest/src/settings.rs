//! Policy settings and their validation

use crate::error::{PolicyError, PolicyResult};
use crate::registry::RegistrySet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::SettingsValidationResponse;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub trusted_registries: RegistrySet,
}

impl Settings {
    /// Decode settings from raw JSON bytes.
    ///
    /// A missing `trusted_registries` field is not an error here; it is caught
    /// by [`Settings::valid`].
    pub fn from_slice(raw: &[u8]) -> PolicyResult<Self> {
        serde_json::from_slice(raw).map_err(PolicyError::InvalidSettings)
    }

    /// Decode settings already embedded in a request envelope. `null` means
    /// no settings were provided at all.
    pub fn from_value(raw: Value) -> PolicyResult<Self> {
        if raw.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(raw).map_err(PolicyError::InvalidSettings)
    }

    pub fn valid(&self) -> PolicyResult<()> {
        if self.trusted_registries.is_empty() {
            return Err(PolicyError::NoTrustedRegistries);
        }
        Ok(())
    }
}

/// Settings-only validation, run by tooling before the policy is deployed
pub fn validate_settings(raw: &[u8]) -> SettingsValidationResponse {
    match Settings::from_slice(raw).and_then(|settings| settings.valid()) {
        Ok(()) => SettingsValidationResponse::accept(),
        Err(e) => SettingsValidationResponse::reject(format!("Provided settings are not valid: {}", e)),
    }
}
