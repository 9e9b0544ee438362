//! Host configuration, read from `POLICY_HOST_*` environment variables

use crate::error::{HostError, HostResult};
use serde_json::Value;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_POLICIES_DIR: &str = "./policies";
pub const DEFAULT_POLICY_FILE: &str = "trusted-registries.wasm";
pub const DEFAULT_FUEL_LIMIT: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub bind_addr: String,
    pub policies_dir: PathBuf,
    pub policy_file: String,
    pub fuel_limit: u64,
    /// JSON file holding the policy settings
    pub settings_path: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            policies_dir: PathBuf::from(DEFAULT_POLICIES_DIR),
            policy_file: DEFAULT_POLICY_FILE.to_string(),
            fuel_limit: DEFAULT_FUEL_LIMIT,
            settings_path: None,
        }
    }
}

impl HostConfig {
    pub fn from_env() -> HostResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> HostResult<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("POLICY_HOST_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup("POLICY_HOST_POLICIES_DIR") {
            config.policies_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("POLICY_HOST_POLICY_FILE") {
            config.policy_file = file;
        }
        if let Some(fuel) = lookup("POLICY_HOST_FUEL_LIMIT") {
            config.fuel_limit = fuel.trim().parse().map_err(|e| {
                HostError::Config(format!("POLICY_HOST_FUEL_LIMIT '{}': {}", fuel, e))
            })?;
        }
        config.settings_path = lookup("POLICY_HOST_SETTINGS").map(PathBuf::from);

        Ok(config)
    }

    pub fn policy_path(&self) -> PathBuf {
        self.policies_dir.join(&self.policy_file)
    }

    /// Read the policy settings; no file configured means `{}`.
    pub fn load_settings(&self) -> HostResult<Value> {
        match &self.settings_path {
            Some(path) => {
                let raw = std::fs::read(path)?;
                Ok(serde_json::from_slice(&raw)?)
            }
            None => Ok(Value::Object(Default::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = HostConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(
            config.policy_path(),
            PathBuf::from("./policies/trusted-registries.wasm")
        );
    }

    #[test]
    fn variables_override_defaults() {
        let config = HostConfig::from_lookup(lookup(&[
            ("POLICY_HOST_BIND_ADDR", "127.0.0.1:8080"),
            ("POLICY_HOST_POLICIES_DIR", "/opt/policies"),
            ("POLICY_HOST_POLICY_FILE", "policy.wasm"),
            ("POLICY_HOST_FUEL_LIMIT", "5000"),
            ("POLICY_HOST_SETTINGS", "/etc/policy/settings.json"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.policy_path(), PathBuf::from("/opt/policies/policy.wasm"));
        assert_eq!(config.fuel_limit, 5000);
        assert_eq!(
            config.settings_path,
            Some(PathBuf::from("/etc/policy/settings.json"))
        );
    }

    #[test]
    fn malformed_fuel_limit_is_rejected() {
        let err = HostConfig::from_lookup(lookup(&[("POLICY_HOST_FUEL_LIMIT", "lots")])).unwrap_err();
        assert!(matches!(err, HostError::Config(_)));
    }

    #[test]
    fn missing_settings_file_means_empty_object() {
        let settings = HostConfig::default().load_settings().unwrap();
        assert_eq!(settings, serde_json::json!({}));
    }

    #[test]
    fn settings_are_read_from_file() {
        let path = std::env::temp_dir().join(format!("policy-host-settings-{}.json", std::process::id()));
        std::fs::write(&path, br#"{"trusted_registries": ["quay.io"]}"#).unwrap();

        let config = HostConfig {
            settings_path: Some(path.clone()),
            ..HostConfig::default()
        };
        let settings = config.load_settings().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings["trusted_registries"][0], "quay.io");
    }
}
