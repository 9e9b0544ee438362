//! Admission decision engine
//!
//! Runs settings validation, workload extraction and the trust check in that
//! order and stops at the first failure.

use crate::error::{PolicyError, PolicyResult};
use crate::logger::PolicyLogger;
use crate::settings::Settings;
use crate::trust::is_trusted;
use crate::workload::{ContainerGroup, Workload};
use shared::{ValidationRequest, ValidationResponse, BAD_REQUEST};

/// Outcome of one admission evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { message: String, code: Option<u16> },
}

impl Verdict {
    /// Rejection for a request that could not be understood
    fn malformed(err: &PolicyError) -> Self {
        Verdict::Rejected {
            message: err.to_string(),
            code: Some(BAD_REQUEST),
        }
    }

    fn untrusted(group: ContainerGroup, image: &str) -> Self {
        let message = match group {
            ContainerGroup::Container => format!("The image '{}' is not from a trusted registry", image),
            ContainerGroup::InitContainer => {
                format!("The init container image '{}' is not from a trusted registry", image)
            }
        };
        Verdict::Rejected {
            message,
            code: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl From<Verdict> for ValidationResponse {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Accepted => ValidationResponse::accept(),
            Verdict::Rejected { message, code } => ValidationResponse::reject(message, code),
        }
    }
}

pub struct DecisionEngine<'a> {
    log: &'a dyn PolicyLogger,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(log: &'a dyn PolicyLogger) -> Self {
        Self { log }
    }

    /// Decide on a raw `ValidationRequest` envelope
    pub fn validate(&self, payload: &[u8]) -> Verdict {
        match self.parse(payload) {
            Ok((settings, workload)) => self.evaluate(&settings, &workload),
            Err(e) => {
                self.log.error(&e.to_string());
                Verdict::malformed(&e)
            }
        }
    }

    fn parse(&self, payload: &[u8]) -> PolicyResult<(Settings, Workload)> {
        let envelope: ValidationRequest =
            serde_json::from_slice(payload).map_err(PolicyError::InvalidPayload)?;

        let settings = Settings::from_value(envelope.settings)?;
        settings.valid()?;

        let object = envelope
            .request
            .object
            .ok_or_else(|| PolicyError::InvalidObject(serde::de::Error::missing_field("object")))?;
        self.log.debug(&format!("Raw workload JSON: {}", object));
        let workload = Workload::from_value(object)?;

        Ok((settings, workload))
    }

    /// Check every image of `workload` against the trusted registries.
    pub fn evaluate(&self, settings: &Settings, workload: &Workload) -> Verdict {
        self.log.debug(&format!("Workload: {:?}", workload));
        self.log
            .debug(&format!("Trusted registries: {}", settings.trusted_registries));

        if workload.containers.is_empty() {
            self.log.info("No containers found in the workload");
        }
        if workload.init_containers.is_empty() {
            self.log.info("No init containers found in the workload");
        }

        for (group, image) in workload.images() {
            self.log.debug(&format!("Checking {} image: {}", group, image));
            if !is_trusted(image, &settings.trusted_registries) {
                self.log
                    .error(&format!("{} image {} is not from a trusted registry", group, image));
                return Verdict::untrusted(group, image);
            }
            self.log
                .debug(&format!("{} image {} is from a trusted registry", group, image));
        }

        Verdict::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::LogLevel;
    use serde_json::{json, Value};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingLogger {
        lines: RefCell<Vec<(LogLevel, String)>>,
    }

    impl PolicyLogger for RecordingLogger {
        fn log(&self, level: LogLevel, message: &str) {
            self.lines.borrow_mut().push((level, message.to_string()));
        }
    }

    impl RecordingLogger {
        fn count(&self, level: LogLevel) -> usize {
            self.lines.borrow().iter().filter(|(l, _)| *l == level).count()
        }
    }

    fn trusted() -> Value {
        json!({ "trusted_registries": ["quay.io", "docker.io/library"] })
    }

    fn pod(containers: &[&str], init_containers: &[&str]) -> Value {
        let list = |images: &[&str]| -> Vec<Value> {
            images.iter().map(|image| json!({ "name": "c", "image": image })).collect()
        };
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "test-pod", "namespace": "default" },
            "spec": {
                "containers": list(containers),
                "initContainers": list(init_containers)
            }
        })
    }

    fn payload(settings: Value, object: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "request": {
                "uid": "1299d386-525b-4032-98ae-1949f69f9cfc",
                "kind": { "group": "", "version": "v1", "kind": "Pod" },
                "operation": "CREATE",
                "object": object
            },
            "settings": settings
        }))
        .unwrap()
    }

    fn decide(settings: Value, object: Value) -> Verdict {
        let log = RecordingLogger::default();
        DecisionEngine::new(&log).validate(&payload(settings, object))
    }

    fn rejected_message(verdict: Verdict) -> (String, Option<u16>) {
        match verdict {
            Verdict::Rejected { message, code } => (message, code),
            Verdict::Accepted => panic!("expected a rejection"),
        }
    }

    #[test]
    fn pod_without_containers_is_accepted() {
        assert_eq!(decide(trusted(), pod(&[], &[])), Verdict::Accepted);
    }

    #[test]
    fn all_trusted_images_are_accepted() {
        let verdict = decide(
            trusted(),
            pod(&["quay.io/some/image", "docker.io/library/another/image"], &[]),
        );
        assert!(verdict.is_accepted());
    }

    #[test]
    fn untrusted_image_is_rejected_without_code() {
        let verdict = decide(trusted(), pod(&["quay.io/some/image", "gcr.io/some/image"], &[]));
        let (message, code) = rejected_message(verdict);
        assert_eq!(message, "The image 'gcr.io/some/image' is not from a trusted registry");
        assert_eq!(code, None);
    }

    #[test]
    fn tagged_images_are_accepted() {
        let verdict = decide(
            trusted(),
            pod(&["quay.io/some/image:tag", "docker.io/library/another/image:tag"], &[]),
        );
        assert!(verdict.is_accepted());
    }

    #[test]
    fn untrusted_tagged_image_is_rejected() {
        let verdict = decide(trusted(), pod(&["quay.io/some/image:tag", "gcr.io/some/image:tag"], &[]));
        let (message, _) = rejected_message(verdict);
        assert!(message.contains("gcr.io/some/image:tag"));
    }

    #[test]
    fn digest_images_are_accepted() {
        let verdict = decide(
            trusted(),
            pod(
                &[
                    "quay.io/some/image@sha256:1234567890abcdef",
                    "docker.io/library/another/image@sha256:1234567890abcdef",
                ],
                &[],
            ),
        );
        assert!(verdict.is_accepted());
    }

    #[test]
    fn untrusted_digest_image_is_rejected() {
        let verdict = decide(
            trusted(),
            pod(
                &[
                    "quay.io/some/image@sha256:1234567890abcdef",
                    "gcr.io/some/image@sha256:1234567890abcdef",
                ],
                &[],
            ),
        );
        let (message, code) = rejected_message(verdict);
        assert_eq!(
            message,
            "The image 'gcr.io/some/image@sha256:1234567890abcdef' is not from a trusted registry"
        );
        assert_eq!(code, None);
    }

    #[test]
    fn untrusted_init_container_is_rejected() {
        let verdict = decide(trusted(), pod(&["quay.io/app"], &["gcr.io/init"]));
        let (message, code) = rejected_message(verdict);
        assert_eq!(message, "The init container image 'gcr.io/init' is not from a trusted registry");
        assert_eq!(code, None);
    }

    #[test]
    fn trusted_init_containers_are_accepted() {
        let verdict = decide(trusted(), pod(&["quay.io/app"], &["docker.io/library/busybox"]));
        assert!(verdict.is_accepted());
    }

    #[test]
    fn first_failure_wins_and_containers_come_first() {
        let verdict = decide(
            trusted(),
            pod(&["quay.io/ok", "gcr.io/first", "gcr.io/second"], &["gcr.io/init"]),
        );
        let (message, _) = rejected_message(verdict);
        assert!(message.contains("'gcr.io/first'"));
        assert!(!message.contains("second"));
        assert!(!message.contains("init"));
    }

    #[test]
    fn empty_registry_set_is_a_bad_request() {
        let verdict = decide(json!({ "trusted_registries": [] }), pod(&[], &[]));
        let (message, code) = rejected_message(verdict);
        assert_eq!(message, "no trusted registries provided");
        assert_eq!(code, Some(BAD_REQUEST));
    }

    #[test]
    fn missing_settings_are_a_bad_request() {
        let verdict = decide(Value::Null, pod(&["quay.io/x"], &[]));
        let (_, code) = rejected_message(verdict);
        assert_eq!(code, Some(BAD_REQUEST));
    }

    #[test]
    fn malformed_settings_are_a_bad_request() {
        let verdict = decide(json!({ "trusted_registries": "quay.io" }), pod(&[], &[]));
        let (_, code) = rejected_message(verdict);
        assert_eq!(code, Some(BAD_REQUEST));
    }

    #[test]
    fn malformed_payload_is_a_bad_request() {
        let log = RecordingLogger::default();
        let verdict = DecisionEngine::new(&log).validate(b"{ not json");
        let (_, code) = rejected_message(verdict);
        assert_eq!(code, Some(BAD_REQUEST));
        assert_eq!(log.count(LogLevel::Error), 1);
    }

    #[test]
    fn malformed_object_is_a_bad_request() {
        let verdict = decide(trusted(), json!({ "spec": { "containers": "nope" } }));
        let (message, code) = rejected_message(verdict);
        assert!(message.starts_with("Cannot decode workload object: "));
        assert_eq!(code, Some(BAD_REQUEST));
    }

    #[test]
    fn missing_object_is_a_bad_request() {
        let log = RecordingLogger::default();
        let raw = serde_json::to_vec(&json!({
            "request": { "uid": "x", "operation": "CREATE" },
            "settings": trusted()
        }))
        .unwrap();

        let (message, code) = rejected_message(DecisionEngine::new(&log).validate(&raw));
        assert_eq!(message, "Cannot decode workload object: missing field `object`");
        assert_eq!(code, Some(BAD_REQUEST));
    }

    #[test]
    fn empty_string_registry_accepts_any_image() {
        let verdict = decide(json!({ "trusted_registries": [""] }), pod(&["gcr.io/some/image"], &[]));
        assert!(verdict.is_accepted());
    }

    #[test]
    fn null_object_is_accepted() {
        assert!(decide(trusted(), Value::Null).is_accepted());
    }

    #[test]
    fn rejection_is_logged_as_error() {
        let log = RecordingLogger::default();
        let verdict = DecisionEngine::new(&log).validate(&payload(trusted(), pod(&["gcr.io/x"], &[])));
        assert!(!verdict.is_accepted());
        assert_eq!(log.count(LogLevel::Error), 1);
        assert!(log.count(LogLevel::Debug) > 0);
    }

    #[test]
    fn empty_groups_are_logged_as_info() {
        let log = RecordingLogger::default();
        DecisionEngine::new(&log).validate(&payload(trusted(), pod(&[], &[])));
        assert_eq!(log.count(LogLevel::Info), 2);
    }

    #[test]
    fn verdict_converts_to_response() {
        assert_eq!(ValidationResponse::from(Verdict::Accepted), ValidationResponse::accept());
        let response: ValidationResponse = Verdict::Rejected {
            message: "bad".to_string(),
            code: Some(BAD_REQUEST),
        }
        .into();
        assert_eq!(response.code, Some(400));
        assert_eq!(response.message.as_deref(), Some("bad"));
    }
}
