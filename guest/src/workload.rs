//! Minimal view of the admitted workload: just its container images

use crate::error::{PolicyError, PolicyResult};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Which list of the pod spec an image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerGroup {
    Container,
    InitContainer,
}

impl fmt::Display for ContainerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerGroup::Container => write!(f, "container"),
            ContainerGroup::InitContainer => write!(f, "init container"),
        }
    }
}

/// Image references of a workload, in pod spec order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workload {
    pub containers: Vec<String>,
    pub init_containers: Vec<String>,
}

impl Workload {
    pub fn from_slice(raw: &[u8]) -> PolicyResult<Self> {
        let view: ObjectView = serde_json::from_slice(raw).map_err(PolicyError::InvalidObject)?;
        Ok(view.into())
    }

    /// An absent object (`null`) is an empty workload.
    pub fn from_value(raw: Value) -> PolicyResult<Self> {
        if raw.is_null() {
            return Ok(Self::default());
        }
        let view: ObjectView = serde_json::from_value(raw).map_err(PolicyError::InvalidObject)?;
        Ok(view.into())
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.init_containers.is_empty()
    }

    /// Regular containers first, then init containers.
    pub fn images(&self) -> impl Iterator<Item = (ContainerGroup, &str)> {
        self.containers
            .iter()
            .map(|image| (ContainerGroup::Container, image.as_str()))
            .chain(
                self.init_containers
                    .iter()
                    .map(|image| (ContainerGroup::InitContainer, image.as_str())),
            )
    }
}

#[derive(Deserialize)]
struct ObjectView {
    #[serde(default)]
    spec: Option<SpecView>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpecView {
    #[serde(default)]
    containers: Option<Vec<ContainerView>>,
    #[serde(default)]
    init_containers: Option<Vec<ContainerView>>,
}

#[derive(Deserialize)]
struct ContainerView {
    #[serde(default)]
    image: Option<String>,
}

fn images_of(containers: Option<Vec<ContainerView>>) -> Vec<String> {
    containers
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| c.image)
        .collect()
}

impl From<ObjectView> for Workload {
    fn from(view: ObjectView) -> Self {
        match view.spec {
            Some(spec) => Self {
                containers: images_of(spec.containers),
                init_containers: images_of(spec.init_containers),
            },
            None => Self::default(),
        }
    }
}
