//! Set of trusted registry prefixes

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Registry prefixes an image may start with.
///
/// Backed by an ordered set so duplicates collapse and iteration order is
/// stable across evaluations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<String>>", into = "Vec<String>")]
pub struct RegistrySet {
    prefixes: BTreeSet<String>,
}

impl RegistrySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.prefixes.contains(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for RegistrySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            prefixes: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Option<Vec<String>>> for RegistrySet {
    fn from(raw: Option<Vec<String>>) -> Self {
        raw.unwrap_or_default().into_iter().collect()
    }
}

impl From<RegistrySet> for Vec<String> {
    fn from(set: RegistrySet) -> Self {
        set.prefixes.into_iter().collect()
    }
}

impl fmt::Display for RegistrySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, prefix) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", prefix)?;
        }
        write!(f, "]")
    }
}
