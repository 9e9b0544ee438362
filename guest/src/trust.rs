//! Registry trust check for a single image reference

use crate::registry::RegistrySet;

/// Returns `true` when `image` starts with any trusted prefix.
///
/// Matching is a plain case-sensitive string prefix: tags and digests follow
/// the registry path, so they never need stripping. The prefix is not anchored
/// to a path segment, so `quay.io` also trusts `quay.io.example.com/...`;
/// operators close that gap by listing prefixes ending in `/`. An empty
/// string entry is a prefix of every image: it passes [`Settings::valid`]
/// and trusts everything.
///
/// [`Settings::valid`]: crate::settings::Settings::valid
pub fn is_trusted(image: &str, trusted: &RegistrySet) -> bool {
    trusted.iter().any(|registry| image.starts_with(registry))
}
