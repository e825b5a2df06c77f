use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Logical key of the site root document.
pub const ROOT_KEY: &str = "/";

/// Mapping of logical resource path to content fingerprint for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceManifest(BTreeMap<String, String>);

impl ResourceManifest {
    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a cached copy of `key` recorded under `previous` is still valid
    /// for this manifest. Requires the key in both with an identical fingerprint.
    pub fn retains(&self, previous: &ResourceManifest, key: &str) -> bool {
        match (self.fingerprint(key), previous.fingerprint(key)) {
            (Some(current), Some(old)) => current == old,
            _ => false,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResourceManifest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Everything the build tooling hands the coordinator: the full resource
/// manifest plus the ordered core set staged at install time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub resources: ResourceManifest,
    #[serde(default)]
    pub core: Vec<String>,
}

impl BuildManifest {
    /// Create a build manifest, rejecting an empty resource manifest and core
    /// keys it does not declare.
    pub fn new(resources: ResourceManifest, core: Vec<String>) -> Result<Self> {
        let manifest = Self { resources, core };
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let manifest: BuildManifest = serde_json::from_slice(bytes)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.resources.is_empty() {
            return Err(Error::InvalidManifest("no resources declared".to_string()));
        }
        if let Some(missing) = self.core.iter().find(|k| !self.resources.contains(k)) {
            return Err(Error::InvalidManifest(format!(
                "core resource '{}' is not listed in resources",
                missing
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(entries: &[(&str, &str)]) -> ResourceManifest {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_retains_requires_matching_fingerprint() {
        let previous = manifest(&[("a.js", "h1"), ("b.js", "h2"), ("gone.js", "h9")]);
        let current = manifest(&[("a.js", "h1"), ("b.js", "h3"), ("new.js", "h4")]);

        assert!(current.retains(&previous, "a.js"));
        assert!(!current.retains(&previous, "b.js")); // changed
        assert!(!current.retains(&previous, "gone.js")); // removed
        assert!(!current.retains(&previous, "new.js")); // never recorded
        assert!(!current.retains(&previous, "unknown.js"));
    }

    #[test]
    fn test_manifest_serializes_as_flat_object() {
        let m = manifest(&[("/", "r0"), ("main.js", "abc")]);
        let json = String::from_utf8(m.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"/":"r0","main.js":"abc"}"#);
        assert_eq!(ResourceManifest::from_json(json.as_bytes()).unwrap(), m);
    }

    #[test]
    fn test_build_manifest_parses_core() {
        let json = br#"{"resources": {"a.js": "h1", "b.js": "h2"}, "core": ["a.js"]}"#;
        let build = BuildManifest::from_json(json).unwrap();
        assert_eq!(build.core, vec!["a.js".to_string()]);
        assert_eq!(build.resources.fingerprint("b.js"), Some("h2"));
    }

    #[test]
    fn test_build_manifest_rejects_unknown_core_key() {
        let json = br#"{"resources": {"a.js": "h1"}, "core": ["a.js", "missing.js"]}"#;
        let err = BuildManifest::from_json(json).unwrap_err();
        assert!(matches!(err, Error::InvalidManifest(ref msg) if msg.contains("missing.js")));
    }

    #[test]
    fn test_build_manifest_core_defaults_to_empty() {
        let build = BuildManifest::from_json(br#"{"resources": {"/": "r"}}"#).unwrap();
        assert!(build.core.is_empty());
    }

    #[test]
    fn test_build_manifest_rejects_empty_resources() {
        let err = BuildManifest::from_json(br#"{"resources": {}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidManifest(_)));
    }
}
