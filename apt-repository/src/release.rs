//! Release file generation for APT repositories.
//!
//! The Release file of a flat repository is a straight rendering of the
//! publisher's configuration: one `Key: Value` line per entry, in the order
//! the entries appear in the configuration document.

use crate::{AptRepositoryError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// Repository-level settings loaded from a JSON object.
///
/// Keys are kept in document order and passed through untouched; no key is
/// required.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RepositoryConfig {
    entries: Map<String, Value>,
}

impl std::str::FromStr for RepositoryConfig {
    type Err = AptRepositoryError;

    /// Parse a configuration document.
    fn from_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| AptRepositoryError::invalid_config(e.to_string()))?;
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(AptRepositoryError::invalid_config(format!(
                "expected a JSON object at the top level, found {}",
                json_type(&other)
            ))),
        }
    }
}

impl RepositoryConfig {
    /// Load the configuration at `path`, or `None` if there is no such file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        content
            .parse::<Self>()
            .map(Some)
            .map_err(|e| match e {
                AptRepositoryError::InvalidConfiguration(msg) => {
                    AptRepositoryError::invalid_config(format!("{}: {}", path.display(), msg))
                }
                e => e,
            })
    }

    /// Add or replace an entry. New keys go to the end.
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.entries.insert(key.into(), value.into());
    }

    /// Iterate over entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Render a configuration value the way it appears after `Key: `.
fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(_) => value.to_string(),
    }
}

/// A rendered Release document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Release {
    fields: Vec<(String, String)>,
}

impl Release {
    /// Render every configuration entry, in order.
    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self {
            fields: config
                .iter()
                .map(|(key, value)| (key.clone(), render_value(value)))
                .collect(),
        }
    }

    /// Rendered fields, in order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Get a field value by name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Write the document to `path`, replacing any existing file atomically.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::repository::write_atomic(path.as_ref(), self.to_string().as_bytes())
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.fields {
            let mut lines = value.split('\n');
            let first = lines.next().unwrap_or_default();
            if first.is_empty() {
                write!(f, "{}:", key)?;
            } else {
                write!(f, "{}: {}", key, first)?;
            }
            // Continuation lines must be indented; empty ones become " .".
            for line in lines {
                if line.trim().is_empty() {
                    f.write_str("\n .")?;
                } else {
                    write!(f, "\n {}", line)?;
                }
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

/// Render `config` into a Release file at `path`.
pub fn write_release<P: AsRef<Path>>(config: &RepositoryConfig, path: P) -> Result<Release> {
    let release = Release::from_config(config);
    release.write_to(path)?;
    Ok(release)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_release_from_config() {
        let config = RepositoryConfig::from_str(r#"{"Origin": "MyRepo", "Suite": "stable"}"#).unwrap();

        let release = Release::from_config(&config);

        assert_eq!(release.to_string(), "Origin: MyRepo\nSuite: stable\n");
        assert_eq!(release.get("Suite"), Some("stable"));
    }

    #[test]
    fn test_document_order_preserved() {
        let config = RepositoryConfig::from_str(
            r#"{"Suite": "stable", "Origin": "Z", "Label": "A", "Codename": "ios"}"#,
        )
        .unwrap();

        let release = Release::from_config(&config);
        let keys: Vec<&str> = release
            .fields()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, ["Suite", "Origin", "Label", "Codename"]);
    }

    #[test]
    fn test_scalar_values() {
        let config = RepositoryConfig::from_str(
            r#"{"Version": 1.5, "Count": 3, "NotAutomatic": true, "Empty": null}"#,
        )
        .unwrap();

        assert_eq!(
            Release::from_config(&config).to_string(),
            "Version: 1.5\nCount: 3\nNotAutomatic: true\nEmpty:\n"
        );
    }

    #[test]
    fn test_list_values() {
        let config = RepositoryConfig::from_str(
            r#"{"Architectures": ["iphoneos-arm", "iphoneos-arm64"], "Components": "main"}"#,
        )
        .unwrap();

        assert_eq!(
            Release::from_config(&config).to_string(),
            "Architectures: iphoneos-arm iphoneos-arm64\nComponents: main\n"
        );
    }

    #[test]
    fn test_multiline_value() {
        let mut config = RepositoryConfig::default();
        config.insert("Description", "My repo\nwith tweaks\n\nand themes");

        assert_eq!(
            Release::from_config(&config).to_string(),
            "Description: My repo\n with tweaks\n .\n and themes\n"
        );
    }

    #[test]
    fn test_deserialize_embedded_config() {
        #[derive(Deserialize)]
        struct Settings {
            release: RepositoryConfig,
        }

        let settings: Settings = serde_json::from_value(serde_json::json!({
            "release": {"Origin": "Embedded", "Label": "Nested"}
        }))
        .unwrap();

        assert_eq!(
            Release::from_config(&settings.release).to_string(),
            "Origin: Embedded\nLabel: Nested\n"
        );
    }

    #[test]
    fn test_empty_config() {
        let config = RepositoryConfig::from_str("{}").unwrap();
        assert!(config.is_empty());
        assert_eq!(Release::from_config(&config).to_string(), "");
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            RepositoryConfig::from_str("{\"Origin\": "),
            Err(AptRepositoryError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            RepositoryConfig::from_str("[\"Origin\"]"),
            Err(AptRepositoryError::InvalidConfiguration(msg)) if msg.contains("an array")
        ));
    }

    #[test]
    fn test_load_missing_and_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo_config.json");

        assert_eq!(RepositoryConfig::load(&path).unwrap(), None);

        std::fs::write(&path, r#"{"Label": "Test"}"#).unwrap();
        let config = RepositoryConfig::load(&path).unwrap().unwrap();
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn test_load_malformed_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo_config.json");
        std::fs::write(&path, "Origin: nope").unwrap();

        match RepositoryConfig::load(&path) {
            Err(AptRepositoryError::InvalidConfiguration(msg)) => {
                assert!(msg.contains("repo_config.json"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_write_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Release");
        let config = RepositoryConfig::from_str(r#"{"Origin": "MyRepo", "Suite": "stable"}"#).unwrap();

        write_release(&config, &path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Origin: MyRepo\nSuite: stable\n"
        );
    }
}
