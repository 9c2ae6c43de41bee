//! Configuration types.
//!
//! The parser reads a single JSON file (path in `PARSER_CONFIG`) once at
//! startup. Nothing here is reloaded while the process runs.

use std::collections::HashMap;
use std::path::Path;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Environment variable naming the JSON config file.
pub const CONFIG_PATH_ENV: &str = "PARSER_CONFIG";

/// Parser configuration as stored in `config.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserConfig {
    /// Legacy v1 credentials; the v2 write API authenticates with `db_token`.
    #[serde(default)]
    pub db_user: Option<String>,
    #[serde(default, deserialize_with = "optional_secret")]
    pub db_pass: Option<SecretString>,
    /// Base URL of the InfluxDB server, e.g. `http://localhost:8086`.
    pub db_url: String,
    #[serde(deserialize_with = "secret")]
    pub db_token: SecretString,
    pub db_org: String,
    pub db_bucket: String,
    /// Subject → category. Loaded for completeness; classification only uses
    /// the sender map.
    #[serde(default)]
    pub subject_map: HashMap<String, String>,
    /// Sender address → category.
    pub sender_map: HashMap<String, String>,
    /// Also accept `text/html` parts at the top level of a message.
    #[serde(default)]
    pub decode_html: bool,
}

impl ParserConfig {
    /// Load the config file named by `PARSER_CONFIG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_err(|_| ConfigError::MissingEnvVar(CONFIG_PATH_ENV.to_string()))?;
        Self::from_path(Path::new(&path))
    }

    /// Load and validate a config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse and validate config JSON.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| ConfigError::ParseError(format!("config.json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject empty values for the settings the store needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("dbUrl", self.db_url.as_str()),
            ("dbOrg", self.db_org.as_str()),
            ("dbBucket", self.db_bucket.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    key: key.to_string(),
                    hint: "Set it in the file named by PARSER_CONFIG.".to_string(),
                });
            }
        }
        if secrecy::ExposeSecret::expose_secret(&self.db_token).is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "dbToken".to_string(),
                hint: "Create an API token with write access to the bucket.".to_string(),
            });
        }
        Ok(())
    }

    /// Build the read-only sender lookup used by the classifier.
    pub fn category_map(&self) -> CategoryMap {
        CategoryMap::new(self.sender_map.clone())
    }
}

fn secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Immutable sender address → category lookup.
///
/// Keys are lower-cased on construction; lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    entries: HashMap<String, String>,
}

impl CategoryMap {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(address, category)| (address.trim().to_lowercase(), category))
                .collect(),
        }
    }

    /// Category for `address`, if one is configured.
    pub fn get(&self, address: &str) -> Option<&str> {
        self.entries
            .get(&address.to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for CategoryMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"{
        "dbUser": "admin",
        "dbPass": "hunter2",
        "dbUrl": "http://localhost:8086",
        "dbToken": "tok-123",
        "dbOrg": "home",
        "dbBucket": "bills",
        "subjectMap": {"Your statement is ready": "card"},
        "senderMap": {"billing@utility.com": "electric", "Water@City.gov": "water"}
    }"#;

    #[test]
    fn parses_existing_config_layout() {
        let config = ParserConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.db_url, "http://localhost:8086");
        assert_eq!(config.db_token.expose_secret(), "tok-123");
        assert_eq!(config.db_org, "home");
        assert_eq!(config.db_bucket, "bills");
        assert_eq!(config.db_user.as_deref(), Some("admin"));
        assert_eq!(config.sender_map.len(), 2);
        assert_eq!(config.subject_map.len(), 1);
        assert!(!config.decode_html);
    }

    #[test]
    fn optional_fields_default() {
        let json = r#"{
            "dbUrl": "http://influx:8086",
            "dbToken": "t",
            "dbOrg": "o",
            "dbBucket": "b",
            "senderMap": {},
            "decodeHtml": true
        }"#;
        let config = ParserConfig::from_json(json).unwrap();
        assert!(config.db_user.is_none());
        assert!(config.db_pass.is_none());
        assert!(config.subject_map.is_empty());
        assert!(config.decode_html);
    }

    #[test]
    fn missing_sender_map_is_parse_error() {
        let json = r#"{"dbUrl": "u", "dbToken": "t", "dbOrg": "o", "dbBucket": "b"}"#;
        let err = ParserConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn empty_bucket_rejected() {
        let json = r#"{
            "dbUrl": "http://influx:8086",
            "dbToken": "t",
            "dbOrg": "o",
            "dbBucket": "  ",
            "senderMap": {}
        }"#;
        match ParserConfig::from_json(json) {
            Err(ConfigError::MissingRequired { key, .. }) => assert_eq!(key, "dbBucket"),
            other => panic!("expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn empty_token_rejected() {
        let json = r#"{
            "dbUrl": "http://influx:8086",
            "dbToken": "",
            "dbOrg": "o",
            "dbBucket": "b",
            "senderMap": {}
        }"#;
        match ParserConfig::from_json(json) {
            Err(ConfigError::MissingRequired { key, .. }) => assert_eq!(key, "dbToken"),
            other => panic!("expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ParserConfig::from_path(file.path()).unwrap();
        assert_eq!(config.db_bucket, "bills");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ParserConfig::from_path(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn category_map_is_case_insensitive() {
        let config = ParserConfig::from_json(SAMPLE).unwrap();
        let map = config.category_map();
        assert_eq!(map.get("billing@utility.com"), Some("electric"));
        assert_eq!(map.get("BILLING@Utility.com"), Some("electric"));
        assert_eq!(map.get("water@city.gov"), Some("water"));
        assert_eq!(map.get("someone@else.com"), None);
    }

    #[test]
    fn category_map_from_iter() {
        let map: CategoryMap = [("a@b.io".to_string(), "x".to_string())]
            .into_iter()
            .collect();
        assert_eq!(map.len(), 1);
        assert!(!map.is_empty());
        assert!(CategoryMap::default().is_empty());
    }
}
