//! Deployment configuration: the JSON file enumerating sources, per-stage
//! batch/order/filter settings, and provider credentials.
//!
//! Everything here is operator-supplied and trusted as such — including the
//! raw `filter` fragments the store interpolates into its queue queries.
//! Missing credentials are configuration errors raised before any remote
//! call.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::types::{FieldDeclarations, OrderDirection};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("home directory not found (set --config or CONTACTFLOW_CONFIG)")]
    HomeDirNotFound,

    #[error("missing required credential: {0}")]
    MissingCredential(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store path; defaults to `<data dir>/contacts.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub verify: VerifyConfig,

    #[serde(default)]
    pub publish: PublishConfig,
}

/// One upstream source: an SQL query against an external SQLite file plus
/// the declaration of the non-email fields it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,
    pub query: String,
    #[serde(default)]
    pub fields: FieldDeclarations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default)]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_verify_batch")]
    pub batch_size: u32,
    #[serde(default = "default_order_field")]
    pub order_by: String,
    #[serde(default = "default_order_direction")]
    pub order_direction: OrderDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_verify_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_verify_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_publish_batch")]
    pub batch_size: u32,
    #[serde(default = "default_order_field")]
    pub order_by: String,
    #[serde(default = "default_order_direction")]
    pub order_direction: OrderDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default = "default_publish_attempts")]
    pub max_attempts: u32,
}

fn default_verify_batch() -> u32 {
    500
}
fn default_publish_batch() -> u32 {
    100
}
fn default_order_field() -> String {
    "last_import".to_string()
}
fn default_order_direction() -> OrderDirection {
    OrderDirection::Ascending
}
fn default_poll_interval() -> u64 {
    5
}
fn default_verify_timeout() -> u64 {
    300
}
fn default_verify_attempts() -> u32 {
    5
}
fn default_publish_attempts() -> u32 {
    3
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: None,
            batch_size: default_verify_batch(),
            order_by: default_order_field(),
            order_direction: default_order_direction(),
            filter: None,
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_verify_timeout(),
            max_attempts: default_verify_attempts(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: None,
            batch_size: default_publish_batch(),
            order_by: default_order_field(),
            order_direction: default_order_direction(),
            filter: None,
            max_attempts: default_publish_attempts(),
        }
    }
}

impl Config {
    /// Load from an explicit path, or from `<data dir>/config.json`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => data_dir()?.join("config.json"),
        };
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Resolved store path.
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database {
            Some(p) => Ok(p.clone()),
            None => Ok(data_dir()?.join("contacts.db")),
        }
    }

    /// Directory holding the stage lock files.
    pub fn lock_dir(&self) -> Result<PathBuf, ConfigError> {
        match self.db_path()?.parent() {
            Some(parent) => Ok(parent.join("locks")),
            None => Ok(PathBuf::from("locks")),
        }
    }
}

impl VerifyConfig {
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential("verify.api_key"))
    }
}

impl PublishConfig {
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential("publish.api_key"))
    }
}

/// Default data directory: `~/.contactflow`.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".contactflow"))
        .ok_or(ConfigError::HomeDirNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::FieldType;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.sources.is_empty());
        assert_eq!(config.verify.batch_size, 500);
        assert_eq!(config.verify.timeout_secs, 300);
        assert_eq!(config.verify.poll_interval_secs, 5);
        assert_eq!(config.publish.batch_size, 100);
        assert_eq!(config.publish.max_attempts, 3);
        assert_eq!(config.verify.order_by, "last_import");
        assert_eq!(config.verify.order_direction, OrderDirection::Ascending);
    }

    #[test]
    fn test_full_config_parses() {
        let json = r#"{
            "database": "/var/lib/contactflow/contacts.db",
            "sources": [{
                "name": "crm_export",
                "path": "/srv/crm.db",
                "query": "SELECT email, company FROM customers",
                "fields": { "company": "text", "seats": "integer" }
            }],
            "verify": {
                "api_url": "https://verifier.example",
                "api_key": "vk_123",
                "batch_size": 250,
                "order_by": "last_import",
                "order_direction": "desc",
                "filter": "company IS NOT NULL"
            },
            "publish": {
                "api_url": "https://crm.example",
                "api_key": "pk_456"
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(
            config.sources[0].fields.get("seats"),
            Some(&FieldType::Integer)
        );
        assert_eq!(config.verify.batch_size, 250);
        assert_eq!(config.verify.order_direction, OrderDirection::Descending);
        assert_eq!(config.verify.filter.as_deref(), Some("company IS NOT NULL"));
        assert_eq!(config.publish.api_key.as_deref(), Some("pk_456"));
    }

    #[test]
    fn test_missing_credential_is_config_error() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            config.verify.require_api_key(),
            Err(ConfigError::MissingCredential("verify.api_key"))
        ));
        let with_key: VerifyConfig =
            serde_json::from_str(r#"{ "api_key": "vk" }"#).unwrap();
        assert_eq!(with_key.require_api_key().unwrap(), "vk");
    }
}
