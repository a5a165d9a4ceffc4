//! Pipeline configuration.
//!
//! Everything the run needs is read once into explicit structs and handed to
//! the extractor, loader and schema tightener constructors:
//!
//! - [`DbCredentials`] - one YAML file per database (source RDS, warehouse)
//! - [`PipelineConfig`] - sources, output and cleaning options
//!
//! # Example
//!
//! ```yaml
//! source_credentials: config/db_creds.yaml
//! warehouse_credentials: config/local_db_creds.yaml
//! sources:
//!   users_table: legacy_users
//!   orders_table: orders_table
//!   card_pdf: data/card_details.pdf
//!   stores_api:
//!     number_of_stores_url: https://api.example.com/prod/number_stores
//!     store_details_url: https://api.example.com/prod/store_details/{store_number}
//!     max_retries: 3
//!   products_file: https://data.example.com/products.csv
//!   date_events_file: https://data.example.com/date_details.json
//! output:
//!   kind: postgres
//! cleaning:
//!   residual_nulls: drop
//! tighten_schema: true
//! ```

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::clean::CleanOptions;
use crate::error::{ConfigError, ConfigResult};
use crate::extract::api::DEFAULT_MAX_RETRIES;

/// Environment variable overriding the stores API key.
pub const API_KEY_ENV: &str = "ETL_API_KEY";

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> ConfigResult<T> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })
}

// =============================================================================
// Database credentials
// =============================================================================

fn default_port() -> u16 {
    5432
}

/// Connection settings for one PostgreSQL database.
///
/// Keys are upper case; the `RDS_` prefixed spelling is accepted too.
#[derive(Clone, Deserialize)]
pub struct DbCredentials {
    #[serde(rename = "HOST", alias = "RDS_HOST")]
    pub host: String,
    #[serde(rename = "PORT", alias = "RDS_PORT", default = "default_port")]
    pub port: u16,
    #[serde(rename = "USER", alias = "RDS_USER")]
    pub user: String,
    #[serde(rename = "PASSWORD", alias = "RDS_PASSWORD")]
    pub password: String,
    #[serde(rename = "DATABASE", alias = "RDS_DATABASE")]
    pub database: String,
}

impl std::fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

impl DbCredentials {
    /// Read credentials from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        read_yaml(path.as_ref())
    }

    /// Connection options for `sqlx`; the password is never put in a URL.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

// =============================================================================
// Pipeline configuration
// =============================================================================

/// Stores REST API endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StoresApiConfig {
    /// Endpoint returning the number of stores.
    pub number_of_stores_url: String,
    /// Endpoint for one store; `{store_number}` is replaced per call.
    pub store_details_url: String,
    /// API key sent as `x-api-key`. Overridden by `ETL_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Attempts per request before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

/// Where each entity comes from.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_users_table")]
    pub users_table: String,
    #[serde(default = "default_orders_table")]
    pub orders_table: String,
    pub card_pdf: PathBuf,
    pub stores_api: StoresApiConfig,
    /// Local path or http(s) URL of the product CSV.
    pub products_file: String,
    /// Local path or http(s) URL of the date events JSON.
    pub date_events_file: String,
}

fn default_users_table() -> String {
    "legacy_users".to_string()
}

fn default_orders_table() -> String {
    "orders_table".to_string()
}

/// Where cleaned tables go.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputConfig {
    /// The warehouse database from `warehouse_credentials`.
    Postgres,
    /// One CSV file per table in a directory.
    Csv { directory: PathBuf },
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Credentials file of the source RDS database.
    #[serde(default)]
    pub source_credentials: Option<PathBuf>,
    /// Credentials file of the warehouse database.
    #[serde(default)]
    pub warehouse_credentials: Option<PathBuf>,
    pub sources: SourcesConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub cleaning: CleanOptions,
    #[serde(default = "default_tighten")]
    pub tighten_schema: bool,
}

fn default_tighten() -> bool {
    true
}

impl PipelineConfig {
    /// Load the YAML file, resolve relative credential paths against its
    /// directory and apply environment overrides (`.env` is read first).
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let _ = dotenvy::dotenv();

        let mut config: PipelineConfig = read_yaml(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for file in [&mut config.source_credentials, &mut config.warehouse_credentials]
            .into_iter()
            .flatten()
        {
            if file.is_relative() && !file.exists() {
                *file = base.join(&*file);
            }
        }

        if let Ok(key) = env::var(API_KEY_ENV) {
            config.sources.stores_api.api_key = Some(key);
        }
        Ok(config)
    }

    /// Credentials of the source database.
    pub fn source_db(&self) -> ConfigResult<DbCredentials> {
        let path = self
            .source_credentials
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("source_credentials".into()))?;
        DbCredentials::from_file(path)
    }

    /// Credentials of the warehouse database.
    pub fn warehouse_db(&self) -> ConfigResult<DbCredentials> {
        let path = self
            .warehouse_credentials
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("warehouse_credentials".into()))?;
        DbCredentials::from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::NullPolicy;
    use tempfile::tempdir;

    const PIPELINE_YAML: &str = r#"
source_credentials: db_creds.yaml
sources:
  card_pdf: data/card_details.pdf
  stores_api:
    number_of_stores_url: https://api.example.com/number_stores
    store_details_url: https://api.example.com/store_details/{store_number}
    api_key: from-file
    max_retries: 5
  products_file: data/products.csv
  date_events_file: data/date_details.json
output:
  kind: csv
  directory: out
cleaning:
  residual_nulls: retain
"#;

    #[test]
    fn test_credentials_accept_rds_prefix() {
        let creds: DbCredentials = serde_yaml::from_str(
            "RDS_HOST: db.example.com\nRDS_PASSWORD: p@ss:word\nRDS_USER: etl\nRDS_DATABASE: sales\nRDS_PORT: 6543\n",
        )
        .unwrap();
        assert_eq!(creds.host, "db.example.com");
        assert_eq!(creds.port, 6543);
        assert_eq!(creds.password, "p@ss:word");

        let creds: DbCredentials =
            serde_yaml::from_str("HOST: localhost\nPASSWORD: x\nUSER: postgres\nDATABASE: sales_data\n")
                .unwrap();
        assert_eq!(creds.port, 5432);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds: DbCredentials =
            serde_yaml::from_str("HOST: h\nPASSWORD: secret\nUSER: u\nDATABASE: d\n").unwrap();
        assert!(!format!("{:?}", creds).contains("secret"));
    }

    #[test]
    fn test_pipeline_config_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        fs::write(&path, PIPELINE_YAML).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.sources.users_table, "legacy_users");
        assert_eq!(config.sources.orders_table, "orders_table");
        assert_eq!(config.sources.stores_api.max_retries, 5);
        assert_eq!(
            config.output,
            OutputConfig::Csv {
                directory: PathBuf::from("out")
            }
        );
        assert_eq!(config.cleaning.residual_nulls, NullPolicy::Retain);
        assert!(config.tighten_schema);
        assert_eq!(
            config.source_credentials,
            Some(dir.path().join("db_creds.yaml"))
        );
        assert!(config.warehouse_credentials.is_none());
        assert!(matches!(
            config.warehouse_db(),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_stores_api_retries_default() {
        let api: StoresApiConfig = serde_yaml::from_str(
            "number_of_stores_url: http://localhost/n\nstore_details_url: http://localhost/d\n",
        )
        .unwrap();
        assert_eq!(api.max_retries, DEFAULT_MAX_RETRIES);
        assert!(api.api_key.is_none());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = PipelineConfig::load("/nonexistent/pipeline.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
