//! Extraction: every source kind into a raw [`Table`].
//!
//! ```text
//! Source::Rds  ──▶ RdsReader        ─┐
//! Source::Pdf  ──▶ read_pdf_table   ─┤
//! Source::Api  ──▶ StoresApiClient  ─┼──▶ raw Table (all Text, nulls as Null)
//! Source::File ──▶ parser           ─┘
//! ```
//!
//! Extractors never clean: column names and raw string values are kept as
//! the source delivers them.

pub mod api;
pub mod pdf;
pub mod rds;

use std::path::PathBuf;
use tracing::info;

use crate::config::StoresApiConfig;
use crate::error::{ExtractError, ExtractResult};
use crate::parser::{parse_bytes, FileFormat};
use crate::table::Table;

pub use api::StoresApiClient;
pub use pdf::{parse_text_table, read_pdf_table, CARD_COLUMNS};
pub use rds::RdsReader;

/// Where a raw dataset comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A table of the source database.
    Rds { table: String },
    /// A table printed in a PDF document, located by its header.
    Pdf { path: PathBuf, columns: Vec<String> },
    /// The stores REST API configured on the extractor.
    Api,
    /// A CSV or JSON file: local path, http(s) URL or public `s3://` object.
    File { location: String },
}

impl Source {
    pub fn rds(table: impl Into<String>) -> Self {
        Source::Rds {
            table: table.into(),
        }
    }

    /// The card details PDF.
    pub fn card_pdf(path: impl Into<PathBuf>) -> Self {
        Source::Pdf {
            path: path.into(),
            columns: CARD_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn file(location: impl Into<String>) -> Self {
        Source::File {
            location: location.into(),
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Source::Rds { table } => format!("rds:{}", table),
            Source::Pdf { path, .. } => format!("pdf:{}", path.display()),
            Source::Api => "api:stores".to_string(),
            Source::File { location } => format!("file:{}", location),
        }
    }
}

/// HTTP URL to fetch `location` from, or `None` for a local path.
///
/// `s3://bucket/key` maps to the bucket's public HTTPS endpoint.
pub fn http_location(location: &str) -> Option<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Some(location.to_string());
    }
    let (bucket, key) = location.strip_prefix("s3://")?.split_once('/')?;
    Some(format!("https://{}.s3.amazonaws.com/{}", bucket, key))
}

/// Dispatches a [`Source`] to the matching reader.
///
/// Readers that need a connection are optional; asking for a source whose
/// reader was not configured is a precondition error.
#[derive(Clone, Default)]
pub struct DataExtractor {
    rds: Option<RdsReader>,
    stores_api: Option<StoresApiClient>,
    http: reqwest::Client,
}

impl DataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rds(mut self, reader: RdsReader) -> Self {
        self.rds = Some(reader);
        self
    }

    pub fn with_stores_api(mut self, config: &StoresApiConfig) -> Self {
        self.stores_api = Some(StoresApiClient::new(config));
        self
    }

    /// Fetch one raw dataset.
    pub async fn fetch(&self, source: &Source) -> ExtractResult<Table> {
        info!(source = %source.describe(), "extracting");
        let table = match source {
            Source::Rds { table } => {
                let reader = self.rds.as_ref().ok_or_else(|| {
                    ExtractError::Precondition(
                        "source database credentials are not configured".into(),
                    )
                })?;
                reader.read_table(table).await?
            }
            Source::Pdf { path, columns } => read_pdf_table(path, columns).await?,
            Source::Api => {
                let client = self.stores_api.as_ref().ok_or_else(|| {
                    ExtractError::Precondition("stores API is not configured".into())
                })?;
                client.fetch_stores().await?
            }
            Source::File { location } => self.read_file(location).await?,
        };
        info!(
            source = %source.describe(),
            rows = table.len(),
            columns = table.columns().len(),
            "extracted"
        );
        Ok(table)
    }

    async fn read_file(&self, location: &str) -> ExtractResult<Table> {
        let format = FileFormat::from_location(location).ok_or_else(|| {
            ExtractError::Precondition(format!("cannot tell the format of '{}'", location))
        })?;
        let bytes = if let Some(url) = http_location(location) {
            let response = self.http.get(&url).send().await?.error_for_status()?;
            response.bytes().await?.to_vec()
        } else {
            tokio::fs::read(location).await?
        };
        if bytes.is_empty() {
            return Err(ExtractError::Empty(location.to_string()));
        }
        Ok(parse_bytes(&bytes, format)?.table)
    }
}
