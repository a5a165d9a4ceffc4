//! Error types for the retail ETL pipeline.
//!
//! One enum per concern, wrapped by [`PipelineError`] at the top:
//!
//! - [`TableError`] - tabular dataset contract errors
//! - [`CleanError`] - cleaner precondition errors
//! - [`ExtractError`] - source connectivity and shape errors
//! - [`LoadError`] - destination write errors
//! - [`SchemaError`] - schema tightening errors
//! - [`ConfigError`] - configuration loading errors
//!
//! Value-level and row-level defects in the data are never errors: they
//! degrade to [`crate::table::Cell::Null`] or drop the row. Only contract
//! violations surface here, and `From` conversions let `?` cross every
//! boundary.

use thiserror::Error;

// =============================================================================
// Table Errors
// =============================================================================

/// Errors raised by [`crate::table::Table`] operations.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    /// A named column does not exist.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A column with the same name already exists.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// A column's values do not match the row count.
    #[error("Column '{column}' has {actual} values, table has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

// =============================================================================
// Cleaning Errors
// =============================================================================

/// Errors from the per-entity cleaners.
///
/// A cleaner only fails when the raw dataset breaks its contract (for example
/// a required column is absent). Bad values never reach this type.
#[derive(Debug, Error, PartialEq)]
pub enum CleanError {
    /// The raw dataset is missing a column the cleaner relies on.
    #[error("{entity} data is missing required column '{column}'")]
    MissingColumn { entity: String, column: String },

    /// Any other table contract violation.
    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

// =============================================================================
// Extraction Errors
// =============================================================================

/// Errors from the extraction collaborators.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The caller asked for something the extractor cannot serve
    /// (unknown table, unconfigured source, mismatched response shape).
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Database error while reading a source table.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to read a local file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding failed.
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    /// JSON decoding failed.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// PDF text extraction failed.
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    /// The source contained no usable rows or headers.
    #[error("Source '{0}' is empty")]
    Empty(String),
}

// =============================================================================
// Load Errors
// =============================================================================

/// Errors from the load collaborators.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Database error while writing.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to write a file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The dataset cannot be stored as given.
    #[error("Cannot store '{destination}': {message}")]
    Rejected { destination: String, message: String },
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors from the schema tightener.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Database error while altering a table.
    #[error("Failed to alter {table}: {source}")]
    Alter {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// A width query returned no value (empty table).
    #[error("No rows in {table}, cannot size column '{column}'")]
    EmptyColumn { table: String, column: String },

    /// Database error outside a specific table.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file.
    #[error("Cannot read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the YAML.
    #[error("Invalid config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting is absent.
    #[error("Missing setting: {0}")]
    Missing(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level orchestration errors.
///
/// This is the error type returned by [`crate::pipeline::Pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Extraction error.
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Cleaning error.
    #[error("Clean error: {0}")]
    Clean(#[from] CleanError),

    /// Load error.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Schema tightening error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Connecting to a database failed.
    #[error("Connection error: {0}")]
    Connect(#[from] sqlx::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for cleaners.
pub type CleanResult<T> = Result<T, CleanError>;

/// Result type for extraction.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Result type for loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for schema tightening.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for pipeline runs.
pub type PipelineResult<T> = Result<T, PipelineError>;
