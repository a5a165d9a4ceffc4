//! # Retail ETL - batch cleaning and loading of retail sales data
//!
//! Pulls the retail sources (a PostgreSQL database, a PDF export, a REST
//! API and flat files), cleans each entity and loads a star-schema
//! warehouse, then narrows the column types and adds the foreign keys.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Sources   │────▶│   Extract   │────▶│    Clean    │────▶│    Load     │
//! │ RDS/PDF/API │     │ (raw Table) │     │ (per entity)│     │ (warehouse) │
//! │    /file    │     └─────────────┘     └─────────────┘     └──────┬──────┘
//! └─────────────┘                                                    ▼
//!                                                            ┌─────────────┐
//!                                                            │   Schema    │
//!                                                            │ (types, FK) │
//!                                                            └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use retail_etl::{clean, CleanOptions, Entity, Table};
//! use serde_json::json;
//!
//! let raw = Table::from_records(&[json!({
//!     "card_number": "?4971858637664481",
//!     "expiry_date": "09/26",
//!     "card_provider": "VISA 16 digit",
//!     "date_payment_confirmed": "2015 November 25",
//! })]);
//! let cleaned = clean(Entity::Card, &raw, &CleanOptions::default()).unwrap();
//! assert_eq!(cleaned.table.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`table`] - In-memory tabular dataset
//! - [`models`] - Entities and weight classes
//! - [`clean`] - Parsing primitives and per-entity cleaners
//! - [`parser`] - CSV/JSON parsing with auto-detection
//! - [`validation`] - API response schema validation
//! - [`extract`] - Source readers
//! - [`load`] - Destination writers
//! - [`schema`] - Warehouse type narrowing and foreign keys
//! - [`config`] - YAML configuration
//! - [`pipeline`] - End-to-end run

// Core modules
pub mod error;
pub mod models;
pub mod table;

// Cleaning
pub mod clean;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Sources and destinations
pub mod extract;
pub mod load;
pub mod schema;

// Orchestration
pub mod config;
pub mod logging;
pub mod pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CleanError, ConfigError, ExtractError, LoadError, PipelineError, PipelineResult, SchemaError,
    TableError,
};

// =============================================================================
// Re-exports - Models and table
// =============================================================================

pub use models::{Entity, WeightClass};
pub use table::{Cell, Column, ColumnKind, Table};

// =============================================================================
// Re-exports - Cleaning
// =============================================================================

pub use clean::primitives::{convert_weight, parse_date};
pub use clean::{clean, CleanOptions, CleanReport, Cleaned, NullPolicy};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{detect_delimiter, detect_encoding, parse_file, FileFormat, ParseResult};

// =============================================================================
// Re-exports - Extract, load, schema
// =============================================================================

pub use extract::{DataExtractor, Source};
pub use load::{CsvLoader, LoadSummary, Loader, PgLoader};
pub use schema::{SchemaTightener, TightenSummary};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::{DbCredentials, OutputConfig, PipelineConfig};
pub use pipeline::{clean_file, Pipeline, RunSummary};
