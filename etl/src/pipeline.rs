//! End-to-end run: extract, clean and load each entity, then tighten.
//!
//! ```text
//!            ┌──────────────┐     ┌─────────┐     ┌────────┐
//! Source ──▶ │ DataExtractor │ ──▶ │ cleaner │ ──▶ │ Loader │ ──▶ destination table
//!            └──────────────┘     └─────────┘     └────────┘
//!   users, cards, stores, products, orders, date times (in this order)
//!                              │
//!                              ▼
//!                     SchemaTightener (optional)
//! ```
//!
//! Entities run one at a time. A failed extraction or load stops the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_etl::{Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::load("config/pipeline.yaml")?;
//!     let summary = Pipeline::new(config).run().await?;
//!     for entity in &summary.entities {
//!         println!("{}", entity.report.summary());
//!     }
//!     Ok(())
//! }
//! ```

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use tracing::{info, warn};

use crate::clean::{clean, CleanOptions, CleanReport, Cleaned};
use crate::config::{DbCredentials, OutputConfig, PipelineConfig};
use crate::error::PipelineResult;
use crate::extract::{DataExtractor, RdsReader, Source};
use crate::load::{CsvLoader, LoadSummary, Loader, PgLoader};
use crate::models::Entity;
use crate::parser::parse_file;
use crate::schema::{SchemaTightener, TightenSummary};

/// Connections per pool; entities run one at a time.
const MAX_CONNECTIONS: u32 = 5;

/// Outcome of one entity.
#[derive(Debug, Clone)]
pub struct EntityRun {
    pub entity: Entity,
    pub source: String,
    pub report: CleanReport,
    pub load: LoadSummary,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub entities: Vec<EntityRun>,
    pub schema: Option<TightenSummary>,
}

impl RunSummary {
    pub fn rows_loaded(&self) -> usize {
        self.entities.iter().map(|e| e.load.rows).sum()
    }

    pub fn rows_dropped(&self) -> usize {
        self.entities.iter().map(|e| e.report.total_dropped()).sum()
    }
}

async fn connect(credentials: &DbCredentials) -> PipelineResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(credentials.connect_options())
        .await?;
    info!(host = %credentials.host, database = %credentials.database, "connected");
    Ok(pool)
}

/// The batch job.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    only: Vec<Entity>,
    tighten: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let tighten = config.tighten_schema;
        Self {
            config,
            only: Vec::new(),
            tighten,
        }
    }

    /// Restrict the run to these entities. Empty means all.
    pub fn only(mut self, entities: Vec<Entity>) -> Self {
        self.only = entities;
        self
    }

    /// Skip the schema tightening step.
    pub fn without_tightening(mut self) -> Self {
        self.tighten = false;
        self
    }

    /// Entities to run, in load order.
    pub fn selected(&self) -> Vec<Entity> {
        Entity::ALL
            .into_iter()
            .filter(|e| self.only.is_empty() || self.only.contains(e))
            .collect()
    }

    /// Where an entity's raw data comes from.
    pub fn source_for(&self, entity: Entity) -> Source {
        let sources = &self.config.sources;
        match entity {
            Entity::User => Source::rds(&sources.users_table),
            Entity::Card => Source::card_pdf(&sources.card_pdf),
            Entity::Store => Source::Api,
            Entity::Product => Source::file(&sources.products_file),
            Entity::Order => Source::rds(&sources.orders_table),
            Entity::DateTime => Source::file(&sources.date_events_file),
        }
    }

    /// Run the selected entities through `extractor` and `loader`, then
    /// `tightener` when given.
    pub async fn run_with<L: Loader>(
        &self,
        extractor: &DataExtractor,
        loader: &L,
        tightener: Option<&SchemaTightener>,
    ) -> PipelineResult<RunSummary> {
        let mut summary = RunSummary::default();
        for entity in self.selected() {
            let source = self.source_for(entity);
            let raw = extractor.fetch(&source).await?;
            let Cleaned { table, report } = clean(entity, &raw, &self.config.cleaning)?;
            let load = loader.store(&table, entity.destination()).await?;
            info!(entity = %entity, "{}", report.summary());
            summary.entities.push(EntityRun {
                entity,
                source: source.describe(),
                report,
                load,
            });
        }

        if let Some(tightener) = tightener {
            summary.schema = Some(tightener.tighten_all().await?);
        }
        info!(
            entities = summary.entities.len(),
            rows_loaded = summary.rows_loaded(),
            rows_dropped = summary.rows_dropped(),
            "run finished"
        );
        Ok(summary)
    }

    /// Open the connections the configuration asks for and run.
    pub async fn run(&self) -> PipelineResult<RunSummary> {
        let selected = self.selected();
        let mut extractor = DataExtractor::new();

        let source_pool = if selected.contains(&Entity::User) || selected.contains(&Entity::Order) {
            let pool = connect(&self.config.source_db()?).await?;
            extractor = extractor.with_rds(RdsReader::new(pool.clone()));
            Some(pool)
        } else {
            None
        };
        if selected.contains(&Entity::Store) {
            extractor = extractor.with_stores_api(&self.config.sources.stores_api);
        }

        let result = match &self.config.output {
            OutputConfig::Postgres => {
                let pool = connect(&self.config.warehouse_db()?).await?;
                let tightener = self.tighten.then(|| SchemaTightener::new(pool.clone()));
                let result = self
                    .run_with(&extractor, &PgLoader::new(pool.clone()), tightener.as_ref())
                    .await;
                pool.close().await;
                result
            }
            OutputConfig::Csv { directory } => {
                if self.tighten {
                    warn!("schema tightening needs a postgres output, skipping");
                }
                self.run_with(&extractor, &CsvLoader::new(directory), None)
                    .await
            }
        };

        if let Some(pool) = source_pool {
            pool.close().await;
        }
        result
    }
}

/// Run the schema step alone against the configured warehouse.
pub async fn tighten(config: &PipelineConfig) -> PipelineResult<TightenSummary> {
    let pool = connect(&config.warehouse_db()?).await?;
    let result = SchemaTightener::new(pool.clone()).tighten_all().await;
    pool.close().await;
    Ok(result?)
}

/// Clean a local CSV or JSON file as `entity`, without any connection.
pub fn clean_file(entity: Entity, path: &Path, options: &CleanOptions) -> PipelineResult<Cleaned> {
    let parsed = parse_file(path)?;
    Ok(clean(entity, &parsed.table, options)?)
}
