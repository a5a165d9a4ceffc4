//! Per-entity data cleaning.
//!
//! Each cleaner maps one raw [`Table`] to one normalized [`Table`] through a
//! fixed, ordered list of row filters and column transforms:
//!
//! ```text
//! raw Table ──▶ filter ──▶ transform ──▶ filter ──▶ ... ──▶ Cleaned { table, report }
//! ```
//!
//! - [`primitives`] - scalar parsers (dates, weights, prices, ...)
//! - [`users`], [`cards`], [`stores`], [`products`], [`orders`], [`date_times`]
//!
//! Bad values degrade to [`Cell::Null`]; rows breaking a structural rule are
//! dropped and counted in the [`CleanReport`]. A cleaner only returns an
//! error when the raw table lacks a column it needs.

pub mod cards;
pub mod date_times;
pub mod orders;
pub mod primitives;
pub mod products;
pub mod stores;
pub mod users;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CleanError, CleanResult};
use crate::models::Entity;
use crate::table::{Cell, Table};

/// What to do with nulls produced by a coercion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Drop the row, so cleaned tables hold no nulls.
    #[default]
    Drop,
    /// Keep the row with a null value.
    Retain,
}

/// Options shared by all cleaners.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Policy for nulls left behind by date/number coercion.
    #[serde(default)]
    pub residual_nulls: NullPolicy,
}

/// Rows removed by one cleaning step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRows {
    pub step: &'static str,
    pub count: usize,
}

/// Audit trail of one cleaner run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanReport {
    pub entity: Entity,
    pub rows_in: usize,
    pub rows_out: usize,
    pub drops: Vec<DroppedRows>,
}

impl CleanReport {
    pub fn new(entity: Entity, rows_in: usize) -> Self {
        Self {
            entity,
            rows_in,
            rows_out: rows_in,
            drops: Vec::new(),
        }
    }

    /// Record the outcome of a row filter.
    pub fn record(&mut self, step: &'static str, count: usize) {
        if count > 0 {
            info!(entity = %self.entity, step, dropped = count, "dropped rows");
        } else {
            debug!(entity = %self.entity, step, "no rows dropped");
        }
        self.rows_out = self.rows_out.saturating_sub(count);
        self.drops.push(DroppedRows { step, count });
    }

    pub fn total_dropped(&self) -> usize {
        self.drops.iter().map(|d| d.count).sum()
    }

    /// Rows dropped by one named step.
    pub fn dropped_by(&self, step: &str) -> usize {
        self.drops
            .iter()
            .filter(|d| d.step == step)
            .map(|d| d.count)
            .sum()
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} rows in, {} rows out, {} dropped",
            self.entity,
            self.rows_in,
            self.rows_out,
            self.total_dropped()
        )
    }
}

/// Output of a cleaner.
#[derive(Debug, Clone)]
pub struct Cleaned {
    pub table: Table,
    pub report: CleanReport,
}

/// Run the cleaner for `entity` on a raw table.
pub fn clean(entity: Entity, raw: &Table, options: &CleanOptions) -> CleanResult<Cleaned> {
    let cleaned = match entity {
        Entity::User => users::clean_users(raw, options),
        Entity::Card => cards::clean_cards(raw, options),
        Entity::Store => stores::clean_stores(raw, options),
        Entity::Product => products::clean_products(raw, options),
        Entity::Order => orders::clean_orders(raw),
        Entity::DateTime => date_times::clean_date_times(raw, options),
    }?;
    info!(
        entity = %entity,
        rows_in = cleaned.report.rows_in,
        rows_out = cleaned.report.rows_out,
        "cleaning finished"
    );
    Ok(cleaned)
}

// =============================================================================
// Helpers shared by the cleaners
// =============================================================================

/// Resolve a column the cleaner cannot work without.
pub(crate) fn require(table: &Table, entity: Entity, column: &str) -> CleanResult<usize> {
    table.column_index(column).ok_or_else(|| CleanError::MissingColumn {
        entity: entity.name().to_string(),
        column: column.to_string(),
    })
}

/// Apply a text transform to every text cell of a column. Non-text cells are
/// left alone.
pub(crate) fn map_text<F>(table: &mut Table, idx: usize, mut f: F)
where
    F: FnMut(&str) -> Cell,
{
    table.map_column(idx, |cell| match cell {
        Cell::Text(s) => f(s),
        other => other.clone(),
    });
}

/// Drop rows holding a null in any of `columns` when the policy says so.
pub(crate) fn enforce_null_policy(
    table: &mut Table,
    columns: &[usize],
    options: &CleanOptions,
    report: &mut CleanReport,
    step: &'static str,
) {
    match options.residual_nulls {
        NullPolicy::Drop => {
            let dropped = table.retain_rows(|row| columns.iter().all(|&i| !row[i].is_null()));
            report.record(step, dropped);
        }
        NullPolicy::Retain => {
            let nulls = table
                .rows()
                .iter()
                .filter(|row| columns.iter().any(|&i| row[i].is_null()))
                .count();
            if nulls > 0 {
                info!(entity = %report.entity, step, retained_nulls = nulls, "keeping rows with null values");
            }
        }
    }
}

/// Drop duplicate primary keys, keeping the first occurrence.
pub(crate) fn dedup_key(
    table: &mut Table,
    idx: usize,
    report: &mut CleanReport,
    step: &'static str,
) {
    let dropped = table.dedup_by(idx);
    report.record(step, dropped);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_tracks_drops() {
        let mut report = CleanReport::new(Entity::Card, 10);
        report.record("nulls", 3);
        report.record("digits", 0);
        report.record("nulls", 1);

        assert_eq!(report.rows_out, 6);
        assert_eq!(report.total_dropped(), 4);
        assert_eq!(report.dropped_by("nulls"), 4);
        assert_eq!(report.summary(), "card: 10 rows in, 6 rows out, 4 dropped");
    }

    #[test]
    fn test_null_policy_drop_and_retain() {
        let make = || {
            let mut t = Table::new(["a", "b"]);
            t.push_row(vec![Cell::text("1"), Cell::Null]);
            t.push_row(vec![Cell::text("2"), Cell::text("x")]);
            t
        };

        let mut table = make();
        let mut report = CleanReport::new(Entity::User, 2);
        enforce_null_policy(&mut table, &[1], &CleanOptions::default(), &mut report, "coerce");
        assert_eq!(table.len(), 1);
        assert_eq!(report.dropped_by("coerce"), 1);

        let mut table = make();
        let mut report = CleanReport::new(Entity::User, 2);
        let retain = CleanOptions {
            residual_nulls: NullPolicy::Retain,
        };
        enforce_null_policy(&mut table, &[1], &retain, &mut report, "coerce");
        assert_eq!(table.len(), 2);
        assert_eq!(report.total_dropped(), 0);
    }

    #[test]
    fn test_options_deserialize() {
        let opts: CleanOptions = serde_yaml::from_str("residual_nulls: retain").unwrap();
        assert_eq!(opts.residual_nulls, NullPolicy::Retain);
        let opts: CleanOptions = serde_yaml::from_str("{}").unwrap();
        assert_eq!(opts.residual_nulls, NullPolicy::Drop);
    }

    #[test]
    fn test_require_reports_entity() {
        let table = Table::new(["a"]);
        let err = require(&table, Entity::Store, "store_code").unwrap_err();
        assert_eq!(
            err,
            CleanError::MissingColumn {
                entity: "store".into(),
                column: "store_code".into()
            }
        );
    }
}
