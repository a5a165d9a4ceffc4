//! Cleaner for sale date events.

use super::primitives::{compose_datetime, parse_timestamp, zero_pad};
use super::{dedup_key, enforce_null_policy, map_text, require, CleanOptions, CleanReport, Cleaned};
use crate::error::CleanResult;
use crate::models::Entity;
use crate::table::{Cell, Column, ColumnKind, Table};

/// Column order of the cleaned table.
pub const COLUMN_ORDER: [&str; 7] = [
    "date_uuid",
    "datetime",
    "year",
    "month",
    "day",
    "timestamp",
    "time_period",
];

/// Clean raw date events.
///
/// Rows whose `timestamp` is not `HH:MM:SS` are dropped first; the remaining
/// rows get a `datetime` built from `year`, `month`, `day` and `timestamp`.
pub fn clean_date_times(raw: &Table, options: &CleanOptions) -> CleanResult<Cleaned> {
    let entity = Entity::DateTime;
    let mut table = raw.clone();
    let mut report = CleanReport::new(entity, table.len());

    for column in COLUMN_ORDER.iter().filter(|c| **c != "datetime") {
        require(&table, entity, column)?;
    }
    let timestamp = require(&table, entity, "timestamp")?;
    let year = require(&table, entity, "year")?;
    let month = require(&table, entity, "month")?;
    let day = require(&table, entity, "day")?;

    let dropped = table.retain_rows(|row| {
        row[timestamp]
            .as_str()
            .and_then(parse_timestamp)
            .is_some()
    });
    report.record("invalid timestamp", dropped);

    map_text(&mut table, month, |s| Cell::Text(zero_pad(s)));
    map_text(&mut table, day, |s| Cell::Text(zero_pad(s)));

    let composed = table
        .rows()
        .iter()
        .map(|row| {
            match (
                row[year].as_str(),
                row[month].as_str(),
                row[day].as_str(),
                row[timestamp].as_str(),
            ) {
                (Some(y), Some(m), Some(d), Some(t)) => compose_datetime(y, m, d, t)
                    .map(Cell::Timestamp)
                    .unwrap_or(Cell::Null),
                _ => Cell::Null,
            }
        })
        .collect();
    table.push_column(Column::new("datetime", ColumnKind::Timestamp), composed)?;
    let datetime = require(&table, entity, "datetime")?;
    enforce_null_policy(&mut table, &[datetime], options, &mut report, "invalid datetime");

    let uuid = require(&table, entity, "date_uuid")?;
    dedup_key(&mut table, uuid, &mut report, "duplicate date_uuid");
    table.select(&COLUMN_ORDER)?;

    Ok(Cleaned { table, report })
}
