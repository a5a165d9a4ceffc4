//! Cleaner for the orders fact table.
//!
//! Orders are normalized by construction: the cleaner only strips join
//! artefacts and gives the table a fresh row index to key on.

use super::{require, CleanReport, Cleaned};
use crate::error::CleanResult;
use crate::models::Entity;
use crate::table::{Cell, Column, ColumnKind, Table};

/// Columns left over from the source-side joins.
const ARTEFACT_COLUMNS: [&str; 5] = ["level_0", "index", "first_name", "last_name", "1"];

/// Column order of the cleaned table.
pub const COLUMN_ORDER: [&str; 7] = [
    "index",
    "date_uuid",
    "user_uuid",
    "card_number",
    "store_code",
    "product_code",
    "product_quantity",
];

/// Clean raw order records.
pub fn clean_orders(raw: &Table) -> CleanResult<Cleaned> {
    let entity = Entity::Order;
    let mut table = raw.clone();
    let mut report = CleanReport::new(entity, table.len());

    table.drop_columns(&ARTEFACT_COLUMNS);
    for column in &COLUMN_ORDER[1..] {
        require(&table, entity, column)?;
    }

    let quantity = require(&table, entity, "product_quantity")?;
    table.map_column(quantity, |cell| {
        cell.as_str()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(Cell::Int)
            .unwrap_or(Cell::Null)
    });
    table.set_kind(quantity, ColumnKind::Int);
    let dropped = table.retain_rows(|row| !row[quantity].is_null());
    report.record("non-integer product_quantity", dropped);

    let index = (0..table.len() as i64).map(Cell::Int).collect();
    table.insert_column(0, Column::new("index", ColumnKind::Int), index)?;
    table.select(&COLUMN_ORDER)?;

    Ok(Cleaned { table, report })
}
