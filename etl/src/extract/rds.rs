//! Reader for the source PostgreSQL database.
//!
//! Rows are fetched as `row_to_json` text so every value keeps its raw
//! representation regardless of the column's SQL type.

use serde_json::Value;
use sqlx::PgPool;
use tracing::info;

use crate::error::{ExtractError, ExtractResult};
use crate::load::quote_ident;
use crate::table::{Cell, Table};

/// Table reader over a pool of source connections.
#[derive(Clone)]
pub struct RdsReader {
    pool: PgPool,
}

impl RdsReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Tables of the `public` schema, sorted by name.
    pub async fn list_tables(&self) -> ExtractResult<Vec<String>> {
        let tables = sqlx::query_scalar::<_, String>(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = 'public' ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    /// Read a whole table. An unknown table name is a precondition error.
    pub async fn read_table(&self, table: &str) -> ExtractResult<Table> {
        let columns = sqlx::query_scalar::<_, String>(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        if columns.is_empty() {
            let known = self.list_tables().await?;
            return Err(ExtractError::Precondition(format!(
                "unknown table '{}' (available: {})",
                table,
                known.join(", ")
            )));
        }

        let sql = format!("SELECT row_to_json(t)::text FROM {} t", quote_ident(table));
        let rows = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let table_data = rows_to_table(columns, &rows)?;
        info!(table, rows = table_data.len(), "read source table");
        Ok(table_data)
    }
}

/// Build a raw table from `row_to_json` documents, in `columns` order.
pub fn rows_to_table(columns: Vec<String>, rows: &[String]) -> ExtractResult<Table> {
    let mut table = Table::new(columns);
    let names: Vec<String> = table.column_names().into_iter().map(String::from).collect();
    for row in rows {
        let value: Value = serde_json::from_str(row)?;
        let cells = names
            .iter()
            .map(|name| value.get(name).map(Cell::from_json).unwrap_or(Cell::Null))
            .collect();
        table.push_row(cells);
    }
    Ok(table)
}
