//! Loading cleaned tables into their destination.
//!
//! - [`PgLoader`] - the warehouse database; each load replaces the table
//! - [`CsvLoader`] - one CSV file per table, for offline runs
//!
//! The warehouse table is rebuilt inside one transaction:
//!
//! ```text
//! BEGIN ──▶ DROP TABLE .. CASCADE ──▶ CREATE TABLE (pk = first column) ──▶ INSERT chunks ──▶ COMMIT
//! ```

use sqlx::query_builder::Separated;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{debug, info};

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{LoadError, LoadResult};
use crate::table::{Cell, ColumnKind, Table};

/// Postgres limit on bind parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// Outcome of one load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub destination: String,
    pub rows: usize,
    pub columns: usize,
    /// Where the rows went (`postgres` or a file path).
    pub target: String,
}

/// A destination for cleaned tables.
#[allow(async_fn_in_trait)]
pub trait Loader {
    /// Replace `destination` with the rows of `table`.
    async fn store(&self, table: &Table, destination: &str) -> LoadResult<LoadSummary>;
}

/// Quote an SQL identifier. Embedded quotes are doubled.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Postgres column type for a column kind.
pub fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Text => "TEXT",
        ColumnKind::Int => "BIGINT",
        ColumnKind::Float => "DOUBLE PRECISION",
        ColumnKind::Bool => "BOOLEAN",
        ColumnKind::Date => "DATE",
        ColumnKind::Timestamp => "TIMESTAMP",
    }
}

fn check_destination(table: &Table, destination: &str) -> LoadResult<()> {
    if destination.trim().is_empty() {
        return Err(LoadError::Rejected {
            destination: destination.to_string(),
            message: "destination name is empty".into(),
        });
    }
    if table.columns().is_empty() {
        return Err(LoadError::Rejected {
            destination: destination.to_string(),
            message: "table has no columns".into(),
        });
    }
    Ok(())
}

/// The first column becomes the primary key, so it must be non-null and
/// unique.
pub fn check_primary_key(table: &Table, destination: &str) -> LoadResult<()> {
    check_destination(table, destination)?;
    let key = &table.columns()[0].name;
    let mut seen = HashSet::new();
    for (row, cell) in table.column_values(0).enumerate() {
        if cell.is_null() {
            return Err(LoadError::Rejected {
                destination: destination.to_string(),
                message: format!("primary key '{}' is null in row {}", key, row),
            });
        }
        if !seen.insert(cell.to_string()) {
            return Err(LoadError::Rejected {
                destination: destination.to_string(),
                message: format!("primary key '{}' repeats value '{}'", key, cell),
            });
        }
    }
    Ok(())
}

/// `CREATE TABLE` statement for `table`, keyed on its first column.
pub fn create_table_sql(table: &Table, destination: &str) -> String {
    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), sql_type(c.kind)))
        .collect();
    let key = table
        .columns()
        .first()
        .map(|c| format!(", PRIMARY KEY ({})", quote_ident(&c.name)))
        .unwrap_or_default();
    format!(
        "CREATE TABLE {} ({}{})",
        quote_ident(destination),
        columns.join(", "),
        key
    )
}

/// `INSERT INTO .. (cols) ` prefix; `VALUES` is appended per chunk.
pub fn insert_prefix(table: &Table, destination: &str) -> String {
    let columns: Vec<String> = table.columns().iter().map(|c| quote_ident(&c.name)).collect();
    format!(
        "INSERT INTO {} ({}) ",
        quote_ident(destination),
        columns.join(", ")
    )
}

/// Rows per `INSERT` so one statement stays under the bind limit.
pub fn rows_per_chunk(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).max(1)
}

/// Bind one cell with the Rust type of its column, so nulls are typed too.
fn bind_cell(b: &mut Separated<'_, '_, Postgres, &'static str>, cell: &Cell, kind: ColumnKind) {
    match kind {
        ColumnKind::Text => {
            b.push_bind((!cell.is_null()).then(|| cell.to_string()));
        }
        ColumnKind::Int => {
            let value = match cell {
                Cell::Int(i) => Some(*i),
                Cell::Text(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            b.push_bind(value);
        }
        ColumnKind::Float => {
            b.push_bind(cell.as_f64());
        }
        ColumnKind::Bool => {
            let value = match cell {
                Cell::Bool(v) => Some(*v),
                _ => None,
            };
            b.push_bind(value);
        }
        ColumnKind::Date => {
            let value: Option<NaiveDate> = match cell {
                Cell::Date(d) => Some(*d),
                _ => None,
            };
            b.push_bind(value);
        }
        ColumnKind::Timestamp => {
            let value: Option<NaiveDateTime> = match cell {
                Cell::Timestamp(t) => Some(*t),
                _ => None,
            };
            b.push_bind(value);
        }
    }
}

// =============================================================================
// Postgres
// =============================================================================

/// Loads tables into the warehouse database.
#[derive(Clone)]
pub struct PgLoader {
    pool: PgPool,
}

impl PgLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Loader for PgLoader {
    async fn store(&self, table: &Table, destination: &str) -> LoadResult<LoadSummary> {
        check_primary_key(table, destination)?;

        let mut tx = self.pool.begin().await?;
        let drop = format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(destination));
        sqlx::query(&drop).execute(&mut *tx).await?;
        sqlx::query(&create_table_sql(table, destination))
            .execute(&mut *tx)
            .await?;

        let prefix = insert_prefix(table, destination);
        let chunk_size = rows_per_chunk(table.columns().len());
        for (i, rows) in table.rows().chunks(chunk_size).enumerate() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(prefix.as_str());
            builder.push_values(rows, |mut b, row| {
                for (cell, column) in row.iter().zip(table.columns()) {
                    bind_cell(&mut b, cell, column.kind);
                }
            });
            builder.build().execute(&mut *tx).await?;
            debug!(destination, chunk = i, rows = rows.len(), "inserted chunk");
        }
        tx.commit().await?;

        info!(destination, rows = table.len(), "loaded table");
        Ok(LoadSummary {
            destination: destination.to_string(),
            rows: table.len(),
            columns: table.columns().len(),
            target: "postgres".to_string(),
        })
    }
}

// =============================================================================
// CSV
// =============================================================================

/// Writes each table to `<directory>/<destination>.csv`.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    directory: PathBuf,
}

impl CsvLoader {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path_for(&self, destination: &str) -> PathBuf {
        self.directory.join(format!("{}.csv", destination))
    }
}

impl Loader for CsvLoader {
    async fn store(&self, table: &Table, destination: &str) -> LoadResult<LoadSummary> {
        check_destination(table, destination)?;
        if destination.contains(['/', '\\']) {
            return Err(LoadError::Rejected {
                destination: destination.to_string(),
                message: "destination must be a plain table name".into(),
            });
        }

        fs::create_dir_all(&self.directory)?;
        let path = self.path_for(destination);
        table.write_csv(BufWriter::new(File::create(&path)?))?;

        info!(destination, rows = table.len(), path = %path.display(), "wrote table");
        Ok(LoadSummary {
            destination: destination.to_string(),
            rows: table.len(),
            columns: table.columns().len(),
            target: path.display().to_string(),
        })
    }
}
