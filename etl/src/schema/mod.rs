//! Schema tightening of the loaded warehouse.
//!
//! Loaded tables use wide types (`TEXT`, `BIGINT`, `DOUBLE PRECISION`).
//! Once every table is in place, each one is narrowed with a single
//! `ALTER TABLE`, sized from the data, and the fact table is wired to the
//! dimensions:
//!
//! ```text
//! for table: SELECT max(char_length(..)) ──▶ ALTER TABLE .. ALTER COLUMN .. TYPE ..
//! then:      orders_table ──FK──▶ dim_card_details, dim_date_times, dim_products,
//!                                 dim_store_details, dim_users
//! ```
//!
//! The DDL text comes from pure functions so it can be checked without a
//! database.

use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{SchemaError, SchemaResult};
use crate::load::quote_ident;

/// Target type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnChange {
    /// `UUID`, cast from text.
    Uuid,
    /// `VARCHAR(n)` with `n` the longest value in the column.
    VarcharMax,
    /// `VARCHAR(n)` with a fixed width.
    Varchar(u32),
    SmallInt,
    Float,
    Date,
    Boolean,
    DropNotNull,
}

/// All changes applied to one table.
#[derive(Debug, Clone, Copy)]
pub struct TableChanges {
    pub table: &'static str,
    pub columns: &'static [(&'static str, ColumnChange)],
}

impl TableChanges {
    /// Columns whose width is measured before altering.
    pub fn measured_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|(_, change)| *change == ColumnChange::VarcharMax)
            .map(|(column, _)| *column)
            .collect()
    }
}

use ColumnChange::*;

/// Changes per table, in the order they are applied.
pub static TABLE_CHANGES: [TableChanges; 6] = [
    TableChanges {
        table: "orders_table",
        columns: &[
            ("date_uuid", Uuid),
            ("user_uuid", Uuid),
            ("card_number", VarcharMax),
            ("store_code", VarcharMax),
            ("product_code", VarcharMax),
            ("product_quantity", SmallInt),
        ],
    },
    TableChanges {
        table: "dim_date_times",
        columns: &[
            ("month", VarcharMax),
            ("year", VarcharMax),
            ("day", VarcharMax),
            ("time_period", VarcharMax),
            ("date_uuid", Uuid),
        ],
    },
    TableChanges {
        table: "dim_card_details",
        columns: &[
            ("card_number", VarcharMax),
            ("expiry_date", VarcharMax),
            ("date_payment_confirmed", Date),
        ],
    },
    TableChanges {
        table: "dim_products",
        columns: &[
            ("product_price", Float),
            ("weight", Float),
            ("EAN", VarcharMax),
            ("product_code", VarcharMax),
            ("date_added", Date),
            ("uuid", Uuid),
            ("still_available", Boolean),
            ("weight_class", VarcharMax),
        ],
    },
    TableChanges {
        table: "dim_store_details",
        columns: &[
            ("longitude", Float),
            ("locality", Varchar(255)),
            ("store_code", VarcharMax),
            ("staff_numbers", SmallInt),
            ("opening_date", Date),
            ("store_type", Varchar(255)),
            ("store_type", DropNotNull),
            ("latitude", Float),
            ("country_code", VarcharMax),
            ("continent", Varchar(255)),
        ],
    },
    TableChanges {
        table: "dim_users",
        columns: &[
            ("first_name", Varchar(255)),
            ("last_name", Varchar(255)),
            ("date_of_birth", Date),
            ("country_code", VarcharMax),
            ("user_uuid", Uuid),
            ("join_date", Date),
        ],
    },
];

/// The fact table every foreign key hangs off.
pub const FACT_TABLE: &str = "orders_table";

/// `(dimension table, shared key column)` pairs wired to the fact table.
pub const FOREIGN_KEYS: [(&str, &str); 5] = [
    ("dim_card_details", "card_number"),
    ("dim_date_times", "date_uuid"),
    ("dim_products", "product_code"),
    ("dim_store_details", "store_code"),
    ("dim_users", "user_uuid"),
];

/// `SELECT max(char_length(..)), ..` over the measured columns.
pub fn max_length_sql(table: &str, columns: &[&str]) -> String {
    let measures: Vec<String> = columns
        .iter()
        .map(|c| format!("max(char_length({}::text))", quote_ident(c)))
        .collect();
    format!("SELECT {} FROM {}", measures.join(", "), quote_ident(table))
}

fn alter_clause(column: &str, change: ColumnChange, lengths: &HashMap<&str, i32>) -> Option<String> {
    let col = quote_ident(column);
    let clause = match change {
        Uuid => format!("ALTER COLUMN {c} TYPE UUID USING {c}::uuid", c = col),
        VarcharMax => format!("ALTER COLUMN {} TYPE VARCHAR({})", col, lengths.get(column)?),
        Varchar(n) => format!("ALTER COLUMN {} TYPE VARCHAR({})", col, n),
        SmallInt => format!("ALTER COLUMN {c} TYPE SMALLINT USING {c}::smallint", c = col),
        Float => format!("ALTER COLUMN {} TYPE FLOAT", col),
        Date => format!("ALTER COLUMN {c} TYPE DATE USING {c}::date", c = col),
        Boolean => format!("ALTER COLUMN {c} TYPE BOOLEAN USING {c}::boolean", c = col),
        DropNotNull => format!("ALTER COLUMN {} DROP NOT NULL", col),
    };
    Some(clause)
}

/// The single `ALTER TABLE` for `changes`. Every measured column needs a
/// length in `lengths`.
pub fn alter_table_sql(changes: &TableChanges, lengths: &HashMap<&str, i32>) -> SchemaResult<String> {
    let clauses = changes
        .columns
        .iter()
        .map(|(column, change)| {
            alter_clause(column, *change, lengths).ok_or_else(|| SchemaError::EmptyColumn {
                table: changes.table.to_string(),
                column: column.to_string(),
            })
        })
        .collect::<SchemaResult<Vec<String>>>()?;
    Ok(format!(
        "ALTER TABLE {} {}",
        quote_ident(changes.table),
        clauses.join(", ")
    ))
}

/// Name of the constraint from the fact table to `dimension`.
pub fn constraint_name(dimension: &str) -> String {
    format!("fk_{}_{}", FACT_TABLE, dimension)
}

/// `ALTER TABLE .. ADD CONSTRAINT .. FOREIGN KEY ..` for one dimension.
pub fn foreign_key_sql(dimension: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_ident(FACT_TABLE),
        quote_ident(&constraint_name(dimension)),
        quote_ident(column),
        quote_ident(dimension),
        quote_ident(column)
    )
}

/// What the tightener did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TightenSummary {
    pub altered: Vec<String>,
    /// Tables left untouched, with the reason.
    pub failed_tables: Vec<(String, String)>,
    pub foreign_keys: Vec<String>,
    /// Constraints that could not be added, with the database message.
    pub failed_foreign_keys: Vec<(String, String)>,
}

impl TightenSummary {
    /// Record the outcome of narrowing `table`. A failure is logged and
    /// kept, so the remaining tables are still processed.
    pub fn record_table(&mut self, table: &str, outcome: SchemaResult<()>) {
        match outcome {
            Ok(()) => self.altered.push(table.to_string()),
            Err(e) => {
                warn!(table, error = %e, "table left untightened");
                self.failed_tables.push((table.to_string(), e.to_string()));
            }
        }
    }
}

/// Narrows column types and adds foreign keys on the warehouse.
#[derive(Clone)]
pub struct SchemaTightener {
    pool: PgPool,
}

impl SchemaTightener {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Longest value of each measured column.
    async fn max_lengths(&self, changes: &TableChanges) -> SchemaResult<HashMap<&'static str, i32>> {
        let columns = changes.measured_columns();
        let mut lengths = HashMap::new();
        if columns.is_empty() {
            return Ok(lengths);
        }
        let row = sqlx::query(&max_length_sql(changes.table, &columns))
            .fetch_one(&self.pool)
            .await?;
        for (i, column) in columns.into_iter().enumerate() {
            if let Some(len) = row.try_get::<Option<i32>, _>(i)? {
                lengths.insert(column, len);
            }
        }
        Ok(lengths)
    }

    /// Narrow one table.
    pub async fn tighten_table(&self, changes: &TableChanges) -> SchemaResult<()> {
        let lengths = self.max_lengths(changes).await?;
        let sql = alter_table_sql(changes, &lengths)?;
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|source| SchemaError::Alter {
                table: changes.table.to_string(),
                source,
            })?;
        info!(table = changes.table, columns = changes.columns.len(), "tightened table");
        Ok(())
    }

    /// Add the fact-to-dimension constraints. A constraint the data
    /// violates (an order pointing at a dropped dimension row) is logged
    /// and reported, the others are still added.
    pub async fn add_foreign_keys(&self, summary: &mut TightenSummary) -> SchemaResult<()> {
        for (dimension, column) in FOREIGN_KEYS {
            let name = constraint_name(dimension);
            let drop = format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
                quote_ident(FACT_TABLE),
                quote_ident(&name)
            );
            sqlx::query(&drop).execute(&self.pool).await?;

            match sqlx::query(&foreign_key_sql(dimension, column))
                .execute(&self.pool)
                .await
            {
                Ok(_) => {
                    info!(constraint = %name, "added foreign key");
                    summary.foreign_keys.push(name);
                }
                Err(sqlx::Error::Database(e)) => {
                    warn!(constraint = %name, error = %e, "foreign key rejected");
                    summary.failed_foreign_keys.push((name, e.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Narrow every table, then add the foreign keys. A table that cannot
    /// be narrowed is reported in the summary and skipped.
    pub async fn tighten_all(&self) -> SchemaResult<TightenSummary> {
        let mut summary = TightenSummary::default();
        for changes in &TABLE_CHANGES {
            let outcome = self.tighten_table(changes).await;
            summary.record_table(changes.table, outcome);
        }
        self.add_foreign_keys(&mut summary).await?;
        Ok(summary)
    }
}
