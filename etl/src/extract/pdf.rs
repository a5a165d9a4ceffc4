//! Table extraction from PDF text.
//!
//! `pdf-extract` gives the text of every page; tables are recovered line by
//! line:
//!
//! ```text
//! page text ──▶ lines ──▶ find header ──▶ split on tab / 2+ spaces ──▶ Table
//! ```
//!
//! Tables that span pages repeat their header; those repeats are skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ExtractError, ExtractResult};
use crate::table::{Cell, Table};

/// Header of the card details document.
pub const CARD_COLUMNS: [&str; 4] = [
    "card_number",
    "expiry_date",
    "card_provider",
    "date_payment_confirmed",
];

/// Field separator: a tab or a run of two or more spaces.
static FIELD_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\t+|\s{2,}").expect("Invalid separator regex"));

fn split_fields(line: &str) -> Vec<&str> {
    FIELD_SEPARATOR
        .split(line.trim())
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

fn is_header(fields: &[&str], columns: &[String]) -> bool {
    fields.len() == columns.len()
        && fields
            .iter()
            .zip(columns)
            .all(|(f, c)| f.eq_ignore_ascii_case(c))
}

/// Recover a table from extracted text.
///
/// Lines before the first header line are ignored. Data lines with a field
/// count other than the header's are padded or truncated. Fails when no
/// header line is found.
pub fn parse_text_table(text: &str, columns: &[String]) -> ExtractResult<Table> {
    let mut table = Table::new(columns.iter().cloned());
    let mut in_table = false;
    let mut ragged = 0usize;

    for line in text.lines() {
        let fields = split_fields(line);
        if fields.is_empty() {
            continue;
        }
        if is_header(&fields, columns) {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }
        if fields.len() != columns.len() {
            ragged += 1;
        }
        table.push_row(fields.into_iter().map(Cell::text).collect());
    }

    if !in_table {
        return Err(ExtractError::Empty(format!(
            "no header line matching [{}]",
            columns.join(", ")
        )));
    }
    if ragged > 0 {
        debug!(ragged, "pdf lines with unexpected field count");
    }
    Ok(table)
}

/// Extract a table from every page of a PDF document.
pub async fn read_pdf_table(path: &Path, columns: &[String]) -> ExtractResult<Table> {
    let owned: PathBuf = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
        .await
        .map_err(|e| ExtractError::Pdf(format!("extraction task failed: {}", e)))?
        .map_err(|e| ExtractError::Pdf(format!("{}: {}", path.display(), e)))?;

    let table = parse_text_table(&text, columns)?;
    info!(path = %path.display(), rows = table.len(), "read pdf table");
    Ok(table)
}
