//! Cleaner for card details extracted from the PDF export.

use super::primitives::{fix_expiry_typo, is_all_digits, parse_and_coerce_date, strip_card_number};
use super::{dedup_key, enforce_null_policy, map_text, require, CleanOptions, CleanReport, Cleaned};
use crate::error::CleanResult;
use crate::models::Entity;
use crate::table::{Cell, ColumnKind, Table};

/// Literal strings the card export uses for missing values.
const NULL_SENTINELS: [&str; 2] = ["NULL", "NaN"];

fn is_missing(cell: &Cell) -> bool {
    match cell {
        Cell::Null => true,
        Cell::Text(s) => NULL_SENTINELS.contains(&s.trim()),
        _ => false,
    }
}

/// Clean raw card records.
///
/// `?` stripping has to run before the all-digit filter, which is what
/// rejects the corrupted card numbers.
pub fn clean_cards(raw: &Table, options: &CleanOptions) -> CleanResult<Cleaned> {
    let entity = Entity::Card;
    let mut table = raw.clone();
    let mut report = CleanReport::new(entity, table.len());

    let number = require(&table, entity, "card_number")?;
    let expiry = require(&table, entity, "expiry_date")?;
    let confirmed = require(&table, entity, "date_payment_confirmed")?;

    let dropped = table.retain_rows(|row| !row.iter().any(is_missing));
    report.record("null values", dropped);

    map_text(&mut table, number, |s| Cell::Text(strip_card_number(s)));
    let dropped = table.retain_rows(|row| row[number].as_str().is_some_and(is_all_digits));
    report.record("non-digit card_number", dropped);

    map_text(&mut table, expiry, |s| Cell::Text(fix_expiry_typo(s)));

    map_text(&mut table, confirmed, |s| {
        parse_and_coerce_date(s).map(Cell::Date).unwrap_or(Cell::Null)
    });
    table.set_kind(confirmed, ColumnKind::Date);
    enforce_null_policy(
        &mut table,
        &[confirmed],
        options,
        &mut report,
        "invalid date_payment_confirmed",
    );

    dedup_key(&mut table, number, &mut report, "duplicate card_number");
    table.move_to_front("card_number")?;

    Ok(Cleaned { table, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::NullPolicy;
    use chrono::NaiveDate;

    fn raw(rows: &[[&str; 4]]) -> Table {
        let mut table = Table::new([
            "card_number",
            "expiry_date",
            "card_provider",
            "date_payment_confirmed",
        ]);
        for row in rows {
            table.push_row(row.iter().map(|v| Cell::text(*v)).collect());
        }
        table
    }

    #[test]
    fn test_question_marks_stripped() {
        let table = raw(&[["???4971858637664481", "09/26", "VISA 16 digit", "2015-11-25"]]);
        let cleaned = clean_cards(&table, &CleanOptions::default()).unwrap();
        assert_eq!(
            cleaned.table.get(0, "card_number"),
            Some(&Cell::text("4971858637664481"))
        );
    }

    #[test]
    fn test_non_digit_card_dropped() {
        let table = raw(&[
            ["NB71VBAHJE", "09/26", "VISA 16 digit", "2015-11-25"],
            ["?4971?858637664481", "09/26", "VISA 16 digit", "2015-11-25"],
        ]);
        let cleaned = clean_cards(&table, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.len(), 1);
        assert_eq!(cleaned.report.dropped_by("non-digit card_number"), 1);
    }

    #[test]
    fn test_sentinel_strings_dropped() {
        let table = raw(&[
            ["NULL", "NULL", "NULL", "NULL"],
            ["4971858637664481", "09/26", "NaN", "2015-11-25"],
            ["4971858637664482", "09/26", "Maestro", "2015-11-25"],
        ]);
        let cleaned = clean_cards(&table, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.len(), 1);
        assert_eq!(cleaned.report.dropped_by("null values"), 2);
    }

    #[test]
    fn test_expiry_typo_and_payment_date() {
        let table = raw(&[["30060773296197", "09/32", "Diners Club / Carte Blanche", "2000 January 21"]]);
        let cleaned = clean_cards(&table, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.get(0, "expiry_date"), Some(&Cell::text("09/01")));
        assert_eq!(
            cleaned.table.get(0, "date_payment_confirmed"),
            Some(&Cell::Date(NaiveDate::from_ymd_opt(2000, 1, 21).unwrap()))
        );
        assert_eq!(cleaned.table.columns()[3].kind, ColumnKind::Date);
    }

    #[test]
    fn test_bad_payment_date_retained_as_null() {
        let table = raw(&[["4971858637664481", "09/26", "VISA 16 digit", "2015/13/45"]]);
        let retain = CleanOptions {
            residual_nulls: NullPolicy::Retain,
        };
        let cleaned = clean_cards(&table, &retain).unwrap();
        assert_eq!(cleaned.table.len(), 1);
        assert_eq!(cleaned.table.get(0, "date_payment_confirmed"), Some(&Cell::Null));

        let cleaned = clean_cards(&table, &CleanOptions::default()).unwrap();
        assert!(cleaned.table.is_empty());
    }

    #[test]
    fn test_duplicate_cards_keep_first() {
        let table = raw(&[
            ["4971858637664481", "09/26", "VISA 16 digit", "2015-11-25"],
            ["?4971858637664481", "10/27", "VISA 16 digit", "2016-11-25"],
        ]);
        let cleaned = clean_cards(&table, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.len(), 1);
        assert_eq!(cleaned.table.get(0, "expiry_date"), Some(&Cell::text("09/26")));
    }
}
