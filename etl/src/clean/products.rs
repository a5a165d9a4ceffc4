//! Cleaner for the product catalogue file.

use super::primitives::{convert_weight, extract_price, is_corrupted_weight, parse_and_coerce_date};
use super::{dedup_key, enforce_null_policy, map_text, require, CleanOptions, CleanReport, Cleaned};
use crate::error::CleanResult;
use crate::models::{Entity, WeightClass};
use crate::table::{Cell, Column, ColumnKind, Table};

/// Values of `removed` meaning the product is still sold. The first is the
/// spelling used by the source export.
const STILL_AVAILABLE: [&str; 2] = ["Still_avaliable", "Still_available"];

/// Column order of the cleaned table.
pub const COLUMN_ORDER: [&str; 10] = [
    "product_code",
    "product_name",
    "product_price",
    "weight",
    "weight_class",
    "category",
    "EAN",
    "date_added",
    "uuid",
    "still_available",
];

/// Unnamed row-index columns written by spreadsheet exports.
fn is_index_column(name: &str) -> bool {
    name.is_empty() || name == "index" || name.starts_with("Unnamed")
}

/// Clean raw product records.
///
/// Weight runs first: corrupted weights are dropped before conversion, then
/// rows whose unit cannot be converted. `weight_class` is derived from the
/// converted kilograms.
pub fn clean_products(raw: &Table, options: &CleanOptions) -> CleanResult<Cleaned> {
    let entity = Entity::Product;
    let mut table = raw.clone();
    let mut report = CleanReport::new(entity, table.len());

    let index_columns: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|n| is_index_column(n))
        .map(String::from)
        .collect();
    let index_columns: Vec<&str> = index_columns.iter().map(String::as_str).collect();
    table.drop_columns(&index_columns);

    let weight = require(&table, entity, "weight")?;
    let price = require(&table, entity, "product_price")?;
    let added = require(&table, entity, "date_added")?;
    let removed = require(&table, entity, "removed")?;
    let code = require(&table, entity, "product_code")?;

    let dropped =
        table.retain_rows(|row| !row[weight].as_str().is_some_and(is_corrupted_weight));
    report.record("corrupted weight", dropped);

    map_text(&mut table, weight, |s| {
        convert_weight(s).map(Cell::Float).unwrap_or(Cell::Null)
    });
    table.set_kind(weight, ColumnKind::Float);
    let dropped = table.retain_rows(|row| !row[weight].is_null());
    report.record("unconvertible weight", dropped);

    let dropped = table.drop_rows_with_nulls();
    report.record("null values", dropped);

    map_text(&mut table, price, |s| {
        extract_price(s).map(Cell::Float).unwrap_or(Cell::Null)
    });
    table.set_kind(price, ColumnKind::Float);
    enforce_null_policy(&mut table, &[price], options, &mut report, "unparseable product_price");

    map_text(&mut table, added, |s| {
        parse_and_coerce_date(s).map(Cell::Date).unwrap_or(Cell::Null)
    });
    table.set_kind(added, ColumnKind::Date);
    enforce_null_policy(&mut table, &[added], options, &mut report, "invalid date_added");

    let classes = table
        .column_values(weight)
        .map(|cell| match cell.as_f64() {
            Some(kg) => Cell::text(WeightClass::from_kg(kg).as_str()),
            None => Cell::Null,
        })
        .collect();
    table.push_column(Column::text("weight_class"), classes)?;

    let available = table
        .column_values(removed)
        .map(|cell| Cell::Bool(cell.as_str().is_some_and(|s| STILL_AVAILABLE.contains(&s))))
        .collect();
    table.push_column(Column::new("still_available", ColumnKind::Bool), available)?;

    dedup_key(&mut table, code, &mut report, "duplicate product_code");
    table.select(&COLUMN_ORDER)?;

    Ok(Cleaned { table, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn product(code: &str, weight: &str, price: &str, removed: &str) -> Value {
        json!({
            "Unnamed: 0": "0",
            "product_name": "FurReal Dazzlin' Dimples My Playful Dolphin",
            "product_price": price,
            "weight": weight,
            "category": "toys-and-games",
            "EAN": "7425710935115",
            "date_added": "2005-12-02",
            "uuid": "83dc0a69-f96f-4c34-bcb7-928acae19a94",
            "removed": removed,
            "product_code": code,
        })
    }

    fn weight_of(cleaned: &Cleaned, row: usize) -> f64 {
        cleaned.table.get(row, "weight").and_then(Cell::as_f64).unwrap()
    }

    #[test]
    fn test_weights_in_kg() {
        let raw = Table::from_records(&[
            product("A1", "1.6kg", "£39.99", "Still_avaliable"),
            product("A2", "590g", "£9.99", "Still_avaliable"),
            product("A3", "16oz", "£9.99", "Still_avaliable"),
            product("A4", "12 x 100g", "£9.99", "Still_avaliable"),
        ]);
        let cleaned = clean_products(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.len(), 4);
        assert_eq!(weight_of(&cleaned, 0), 1.6);
        assert_eq!(weight_of(&cleaned, 1), 590.0 / 1000.0);
        assert_eq!(weight_of(&cleaned, 2), 16.0 * 0.0283495);
        assert_eq!(weight_of(&cleaned, 3), 1200.0 / 1000.0);
    }

    #[test]
    fn test_corrupted_and_unconvertible_weights_dropped() {
        let raw = Table::from_records(&[
            product("A1", "9GO7C7ZA7G", "£1.00", "Still_avaliable"),
            product("A2", "5lb", "£1.00", "Still_avaliable"),
            product("A3", "5kg", "£1.00", "Still_avaliable"),
        ]);
        let cleaned = clean_products(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.len(), 1);
        assert_eq!(cleaned.report.dropped_by("corrupted weight"), 1);
        assert_eq!(cleaned.report.dropped_by("unconvertible weight"), 1);
    }

    #[test]
    fn test_weight_class_boundaries() {
        let cases = [
            ("1.999kg", "Light"),
            ("2kg", "Mid_Sized"),
            ("39.999kg", "Mid_Sized"),
            ("40kg", "Heavy"),
            ("139.999kg", "Heavy"),
            ("140kg", "Truck_Required"),
        ];
        let records: Vec<Value> = cases
            .iter()
            .enumerate()
            .map(|(i, (w, _))| product(&format!("P{}", i), w, "£1.00", "Still_avaliable"))
            .collect();
        let cleaned = clean_products(&Table::from_records(&records), &CleanOptions::default()).unwrap();

        for (row, (_, class)) in cases.iter().enumerate() {
            assert_eq!(cleaned.table.get(row, "weight_class"), Some(&Cell::text(*class)));
        }
    }

    #[test]
    fn test_price_availability_and_layout() {
        let raw = Table::from_records(&[
            product("A1", "1kg", "£39.99", "Still_avaliable"),
            product("A2", "1kg", "£5", "Removed"),
        ]);
        let cleaned = clean_products(&raw, &CleanOptions::default()).unwrap();

        assert_eq!(cleaned.table.column_names(), COLUMN_ORDER.to_vec());
        assert_eq!(cleaned.table.get(0, "product_price"), Some(&Cell::Float(39.99)));
        assert_eq!(cleaned.table.get(0, "still_available"), Some(&Cell::Bool(true)));
        assert_eq!(cleaned.table.get(1, "still_available"), Some(&Cell::Bool(false)));
        assert!(cleaned.table.column_index("removed").is_none());
        assert!(cleaned.table.column_index("Unnamed: 0").is_none());
    }

    #[test]
    fn test_null_weight_dropped() {
        let mut row = product("A1", "1kg", "£1.00", "Still_avaliable");
        row["weight"] = Value::Null;
        let raw = Table::from_records(&[row]);
        let cleaned = clean_products(&raw, &CleanOptions::default()).unwrap();
        assert!(cleaned.table.is_empty());
    }
}
