//! Cleaner for store details retrieved from the stores API.

use super::primitives::{degarble_continent, extract_staff_number, parse_and_coerce_date};
use super::{dedup_key, enforce_null_policy, map_text, require, CleanOptions, CleanReport, Cleaned};
use crate::error::CleanResult;
use crate::models::Entity;
use crate::table::{Cell, ColumnKind, Table};
use tracing::warn;

/// Store type of the single non-physical store.
pub const WEB_PORTAL: &str = "Web Portal";

/// Placeholder values written into the web portal row.
pub const ONLINE_ADDRESS: &str = "Online Address";
pub const ONLINE_LOCALITY: &str = "Online";
pub const ONLINE_COORDINATE: &str = "0";

/// Raw columns with no counterpart in the cleaned table. `lat` duplicates
/// `latitude` with mostly garbage values.
const DROPPED_COLUMNS: [&str; 2] = ["lat", "index"];

/// Column order of the cleaned table.
pub const COLUMN_ORDER: [&str; 10] = [
    "store_code",
    "store_type",
    "address",
    "locality",
    "country_code",
    "continent",
    "latitude",
    "longitude",
    "staff_numbers",
    "opening_date",
];

/// A finite decimal coordinate. `NaN` and infinities count as missing.
fn parse_coordinate(raw: &str) -> Cell {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Cell::Float)
        .unwrap_or(Cell::Null)
}

/// Clean raw store records.
pub fn clean_stores(raw: &Table, options: &CleanOptions) -> CleanResult<Cleaned> {
    let entity = Entity::Store;
    let mut table = raw.clone();
    let mut report = CleanReport::new(entity, table.len());

    table.drop_columns(&DROPPED_COLUMNS);
    for column in COLUMN_ORDER {
        require(&table, entity, column)?;
    }

    let store_type = require(&table, entity, "store_type")?;
    let address = require(&table, entity, "address")?;
    let locality = require(&table, entity, "locality")?;
    let latitude = require(&table, entity, "latitude")?;
    let longitude = require(&table, entity, "longitude")?;

    let portals = table
        .column_values(store_type)
        .filter(|c| c.as_str() == Some(WEB_PORTAL))
        .count();
    if portals != 1 {
        warn!(count = portals, "expected exactly one web portal store");
    }
    let placeholders = [
        (address, ONLINE_ADDRESS),
        (locality, ONLINE_LOCALITY),
        (latitude, ONLINE_COORDINATE),
        (longitude, ONLINE_COORDINATE),
    ];
    table.update_rows(|row| {
        if row[store_type].as_str() == Some(WEB_PORTAL) {
            for (idx, value) in placeholders {
                row[idx] = Cell::text(value);
            }
        }
    });

    let dropped = table.drop_rows_with_nulls();
    report.record("null values", dropped);

    let dropped = table.retain_rows(|row| row[address].as_str().is_some_and(|a| a.contains(' ')));
    report.record("corrupted address", dropped);

    for idx in [longitude, latitude] {
        map_text(&mut table, idx, parse_coordinate);
        table.set_kind(idx, ColumnKind::Float);
    }
    enforce_null_policy(
        &mut table,
        &[longitude, latitude],
        options,
        &mut report,
        "non-numeric coordinates",
    );

    let staff = require(&table, entity, "staff_numbers")?;
    map_text(&mut table, staff, |s| {
        extract_staff_number(s).map(Cell::Int).unwrap_or(Cell::Null)
    });
    table.set_kind(staff, ColumnKind::Int);
    let dropped = table.retain_rows(|row| !row[staff].is_null());
    report.record("empty staff_numbers", dropped);

    let continent = require(&table, entity, "continent")?;
    map_text(&mut table, continent, |s| Cell::Text(degarble_continent(s)));

    let opened = require(&table, entity, "opening_date")?;
    map_text(&mut table, opened, |s| {
        parse_and_coerce_date(s).map(Cell::Date).unwrap_or(Cell::Null)
    });
    table.set_kind(opened, ColumnKind::Date);
    enforce_null_policy(&mut table, &[opened], options, &mut report, "invalid opening_date");

    let code = require(&table, entity, "store_code")?;
    dedup_key(&mut table, code, &mut report, "duplicate store_code");
    table.select(&COLUMN_ORDER)?;

    Ok(Cleaned { table, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::NullPolicy;
    use serde_json::{json, Value};

    fn store(code: &str, store_type: &str, address: &str, lat: &str, staff: &str) -> Value {
        json!({
            "index": 0,
            "address": address,
            "longitude": "-0.1",
            "lat": null,
            "locality": "London",
            "store_code": code,
            "staff_numbers": staff,
            "opening_date": "2010-06-12",
            "store_type": store_type,
            "latitude": lat,
            "country_code": "GB",
            "continent": "eeEurope",
        })
    }

    fn portal() -> Value {
        let mut row = store("WEB-1388012W", WEB_PORTAL, "N/A", "51.5", "325");
        row["address"] = Value::Null;
        row["longitude"] = Value::Null;
        row["locality"] = Value::Null;
        row
    }

    #[test]
    fn test_web_portal_gets_placeholders() {
        let raw = Table::from_records(&[portal(), store("HA-7BA", "Local", "12 High Street", "51.2", "34")]);
        let cleaned = clean_stores(&raw, &CleanOptions::default()).unwrap();

        assert_eq!(cleaned.table.len(), 2);
        assert_eq!(cleaned.table.get(0, "latitude"), Some(&Cell::Float(0.0)));
        assert_eq!(cleaned.table.get(0, "longitude"), Some(&Cell::Float(0.0)));
        assert_eq!(cleaned.table.get(0, "address"), Some(&Cell::text(ONLINE_ADDRESS)));
        assert_eq!(cleaned.table.get(0, "locality"), Some(&Cell::text(ONLINE_LOCALITY)));
    }

    #[test]
    fn test_columns_reordered_and_typed() {
        let raw = Table::from_records(&[store("HA-7BA", "Local", "12 High Street", "51.2", "34")]);
        let cleaned = clean_stores(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.column_names(), COLUMN_ORDER.to_vec());
        let kinds: Vec<_> = cleaned.table.columns().iter().map(|c| c.kind).collect();
        assert_eq!(kinds[6], ColumnKind::Float);
        assert_eq!(kinds[8], ColumnKind::Int);
        assert_eq!(kinds[9], ColumnKind::Date);
        assert_eq!(cleaned.table.get(0, "continent"), Some(&Cell::text("Europe")));
    }

    #[test]
    fn test_address_without_space_dropped() {
        let raw = Table::from_records(&[
            store("A", "Local", "QP74AHEQT0", "51.2", "34"),
            store("B", "Local", "1 Main Road", "51.2", "34"),
        ]);
        let cleaned = clean_stores(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.len(), 1);
        assert_eq!(cleaned.report.dropped_by("corrupted address"), 1);
    }

    #[test]
    fn test_staff_numbers_digits_only() {
        let raw = Table::from_records(&[
            store("A", "Local", "1 Main Road", "51.2", "J78"),
            store("B", "Local", "2 Main Road", "51.2", "none"),
        ]);
        let cleaned = clean_stores(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.len(), 1);
        assert_eq!(cleaned.table.get(0, "staff_numbers"), Some(&Cell::Int(78)));
        assert_eq!(cleaned.report.dropped_by("empty staff_numbers"), 1);
    }

    #[test]
    fn test_bad_coordinates_follow_policy() {
        let raw = Table::from_records(&[store("A", "Local", "1 Main Road", "fifty", "3")]);
        let retain = CleanOptions {
            residual_nulls: NullPolicy::Retain,
        };
        let cleaned = clean_stores(&raw, &retain).unwrap();
        assert_eq!(cleaned.table.get(0, "latitude"), Some(&Cell::Null));

        let cleaned = clean_stores(&raw, &CleanOptions::default()).unwrap();
        assert!(cleaned.table.is_empty());
        assert_eq!(cleaned.report.dropped_by("non-numeric coordinates"), 1);
    }

    #[test]
    fn test_non_finite_coordinates_are_missing() {
        let mut row = store("A", "Local", "1 Main Road", "NaN", "3");
        row["longitude"] = Value::from("inf");
        let raw = Table::from_records(&[row, store("B", "Local", "2 Main Road", "infinity", "3")]);

        let cleaned = clean_stores(&raw, &CleanOptions::default()).unwrap();
        assert!(cleaned.table.is_empty());
        assert_eq!(cleaned.report.dropped_by("non-numeric coordinates"), 2);

        let retain = CleanOptions {
            residual_nulls: NullPolicy::Retain,
        };
        let cleaned = clean_stores(&raw, &retain).unwrap();
        assert_eq!(cleaned.table.len(), 2);
        assert_eq!(cleaned.table.get(0, "latitude"), Some(&Cell::Null));
        assert_eq!(cleaned.table.get(0, "longitude"), Some(&Cell::Null));
        assert_eq!(cleaned.table.get(1, "latitude"), Some(&Cell::Null));
    }

    #[test]
    fn test_null_rows_dropped_after_placeholders() {
        let mut broken = store("C", "Local", "3 Main Road", "51.2", "3");
        broken["locality"] = Value::Null;
        let raw = Table::from_records(&[portal(), broken]);
        let cleaned = clean_stores(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.len(), 1);
        assert_eq!(cleaned.table.get(0, "store_type"), Some(&Cell::text(WEB_PORTAL)));
    }
}
