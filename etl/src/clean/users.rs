//! Cleaner for the legacy user table.

use super::primitives::{
    dedupe_email_at, is_valid_email, normalize_country_code, parse_and_coerce_date,
};
use super::{enforce_null_policy, map_text, require, CleanOptions, CleanReport, Cleaned};
use crate::error::CleanResult;
use crate::models::Entity;
use crate::table::{Cell, ColumnKind, Table};

/// Source-side row index, not part of the user record.
const INDEX_COLUMN: &str = "index";

/// Clean raw user records.
///
/// 1. drop rows with a null in any column
/// 2. drop repeated `user_uuid` values, keeping the first
/// 3. coerce `date_of_birth` and `join_date` to dates
/// 4. repair doubled `@` in emails, then drop invalid emails
/// 5. map country code `GGB` to `GB`
/// 6. move `user_uuid` to the first column
///
/// Nulls are dropped before duplicates so a null row never shadows a
/// complete row with the same uuid.
pub fn clean_users(raw: &Table, options: &CleanOptions) -> CleanResult<Cleaned> {
    let entity = Entity::User;
    let mut table = raw.clone();
    let mut report = CleanReport::new(entity, table.len());

    let uuid = require(&table, entity, "user_uuid")?;
    require(&table, entity, "date_of_birth")?;
    require(&table, entity, "join_date")?;
    require(&table, entity, "email_address")?;
    require(&table, entity, "country_code")?;

    let dropped = table.drop_rows_with_nulls();
    report.record("null values", dropped);

    let dropped = table.dedup_by(uuid);
    report.record("duplicate user_uuid", dropped);

    table.drop_columns(&[INDEX_COLUMN]);

    for (column, step) in [
        ("date_of_birth", "invalid date_of_birth"),
        ("join_date", "invalid join_date"),
    ] {
        let idx = require(&table, entity, column)?;
        map_text(&mut table, idx, |s| {
            parse_and_coerce_date(s).map(Cell::Date).unwrap_or(Cell::Null)
        });
        table.set_kind(idx, ColumnKind::Date);
        enforce_null_policy(&mut table, &[idx], options, &mut report, step);
    }

    let email = require(&table, entity, "email_address")?;
    map_text(&mut table, email, |s| Cell::Text(dedupe_email_at(s)));
    let dropped = table.retain_rows(|row| row[email].as_str().is_some_and(is_valid_email));
    report.record("invalid email", dropped);

    let country = require(&table, entity, "country_code")?;
    map_text(&mut table, country, |s| Cell::Text(normalize_country_code(s)));

    table.move_to_front("user_uuid")?;

    Ok(Cleaned { table, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::NullPolicy;
    use chrono::NaiveDate;
    use serde_json::json;

    fn user(uuid: &str, dob: &str, joined: &str, email: &str, code: &str) -> serde_json::Value {
        json!({
            "index": "0",
            "first_name": "Jane",
            "last_name": "Doe",
            "date_of_birth": dob,
            "email_address": email,
            "country_code": code,
            "join_date": joined,
            "user_uuid": uuid,
        })
    }

    #[test]
    fn test_duplicate_uuid_with_null_join_date() {
        let mut null_row = user("u1", "1990-01-01", "", "a@b.com", "GB");
        null_row["join_date"] = serde_json::Value::Null;
        let raw = Table::from_records(&[
            null_row,
            user("u1", "1990-01-01", "2015-05-05", "a@b.com", "GB"),
        ]);

        let cleaned = clean_users(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.len(), 1);
        assert_eq!(cleaned.table.get(0, "user_uuid"), Some(&Cell::text("u1")));
        assert_eq!(
            cleaned.table.get(0, "join_date"),
            Some(&Cell::Date(NaiveDate::from_ymd_opt(2015, 5, 5).unwrap()))
        );
        assert_eq!(cleaned.report.dropped_by("null values"), 1);
        assert_eq!(cleaned.report.dropped_by("duplicate user_uuid"), 0);
    }

    #[test]
    fn test_uuid_first_and_index_dropped() {
        let raw = Table::from_records(&[user("u1", "1968 October 16", "2001/02/03", "a@b.com", "DE")]);
        let cleaned = clean_users(&raw, &CleanOptions::default()).unwrap();
        let names = cleaned.table.column_names();
        assert_eq!(names[0], "user_uuid");
        assert!(!names.contains(&"index"));
        assert_eq!(
            cleaned.table.get(0, "date_of_birth"),
            Some(&Cell::Date(NaiveDate::from_ymd_opt(1968, 10, 16).unwrap()))
        );
    }

    #[test]
    fn test_email_repair_and_filter() {
        let raw = Table::from_records(&[
            user("u1", "1990-01-01", "2015-05-05", "jane@@example.com", "GB"),
            user("u2", "1990-01-01", "2015-05-05", "not-an-email", "GB"),
        ]);
        let cleaned = clean_users(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.len(), 1);
        assert_eq!(
            cleaned.table.get(0, "email_address"),
            Some(&Cell::text("jane@example.com"))
        );
        assert_eq!(cleaned.report.dropped_by("invalid email"), 1);
    }

    #[test]
    fn test_country_code_ggb() {
        let raw = Table::from_records(&[
            user("u1", "1990-01-01", "2015-05-05", "a@b.com", "GGB"),
            user("u2", "1990-01-01", "2015-05-05", "c@d.com", "US"),
        ]);
        let cleaned = clean_users(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.table.get(0, "country_code"), Some(&Cell::text("GB")));
        assert_eq!(cleaned.table.get(1, "country_code"), Some(&Cell::text("US")));
    }

    #[test]
    fn test_bad_dates_follow_policy() {
        let raw = Table::from_records(&[
            user("u1", "GB3H7K9Q2Z", "2015-05-05", "a@b.com", "GB"),
            user("u2", "1990-01-01", "2015-05-05", "c@d.com", "GB"),
        ]);

        let dropped = clean_users(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(dropped.table.len(), 1);
        assert_eq!(dropped.report.dropped_by("invalid date_of_birth"), 1);

        let retain = CleanOptions {
            residual_nulls: NullPolicy::Retain,
        };
        let kept = clean_users(&raw, &retain).unwrap();
        assert_eq!(kept.table.len(), 2);
        assert_eq!(kept.table.get(0, "date_of_birth"), Some(&Cell::Null));
    }

    #[test]
    fn test_raw_table_untouched() {
        let raw = Table::from_records(&[user("u1", "1990-01-01", "2015-05-05", "a@@b.com", "GGB")]);
        let before = raw.clone();
        clean_users(&raw, &CleanOptions::default()).unwrap();
        assert_eq!(raw, before);
    }

    #[test]
    fn test_missing_column_is_error() {
        let raw = Table::from_records(&[json!({"user_uuid": "u1"})]);
        assert!(clean_users(&raw, &CleanOptions::default()).is_err());
    }
}
