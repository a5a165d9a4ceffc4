//! JSON Schema validation of stores API responses.
//!
//! The API is the only source whose shape is not fixed by a table
//! definition, so every response is checked before it becomes a row.
//! A mismatch is a contract violation, not dirty data.
//!
//! # Embedded Schemas
//!
//! Schemas are embedded at compile time from the `schemas/` directory:
//! - `number-of-stores.json` - `{"number_stores": <int>}`
//! - `store-details.json` - one raw store record
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use retail_etl::validation::{validate, validate_store_count};
//!
//! assert!(validate_store_count(&json!({"statusCode": 200, "number_stores": 451})).is_ok());
//!
//! let schema = json!({"type": "object", "required": ["name"]});
//! assert!(validate(&schema, &json!({"name": "x"})).is_ok());
//! assert!(validate(&schema, &json!({"age": 42})).is_err());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static NUMBER_OF_STORES_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/number-of-stores.json"))
        .expect("Invalid embedded schema")
});

static STORE_DETAILS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/store-details.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a Draft 7 schema.
///
/// Returns every validation error message.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator =
        jsonschema::draft7::new(schema).map_err(|e| vec![format!("invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a `number_stores` response.
pub fn validate_store_count(data: &Value) -> Result<(), Vec<String>> {
    validate(&NUMBER_OF_STORES_SCHEMA, data)
}

/// Validate one `store_details` response.
pub fn validate_store_details(data: &Value) -> Result<(), Vec<String>> {
    validate(&STORE_DETAILS_SCHEMA, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Value {
        json!({
            "index": 0,
            "address": "Flat 72W\nSally isle\nEast Deantown\nE7B 8EB",
            "longitude": "51.62907",
            "lat": null,
            "locality": "High Wycombe",
            "store_code": "WEB-1388012W",
            "staff_numbers": "325",
            "opening_date": "2010-06-12",
            "store_type": "Web Portal",
            "latitude": "-0.74934",
            "country_code": "GB",
            "continent": "Europe"
        })
    }

    #[test]
    fn test_valid_store_count() {
        assert!(validate_store_count(&json!({"statusCode": 200, "number_stores": 451})).is_ok());
        assert!(validate_store_count(&json!({"number_stores": 0})).is_ok());
    }

    #[test]
    fn test_invalid_store_count() {
        assert!(validate_store_count(&json!({"number_stores": "451"})).is_err());
        assert!(validate_store_count(&json!({"number_stores": -1})).is_err());
        assert!(validate_store_count(&json!({"message": "Forbidden"})).is_err());
    }

    #[test]
    fn test_valid_store_details() {
        assert!(validate_store_details(&store()).is_ok());

        let mut nulls = store();
        nulls["address"] = Value::Null;
        nulls["staff_numbers"] = json!(12);
        assert!(validate_store_details(&nulls).is_ok());
    }

    #[test]
    fn test_store_details_with_errors() {
        let mut broken = store();
        broken.as_object_mut().unwrap().remove("store_code");
        broken["continent"] = json!(["Europe"]);

        let errors = validate_store_details(&broken).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("store_code")));
    }
}
