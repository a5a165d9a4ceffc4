//! Flat-file readers: CSV and JSON bytes into a raw [`Table`].
//!
//! CSV input goes through encoding and delimiter auto-detection before the
//! `csv` crate splits it:
//!
//! ```text
//! bytes ──▶ detect_encoding ──▶ decode_content ──▶ detect_delimiter ──▶ csv::Reader ──▶ Table
//! ```
//!
//! JSON input is either an array of records or a column-oriented object
//! (`{"col": {"0": v, "1": v}}`), the shape written by dataframe exports.

use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{ExtractError, ExtractResult};
use crate::table::{Cell, Table};

/// Flat-file formats understood by [`parse_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    /// Guess the format from a path or URL extension. Query strings are
    /// ignored.
    pub fn from_location(location: &str) -> Option<Self> {
        let path = location.split(['?', '#']).next().unwrap_or(location);
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Some(FileFormat::Csv),
            "json" => Some(FileFormat::Json),
            _ => None,
        }
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: Table,
    /// Detected encoding (`utf-8` for JSON)
    pub encoding: String,
    /// Detected delimiter, CSV only
    pub delimiter: Option<char>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with the given encoding. Unknown encodings and invalid
/// UTF-8 fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the header line.
/// Comma wins ties and header lines with no separator at all.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;
    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// Every field becomes [`Cell::Text`] with its text untouched, surrounding
/// whitespace included; empty fields become [`Cell::Null`]. Short rows are
/// padded, long rows truncated, blank lines skipped.
pub fn parse_csv_str(content: &str, delimiter: char) -> ExtractResult<Table> {
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| ExtractError::Precondition(format!("unsupported delimiter {:?}", delimiter)))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    if headers.iter().all(String::is_empty) {
        return Err(ExtractError::Empty("CSV has no header row".into()));
    }

    let mut table = Table::new(headers);
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let row = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Cell::Null
                } else {
                    Cell::text(field)
                }
            })
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_csv_bytes(bytes: &[u8]) -> ExtractResult<ParseResult> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let table = parse_csv_str(&content, delimiter)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter: Some(delimiter),
    })
}

/// Build a table from parsed JSON.
///
/// Accepts an array of record objects, or an object mapping each column to
/// an object keyed by row label. Row labels are ordered numerically when
/// they are all integers.
pub fn table_from_json(value: &Value) -> ExtractResult<Table> {
    match value {
        Value::Array(records) => Ok(Table::from_records(records)),
        Value::Object(columns) => from_columns(columns),
        _ => Err(ExtractError::Precondition(
            "JSON document must be an array of records or an object of columns".into(),
        )),
    }
}

fn from_columns(columns: &Map<String, Value>) -> ExtractResult<Table> {
    let mut labels: Vec<&str> = Vec::new();
    for (name, column) in columns {
        let column = column.as_object().ok_or_else(|| {
            ExtractError::Precondition(format!("column '{}' is not an object of rows", name))
        })?;
        for label in column.keys() {
            if !labels.contains(&label.as_str()) {
                labels.push(label);
            }
        }
    }
    if labels.iter().all(|l| l.parse::<u64>().is_ok()) {
        labels.sort_by_key(|l| l.parse::<u64>().unwrap_or(u64::MAX));
    }

    let mut table = Table::new(columns.keys().cloned());
    for label in labels {
        let row = columns
            .values()
            .map(|column| {
                column
                    .get(label)
                    .map(Cell::from_json)
                    .unwrap_or(Cell::Null)
            })
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

/// Parse JSON bytes into a table.
pub fn parse_json_bytes(bytes: &[u8]) -> ExtractResult<ParseResult> {
    let value: Value = serde_json::from_slice(bytes)?;
    Ok(ParseResult {
        table: table_from_json(&value)?,
        encoding: "utf-8".to_string(),
        delimiter: None,
    })
}

/// Parse bytes in the given format.
pub fn parse_bytes(bytes: &[u8], format: FileFormat) -> ExtractResult<ParseResult> {
    match format {
        FileFormat::Csv => parse_csv_bytes(bytes),
        FileFormat::Json => parse_json_bytes(bytes),
    }
}

/// Read and parse a local file, choosing the format from its extension.
pub fn parse_file(path: impl AsRef<Path>) -> ExtractResult<ParseResult> {
    let path = path.as_ref();
    let location = path.to_string_lossy();
    let format = FileFormat::from_location(&location).ok_or_else(|| {
        ExtractError::Precondition(format!("cannot tell the format of '{}'", location))
    })?;
    let bytes = std::fs::read(path)?;
    parse_bytes(&bytes, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_csv() {
        let table = parse_csv_str("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.column_names(), vec!["name", "age"]);
        assert_eq!(table.get(0, "name"), Some(&Cell::text("Alice")));
        assert_eq!(table.get(1, "age"), Some(&Cell::text("25")));
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let csv = "product_name,product_price\n\"Mug, large\",£9.99";
        let table = parse_csv_str(csv, ',').unwrap();
        assert_eq!(table.get(0, "product_name"), Some(&Cell::text("Mug, large")));
        assert_eq!(table.get(0, "product_price"), Some(&Cell::text("£9.99")));
    }

    #[test]
    fn test_empty_fields_are_null() {
        let table = parse_csv_str("a,b,c\n1,,3", ',').unwrap();
        assert_eq!(table.get(0, "b"), Some(&Cell::Null));
        assert_eq!(table.get(0, "c"), Some(&Cell::text("3")));
    }

    #[test]
    fn test_fields_keep_raw_whitespace() {
        let table = parse_csv_str("store_code,staff_numbers
 WEB-1 , 3 
", ',').unwrap();
        assert_eq!(table.get(0, "store_code"), Some(&Cell::text(" WEB-1 ")));
        assert_eq!(table.get(0, "staff_numbers"), Some(&Cell::text(" 3 ")));
    }

    #[test]
    fn test_ragged_rows() {
        let table = parse_csv_str("a,b\n1\n1,2,3", ',').unwrap();
        assert_eq!(table.get(0, "b"), Some(&Cell::Null));
        assert_eq!(table.rows()[1].len(), 2);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_csv_str("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_empty_csv_error() {
        let err = parse_csv_str("", ',').unwrap_err();
        assert!(matches!(err, ExtractError::Empty(_)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse_strips_bom() {
        let result = parse_csv_bytes("\u{feff}name,weight\nMug,1kg".as_bytes()).unwrap();
        assert_eq!(result.delimiter, Some(','));
        assert_eq!(result.table.column_names(), vec!["name", "weight"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_json_records() {
        let doc = json!([
            {"date_uuid": "d1", "month": "9", "year": 2012},
            {"date_uuid": "d2", "month": null}
        ]);
        let table = table_from_json(&doc).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "year"), Some(&Cell::text("2012")));
        assert_eq!(table.get(1, "year"), Some(&Cell::Null));
        assert_eq!(table.get(1, "month"), Some(&Cell::Null));
    }

    #[test]
    fn test_json_columns_ordered_by_row_label() {
        let doc = json!({
            "timestamp": {"10": "01:00:00", "2": "02:00:00", "0": "03:00:00"},
            "month": {"0": "1", "2": "2", "10": "3"}
        });
        let table = table_from_json(&doc).unwrap();
        assert_eq!(table.column_names(), vec!["timestamp", "month"]);
        assert_eq!(table.get(0, "timestamp"), Some(&Cell::text("03:00:00")));
        assert_eq!(table.get(1, "month"), Some(&Cell::text("2")));
        assert_eq!(table.get(2, "timestamp"), Some(&Cell::text("01:00:00")));
    }

    #[test]
    fn test_json_scalar_rejected() {
        let err = table_from_json(&json!(42)).unwrap_err();
        assert!(matches!(err, ExtractError::Precondition(_)));
    }

    #[test]
    fn test_format_from_location() {
        assert_eq!(FileFormat::from_location("data/products.csv"), Some(FileFormat::Csv));
        assert_eq!(
            FileFormat::from_location("https://host/date_details.json?sig=abc"),
            Some(FileFormat::Json)
        );
        assert_eq!(FileFormat::from_location("card_details.pdf"), None);
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.csv");
        std::fs::write(&path, "product_code,weight\nA1,1kg\n").unwrap();
        let result = parse_file(&path).unwrap();
        assert_eq!(result.table.get(0, "weight"), Some(&Cell::text("1kg")));
    }
}
