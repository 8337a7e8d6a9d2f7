//! Structural preview of a delimited text buffer.
//!
//! Only the first read-chunk of an upload is ever handed to [`extract_preview`], so the
//! parser works on a bounded slice and never sees the whole file.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{UploadError, UploadResult};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Cell values treated as missing.
const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "<NA>",
];

/// A portable scalar: null, number or string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreviewValue {
    Null,
    Number(serde_json::Number),
    Text(String),
}

impl PreviewValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PreviewValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PreviewValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PreviewValue::Number(number) => number.as_f64(),
            _ => None,
        }
    }
}

/// One preview row keyed by column name, in column order.
pub type PreviewRow = IndexMap<String, PreviewValue>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub column_names: Vec<String>,
    pub rows: Vec<PreviewRow>,
}

impl Preview {
    pub fn total_columns(&self) -> usize {
        self.column_names.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColumnType {
    Empty,
    Integer,
    Float,
    Text,
}

/// Parses `chunk` as CSV and returns its header names and up to `max_rows` data rows.
///
/// When `is_whole_file` is false the chunk was cut at an arbitrary byte, so everything
/// after its last newline is discarded before decoding. If that leaves only the header,
/// the first data row is longer than the chunk and the preview carries no rows.
pub fn extract_preview(chunk: &[u8], is_whole_file: bool, max_rows: usize) -> UploadResult<Preview> {
    let chunk = chunk.strip_prefix(UTF8_BOM).unwrap_or(chunk);
    if chunk.iter().all(|byte| byte.is_ascii_whitespace()) {
        return Err(UploadError::EmptyFile);
    }

    let complete = if is_whole_file {
        chunk
    } else {
        match chunk.iter().rposition(|byte| *byte == b'\n') {
            Some(last_newline) => &chunk[..=last_newline],
            None => {
                return Err(UploadError::InvalidFormat(
                    "header row does not fit in the first read chunk".to_string(),
                ))
            }
        }
    };

    let text = std::str::from_utf8(complete).map_err(|_| UploadError::InvalidEncoding)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| UploadError::InvalidFormat(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let column_names = normalise_headers(&headers);

    let mut raw_rows: Vec<Vec<Option<String>>> = Vec::with_capacity(max_rows);
    for record in reader.records().take(max_rows) {
        let record = record.map_err(|e| UploadError::InvalidFormat(e.to_string()))?;
        if record.len() > column_names.len() {
            return Err(UploadError::InvalidFormat(format!(
                "expected {} fields, saw {} on line {}",
                column_names.len(),
                record.len(),
                record.position().map(|p| p.line()).unwrap_or_default()
            )));
        }
        let mut cells: Vec<Option<String>> = record
            .iter()
            .map(|cell| (!is_na(cell)).then(|| cell.to_string()))
            .collect();
        cells.resize(column_names.len(), None);
        raw_rows.push(cells);
    }

    if raw_rows.is_empty() {
        if is_whole_file {
            return Err(UploadError::InvalidFormat("no data rows".to_string()));
        }
        return Ok(Preview {
            column_names,
            rows: Vec::new(),
        });
    }

    let column_types: Vec<ColumnType> = (0..column_names.len())
        .map(|index| infer_column_type(raw_rows.iter().map(|row| row[index].as_deref())))
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|cells| {
            column_names
                .iter()
                .zip(column_types.iter())
                .zip(cells)
                .map(|((name, column_type), cell)| (name.clone(), convert_cell(cell, *column_type)))
                .collect::<PreviewRow>()
        })
        .collect();

    Ok(Preview { column_names, rows })
}

fn is_na(cell: &str) -> bool {
    NA_TOKENS.contains(&cell.trim())
}

/// Blank headers become `Unnamed: {index}`; repeats get a `.1`, `.2`, ... suffix.
fn normalise_headers(headers: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(headers.len());
    for (index, header) in headers.iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", index)
        } else {
            header.clone()
        };

        let mut candidate = base.clone();
        let mut suffix = 1;
        while names.contains(&candidate) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        names.push(candidate);
    }
    names
}

/// Integers only survive as integers when the column has no missing cells, since a
/// missing cell forces the whole column to floating point.
fn infer_column_type<'a>(cells: impl Iterator<Item = Option<&'a str>>) -> ColumnType {
    let mut saw_value = false;
    let mut saw_missing = false;
    let mut all_integer = true;
    let mut all_numeric = true;

    for cell in cells {
        let Some(cell) = cell else {
            saw_missing = true;
            continue;
        };
        saw_value = true;
        let trimmed = cell.trim();
        if trimmed.parse::<i64>().is_err() {
            all_integer = false;
        }
        if !trimmed.parse::<f64>().map(f64::is_finite).unwrap_or(false) {
            all_numeric = false;
        }
    }

    match (saw_value, all_integer, all_numeric) {
        (false, _, _) => ColumnType::Empty,
        (true, true, _) if !saw_missing => ColumnType::Integer,
        (true, _, true) => ColumnType::Float,
        _ => ColumnType::Text,
    }
}

fn convert_cell(cell: Option<String>, column_type: ColumnType) -> PreviewValue {
    let Some(cell) = cell else {
        return PreviewValue::Null;
    };
    let trimmed = cell.trim();
    let number = match column_type {
        ColumnType::Integer => trimmed.parse::<i64>().ok().map(serde_json::Number::from),
        ColumnType::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64),
        ColumnType::Empty | ColumnType::Text => None,
    };
    number.map(PreviewValue::Number).unwrap_or(PreviewValue::Text(cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn csv_with_rows(rows: usize) -> String {
        let mut text = String::from("id,amount,region\n");
        for i in 0..rows {
            text.push_str(&format!("{},{}.5,r{}\n", i, i * 10, i % 3));
        }
        text
    }

    #[test]
    fn truncates_large_file_to_max_rows_in_order() {
        let text = csv_with_rows(5000);
        let preview = extract_preview(text.as_bytes(), true, 5).unwrap();

        assert_eq!(preview.column_names, vec!["id", "amount", "region"]);
        assert_eq!(preview.rows.len(), 5);
        for (i, row) in preview.rows.iter().enumerate() {
            assert_eq!(row["id"], PreviewValue::Number((i as i64).into()));
        }
    }

    #[test]
    fn short_file_returns_every_row() {
        let text = csv_with_rows(3);
        let preview = extract_preview(text.as_bytes(), true, 5).unwrap();
        assert_eq!(preview.rows.len(), 3);
        assert_eq!(preview.total_columns(), 3);
    }

    #[test]
    fn values_are_typed_per_column() {
        let text = "id,price,label,empty\n1,2.5,a,\n2,3,b,\n";
        let preview = extract_preview(text.as_bytes(), true, 5).unwrap();
        let rows = serde_json::to_value(&preview.rows).unwrap();
        assert_eq!(
            rows,
            json!([
                {"id": 1, "price": 2.5, "label": "a", "empty": null},
                {"id": 2, "price": 3.0, "label": "b", "empty": null}
            ])
        );
    }

    #[test]
    fn missing_cells_turn_integer_columns_into_floats() {
        let text = "n\n1\nNA\n3\n";
        let preview = extract_preview(text.as_bytes(), true, 5).unwrap();
        assert_eq!(preview.rows[0]["n"].as_f64(), Some(1.0));
        assert!(preview.rows[1]["n"].is_null());
        assert_eq!(serde_json::to_string(&preview.rows[2]).unwrap(), r#"{"n":3.0}"#);
    }

    #[test]
    fn partial_trailing_line_is_dropped() {
        let text = "id,name\n1,alpha\n2,be";
        let preview = extract_preview(text.as_bytes(), false, 5).unwrap();
        assert_eq!(preview.rows.len(), 1);

        let preview = extract_preview(text.as_bytes(), true, 5).unwrap();
        assert_eq!(preview.rows.len(), 2);
    }

    #[test]
    fn data_row_longer_than_chunk_gives_header_only_preview() {
        let text = format!("id,notes\n1,{}", "x".repeat(200));
        let preview = extract_preview(&text.as_bytes()[..64], false, 5).unwrap();
        assert_eq!(preview.column_names, vec!["id", "notes"]);
        assert!(preview.rows.is_empty());
    }

    #[test]
    fn bom_and_header_quirks_are_normalised() {
        let text = "\u{feff}a,a,,b\n1,2,3,4\n";
        let preview = extract_preview(text.as_bytes(), true, 5).unwrap();
        assert_eq!(preview.column_names, vec!["a", "a.1", "Unnamed: 2", "b"]);
    }

    #[test]
    fn short_rows_are_padded_with_nulls() {
        let text = "a,b,c\n1\n";
        let preview = extract_preview(text.as_bytes(), true, 5).unwrap();
        assert!(preview.rows[0]["b"].is_null());
        assert!(preview.rows[0]["c"].is_null());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            extract_preview(b"a,b\n", true, 5),
            Err(UploadError::InvalidFormat(msg)) if msg == "no data rows"
        ));
        assert!(matches!(
            extract_preview(b"a,b\n1,2,3\n", true, 5),
            Err(UploadError::InvalidFormat(_))
        ));
        assert!(matches!(
            extract_preview(b"a,b\n\xff\xfe,1\n", true, 5),
            Err(UploadError::InvalidEncoding)
        ));
        assert!(matches!(extract_preview(b"", true, 5), Err(UploadError::EmptyFile)));
        assert!(matches!(
            extract_preview(b"no newline at all", false, 5),
            Err(UploadError::InvalidFormat(_))
        ));
    }

    #[test]
    fn preview_rows_round_trip_through_json() {
        let text = "id,region\n1,north\n";
        let preview = extract_preview(text.as_bytes(), true, 5).unwrap();
        let stored = serde_json::to_string(&preview.rows).unwrap();
        let restored: Vec<PreviewRow> = serde_json::from_str(&stored).unwrap();
        assert_eq!(restored, preview.rows);
    }
}
