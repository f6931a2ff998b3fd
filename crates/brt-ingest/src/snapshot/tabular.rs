//! Flat CSV encoding of the vehicle rows
//!
//! One column per field name seen in any record, in first-seen order. Cells
//! carry the JSON text of the value so strings, numbers and nested values come
//! back with their original type. Only the vehicle rows are stored; other
//! top-level feed keys are not part of this encoding.
//!
//! Records without any field still need a line each. When no record has a
//! field the file holds a single unnamed column with an empty cell per record.

use brt_common::VehicleRecord;
use serde_json::Value;

use super::structured::escape_non_ascii;
use crate::error::CodecError;

/// Cells decoded as an explicit JSON null
pub const NULL_MARKERS: [&str; 5] = ["", "NaN", "nan", "NaT", "None"];

/// Name of the placeholder column written when no record has a field
const PLACEHOLDER_COLUMN: &str = "";

/// Union of field names, in first-seen order
pub fn columns(records: &[&VehicleRecord]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !seen.iter().any(|c| c == key) {
                seen.push(key.clone());
            }
        }
    }
    seen
}

pub fn encode(records: &[&VehicleRecord]) -> Result<Vec<u8>, CodecError> {
    let mut header = columns(records);
    if header.is_empty() && !records.is_empty() {
        header.push(PLACEHOLDER_COLUMN.to_string());
    }
    let mut writer = csv::Writer::from_writer(Vec::new());

    if !header.is_empty() {
        writer.write_record(&header)?;
        for record in records {
            let row = header
                .iter()
                .map(|column| encode_cell(record.get(column)))
                .collect::<Result<Vec<_>, _>>()?;
            writer.write_record(&row)?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| CodecError::Io(e.into_error()))
}

/// Decode rows back into records.
///
/// Every record gets every column; empty and NaN-like cells become `null`.
/// A null cell of the placeholder column yields no field at all.
pub fn decode(bytes: &[u8]) -> Result<Vec<VehicleRecord>, CodecError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let placeholder = header.len() == 1 && header[0] == PLACEHOLDER_COLUMN;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: VehicleRecord = header
            .iter()
            .enumerate()
            .map(|(i, column)| (column.clone(), decode_cell(row.get(i).unwrap_or(""))))
            .filter(|(_, value)| !(placeholder && value.is_null()))
            .collect();
        records.push(record);
    }

    Ok(records)
}

fn encode_cell(value: Option<&Value>) -> Result<String, serde_json::Error> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(value) => Ok(escape_non_ascii(&serde_json::to_string(value)?)),
    }
}

fn decode_cell(cell: &str) -> Value {
    if NULL_MARKERS.contains(&cell.trim()) {
        return Value::Null;
    }
    // Hand-edited files may hold bare text
    serde_json::from_str(cell).unwrap_or_else(|_| Value::String(cell.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> VehicleRecord {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_columns_first_seen_order() {
        let a = record(json!({"codigo": "A", "linha": "10"}));
        let b = record(json!({"velocidade": 3, "codigo": "B"}));
        assert_eq!(columns(&[&a, &b]), vec!["codigo", "linha", "velocidade"]);
    }

    #[test]
    fn test_round_trip_preserves_types_and_fills_nulls() {
        let a = record(json!({
            "codigo": "BRT-01",
            "linha": "Parada, \"Terminal\"\nAlvorada",
            "latitude": -22.98,
            "ativo": true,
            "sentido": null,
            "extra": {"portas": [1, 2]},
            "blank": ""
        }));
        let b = record(json!({"codigo": "BRT-02", "trajeto": "Galeão"}));

        let bytes = encode(&[&a, &b]).unwrap();
        assert!(bytes.is_ascii());
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.len(), 2);
        for (key, value) in &a {
            assert_eq!(&decoded[0][key], value, "field {key}");
        }
        assert_eq!(decoded[0]["trajeto"], Value::Null);
        assert_eq!(decoded[1]["codigo"], json!("BRT-02"));
        assert_eq!(decoded[1]["trajeto"], json!("Galeão"));
        assert_eq!(decoded[1]["latitude"], Value::Null);
        assert_eq!(decoded[1].len(), decoded[0].len());
    }

    #[test]
    fn test_nan_cells_become_null_not_strings() {
        let csv = "codigo,velocidade,hodometro\n\"\"\"A\"\"\",NaN,nan\n\"\"\"B\"\"\",12,\n";
        let decoded = decode(csv.as_bytes()).unwrap();

        assert_eq!(decoded[0]["codigo"], json!("A"));
        assert_eq!(decoded[0]["velocidade"], Value::Null);
        assert_eq!(decoded[0]["hodometro"], Value::Null);
        assert_eq!(decoded[1]["velocidade"], json!(12));
        assert_eq!(decoded[1]["hodometro"], Value::Null);
    }

    #[test]
    fn test_bare_text_falls_back_to_string() {
        let decoded = decode(b"codigo\nBRT-7\n").unwrap();
        assert_eq!(decoded[0]["codigo"], json!("BRT-7"));
    }

    #[test]
    fn test_empty_input() {
        assert!(encode(&[]).unwrap().is_empty());
        assert!(decode(b"").unwrap().is_empty());
    }

    #[test]
    fn test_fieldless_records_keep_their_count() {
        let empty = VehicleRecord::new();

        let bytes = encode(&[&empty, &empty]).unwrap();
        assert!(!bytes.is_empty());

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, vec![VehicleRecord::new(), VehicleRecord::new()]);
    }

    #[test]
    fn test_fieldless_record_next_to_others() {
        let a = record(json!({"codigo": "A"}));
        let empty = VehicleRecord::new();

        let decoded = decode(&encode(&[&a, &empty]).unwrap()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1]["codigo"], Value::Null);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(decode(b"a,b\n1\n").is_err());
    }
}
