//! Conversion between DuckDB rows and JSON rows.

use serde_json::{Map, Number, Value};
use tern_core::FieldType;

/// A row keyed by column name.
pub type Row = Map<String, Value>;

/// Whether a column is selected as text and parsed back on the Rust side.
pub(crate) fn selected_as_text(field_type: FieldType) -> bool {
    matches!(field_type, FieldType::Timestamp | FieldType::Uuid)
}

/// Read one column whose type is known from the virtual schema.
pub(crate) fn read_typed(
    row: &duckdb::Row<'_>,
    idx: usize,
    field_type: FieldType,
) -> duckdb::Result<Value> {
    let value = match field_type {
        FieldType::Integer | FieldType::BigInteger => {
            row.get::<_, Option<i64>>(idx)?.map(Value::from)
        }
        FieldType::Float => row.get::<_, Option<f64>>(idx)?.map(float),
        FieldType::Boolean => row.get::<_, Option<bool>>(idx)?.map(Value::Bool),
        FieldType::Text | FieldType::Timestamp | FieldType::Uuid => {
            row.get::<_, Option<String>>(idx)?.map(Value::String)
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Read a column of unknown type, trying i64 -> f64 -> bool -> String.
pub(crate) fn read_untyped(row: &duckdb::Row<'_>, idx: usize) -> Value {
    if let Ok(Some(n)) = row.get::<_, Option<i64>>(idx) {
        return Value::from(n);
    }
    if let Ok(Some(f)) = row.get::<_, Option<f64>>(idx) {
        return float(f);
    }
    if let Ok(Some(b)) = row.get::<_, Option<bool>>(idx) {
        return Value::Bool(b);
    }
    if let Ok(Some(s)) = row.get::<_, Option<String>>(idx) {
        return Value::String(s);
    }
    Value::Null
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}
