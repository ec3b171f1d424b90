//! Driver row to JSON mapping.
//!
//! Rows are handed back to callers as `serde_json::Map<String, Value>`.
//! Conversion is two-phase: `TypeCategory` classifies the column's declared
//! type, then a driver-specific decoder extracts the value. Decode failures
//! degrade to `Null` rather than failing a whole result set.

use crate::config::{DriverKind, FetchShape};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};

/// A fetched row keyed by column name.
pub type RowMap = serde_json::Map<String, JsonValue>;

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, driver: DriverKind) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric first, these overlap with the float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity is a float in practice
        if driver == DriverKind::Sqlite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") {
        return TypeCategory::Text;
    }

    // Dates, times, enums and everything else render as text
    TypeCategory::Unknown
}

/// Wrapper for raw DECIMAL/NUMERIC values as strings, preserving the exact
/// database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Encode binary column data as base64 text.
fn encode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

/// Conversion from a driver row to a JSON map, keyed per [`FetchShape`].
pub trait ToRowMap {
    fn to_row_map(&self, shape: FetchShape) -> RowMap;

    /// First column of the row rendered as a string, for scalar reads.
    ///
    /// Works on the driver row directly because the map loses column order:
    /// its keys are sorted, so "first entry" is not "first column".
    fn first_cell(&self) -> Option<String>;
}

/// Map key for one column under the given fetch shape.
fn row_key(shape: FetchShape, idx: usize, name: &str) -> String {
    match shape {
        FetchShape::Assoc => name.to_string(),
        FetchShape::Indexed => idx.to_string(),
    }
}

/// Render a decoded value the way a scalar fetch would.
fn render_cell(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl ToRowMap for MySqlRow {
    fn to_row_map(&self, shape: FetchShape) -> RowMap {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DriverKind::MySql);
                (
                    row_key(shape, idx, col.name()),
                    mysql::decode_column(self, idx, category),
                )
            })
            .collect()
    }

    fn first_cell(&self) -> Option<String> {
        let col = self.columns().first()?;
        let category = categorize_type(col.type_info().name(), DriverKind::MySql);
        render_cell(mysql::decode_column(self, 0, category))
    }
}

impl ToRowMap for SqliteRow {
    fn to_row_map(&self, shape: FetchShape) -> RowMap {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DriverKind::Sqlite);
                (
                    row_key(shape, idx, col.name()),
                    sqlite::decode_column(self, idx, category),
                )
            })
            .collect()
    }

    fn first_cell(&self) -> Option<String> {
        let col = self.columns().first()?;
        let category = categorize_type(col.type_info().name(), DriverKind::Sqlite);
        render_cell(sqlite::decode_column(self, 0, category))
    }
}

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                JsonValue::Null
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        // BIGINT UNSIGNED does not fit i64
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        JsonValue::Null
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return serde_json::Number::from_f64(v as f64)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string()));
        }
        JsonValue::Null
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| encode_binary_value(&v))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return JsonValue::String(v);
        }
        // MySQL reports some text columns as bytes depending on collation
        if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return match String::from_utf8(v) {
                Ok(s) => JsonValue::String(s),
                Err(e) => encode_binary_value(e.as_bytes()),
            };
        }
        JsonValue::Null
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::Number(v.into()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .and_then(|v| serde_json::Number::from_f64(v).map(JsonValue::Number))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_binary(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| encode_binary_value(&v))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> JsonValue {
        // SQLite columns are dynamically typed; fall through the likely shapes
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return JsonValue::String(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null);
        }
        if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return encode_binary_value(&v);
        }
        JsonValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_integers() {
        assert_eq!(
            categorize_type("BIGINT", DriverKind::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", DriverKind::Sqlite),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYINT", DriverKind::MySql),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_decimal_vs_sqlite_numeric() {
        assert_eq!(
            categorize_type("DECIMAL", DriverKind::MySql),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", DriverKind::Sqlite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_text_and_binary() {
        assert_eq!(
            categorize_type("VARCHAR", DriverKind::MySql),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("BLOB", DriverKind::Sqlite),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("DATETIME", DriverKind::MySql),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_row_key_by_shape() {
        assert_eq!(row_key(FetchShape::Assoc, 3, "name"), "name");
        assert_eq!(row_key(FetchShape::Indexed, 3, "name"), "3");
    }

    #[test]
    fn test_render_cell_shapes() {
        assert_eq!(render_cell(JsonValue::Null), None);
        assert_eq!(
            render_cell(JsonValue::String("x".into())),
            Some("x".to_string())
        );
        assert_eq!(
            render_cell(JsonValue::Number(7.into())),
            Some("7".to_string())
        );
        assert_eq!(render_cell(JsonValue::Bool(true)), Some("true".to_string()));
    }
}
