//! Columnar snapshots returned by the directory service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which of the two directory datasets a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Primary,
    Unavailable,
}

impl DatasetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell. Nested JSON is flattened into its textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl CellValue {
    /// False for null, empty text, `false` and numeric zero.
    pub fn has_value(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            Self::Text(s) => !s.is_empty(),
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<serde_json::Value> for CellValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::Text(s),
            nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Text(nested.to_string())
            }
        }
    }
}

impl From<CellValue> for serde_json::Value {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Bool(b) => serde_json::Value::Bool(b),
            CellValue::Number(n) => serde_json::Value::Number(n),
            CellValue::Text(s) => serde_json::Value::String(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, CellValue>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.0.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

impl Column {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            friendly_name: None,
        }
    }
}

/// One wholesale dump of a directory query: columns and rows always come
/// from the same fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{CellValue, Dataset, Row};

    #[test]
    fn cells_decode_from_heterogeneous_json() {
        let rows: Vec<Row> = serde_json::from_value(serde_json::json!([
            { "nit": 901234567, "nombre": "ACME S.A.S", "activo": true, "notas": null,
              "tags": ["a", "b"] }
        ]))
        .expect("rows decode");

        let row = &rows[0];
        assert_eq!(row.get("nit"), Some(&CellValue::from(901234567_i64)));
        assert_eq!(row.get("nombre"), Some(&CellValue::from("ACME S.A.S")));
        assert_eq!(row.get("activo"), Some(&CellValue::Bool(true)));
        assert_eq!(row.get("notas"), Some(&CellValue::Null));
        assert_eq!(
            row.get("tags"),
            Some(&CellValue::Text("[\"a\",\"b\"]".to_string()))
        );
    }

    #[test]
    fn has_value_follows_blank_semantics() {
        assert!(!CellValue::Null.has_value());
        assert!(!CellValue::from("").has_value());
        assert!(!CellValue::from(0_i64).has_value());
        assert!(!CellValue::Bool(false).has_value());
        assert!(CellValue::from(" ").has_value());
        assert!(CellValue::from(12_i64).has_value());
    }

    #[test]
    fn numbers_render_without_decoration() {
        assert_eq!(CellValue::from(12345678_i64).to_display_string(), "12345678");
        let float: CellValue = serde_json::from_value(serde_json::json!(1.5)).expect("decode");
        assert_eq!(float.to_display_string(), "1.5");
    }

    #[test]
    fn dataset_round_trips_column_type_field() {
        let dataset: Dataset = serde_json::from_value(serde_json::json!({
            "columns": [{ "name": "nit", "type": "integer", "friendly_name": "NIT" }],
            "rows": []
        }))
        .expect("dataset decode");
        assert_eq!(dataset.columns[0].kind.as_deref(), Some("integer"));
        assert!(dataset.is_empty());
        let encoded = serde_json::to_value(&dataset).expect("encode");
        assert_eq!(encoded["columns"][0]["type"], "integer");
    }
}
