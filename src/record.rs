//! Records as decoded from the model, and the normalized table built from them.

use crate::schema::Column;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded model response: whatever keys the model returned, unvalidated.
///
/// Unknown keys survive until [`crate::pipeline::aggregate::normalize`] maps
/// the record onto the canonical schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldRecord {
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl FieldRecord {
    pub fn new(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn empty() -> Self {
        FieldValue::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::empty()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// One normalized row: exactly one value per canonical column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    values: [FieldValue; 14],
}

impl ResultRow {
    pub fn new(values: [FieldValue; 14]) -> Self {
        Self { values }
    }

    pub fn get(&self, column: Column) -> &FieldValue {
        &self.values[column.index()]
    }

    pub fn set(&mut self, column: Column, value: FieldValue) {
        self.values[column.index()] = value;
    }

    /// `(column, value)` pairs in canonical order.
    pub fn cells(&self) -> impl Iterator<Item = (Column, &FieldValue)> {
        Column::ALL.into_iter().zip(self.values.iter())
    }

    /// Values in canonical order.
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }
}

/// The final table: rows in upload order, columns in canonical order.
///
/// Built once by [`crate::pipeline::aggregate::RecordAggregator::finalize`]
/// and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub(crate) fn from_rows(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn columns(&self) -> &'static [Column] {
        &Column::ALL
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by canonical column name.
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (col, value) in row.cells() {
                    let v = match value {
                        FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null),
                        FieldValue::Text(s) => serde_json::Value::String(s.clone()),
                    };
                    obj.insert(col.name().to_string(), v);
                }
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}
