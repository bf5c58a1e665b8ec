//! Record aggregation: collect parsed records in upload order and normalize
//! them onto the canonical column schema.

use crate::record::{FieldRecord, FieldValue, ResultRow, ResultTable};
use crate::schema::Column;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// `1.234`, `12.500`, `1.234.567`: dots grouping thousands, no decimal part.
static RE_DOTTED_THOUSANDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[1-9]\d{0,2}(\.\d{3})+$").unwrap());

/// Collects records in the order files were processed.
#[derive(Debug, Default)]
pub struct RecordAggregator {
    records: Vec<FieldRecord>,
}

impl RecordAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one successfully parsed record.
    pub fn accumulate(&mut self, record: FieldRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Normalize every record and freeze the table.
    ///
    /// Every row gets exactly the canonical columns in canonical order;
    /// missing columns are empty text and unrecognized keys are dropped.
    pub fn finalize(self) -> ResultTable {
        ResultTable::from_rows(self.records.iter().map(normalize).collect())
    }
}

/// Map one record onto the canonical schema.
pub fn normalize(record: &FieldRecord) -> ResultRow {
    let mut row = ResultRow::default();
    for col in Column::ALL {
        if let Some(value) = lookup(record, col) {
            row.set(col, to_field_value(col, value));
        }
    }
    row
}

/// Canonical key first, then any key that folds to this column.
fn lookup(record: &FieldRecord, col: Column) -> Option<&Value> {
    record.get(col.name()).or_else(|| {
        record
            .fields
            .iter()
            .find(|(k, _)| Column::from_key(k) == Some(col))
            .map(|(_, v)| v)
    })
}

fn to_field_value(col: Column, value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::empty(),
        Value::String(s) => {
            let s = s.trim();
            if col == Column::Quantity {
                if let Some(n) = coerce_number(s) {
                    return FieldValue::Number(n);
                }
            }
            FieldValue::Text(s.to_string())
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => FieldValue::Number(f),
            None => FieldValue::Text(n.to_string()),
        },
        Value::Bool(b) => FieldValue::Text(b.to_string()),
        Value::Array(_) | Value::Object(_) => FieldValue::Text(value.to_string()),
    }
}

/// Best-effort numeric reading of a handwritten quantity.
///
/// Reads the sheets' pt-BR notation: a comma is the decimal mark (`12,5`,
/// `1.234,5`) and dots followed by groups of three digits separate
/// thousands (`1.234` is 1234). A single dot followed by any other number
/// of digits is a decimal point (`12.5`). Anything else that is not a plain
/// finite number stays text.
pub fn coerce_number(s: &str) -> Option<f64> {
    let s: String = s.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return None;
    }
    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        (None, Some(_)) if RE_DOTTED_THOUSANDS.is_match(&s) => s.replace('.', ""),
        _ => s,
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}
