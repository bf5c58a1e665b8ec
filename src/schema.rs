//! The canonical column schema of an appropriation sheet.
//!
//! Every exported table carries exactly these fourteen columns, in this order,
//! whatever keys the model happened to return. Each column also knows the
//! label printed on the paper form, which models sometimes echo back instead
//! of the canonical key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One field of an appropriation sheet, in canonical export order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Column {
    Date,
    ServiceFront,
    Direction,
    Station,
    Material,
    Unit,
    Quantity,
    Service,
    StartStation,
    EndStation,
    LengthM,
    WidthM,
    HeightM,
    Notes,
}

impl Column {
    /// All columns in canonical order.
    pub const ALL: [Column; 14] = [
        Column::Date,
        Column::ServiceFront,
        Column::Direction,
        Column::Station,
        Column::Material,
        Column::Unit,
        Column::Quantity,
        Column::Service,
        Column::StartStation,
        Column::EndStation,
        Column::LengthM,
        Column::WidthM,
        Column::HeightM,
        Column::Notes,
    ];

    /// Canonical key, used as the JSON key requested from the model and as
    /// the spreadsheet header.
    pub const fn name(self) -> &'static str {
        match self {
            Column::Date => "DATE",
            Column::ServiceFront => "SERVICE_FRONT",
            Column::Direction => "DIRECTION",
            Column::Station => "STATION",
            Column::Material => "MATERIAL",
            Column::Unit => "UNIT",
            Column::Quantity => "QUANTITY",
            Column::Service => "SERVICE",
            Column::StartStation => "START_STATION",
            Column::EndStation => "END_STATION",
            Column::LengthM => "LENGTH_M",
            Column::WidthM => "WIDTH_M",
            Column::HeightM => "HEIGHT_M",
            Column::Notes => "NOTES",
        }
    }

    /// Label as printed on the paper form.
    pub const fn form_label(self) -> &'static str {
        match self {
            Column::Date => "DATA",
            Column::ServiceFront => "FRENTE DE SERVIÇO",
            Column::Direction => "SENTIDO",
            Column::Station => "ESTACA",
            Column::Material => "MATERIAL",
            Column::Unit => "UNID.",
            Column::Quantity => "QUANT.",
            Column::Service => "SERVIÇO",
            Column::StartStation => "ESTACA INICIAL",
            Column::EndStation => "ESTACA FINAL",
            Column::LengthM => "COMP.(m)",
            Column::WidthM => "LARG.(m)",
            Column::HeightM => "ALTURA(m)",
            Column::Notes => "OBS:",
        }
    }

    /// Position of this column in [`Column::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Resolve a key returned by the model to a column.
    ///
    /// Matches the canonical name or the form label, ignoring case,
    /// surrounding whitespace, and the difference between `_`, `-` and space.
    pub fn from_key(key: &str) -> Option<Column> {
        let wanted = fold_key(key);
        if wanted.is_empty() {
            return None;
        }
        Column::ALL.into_iter().find(|col| {
            fold_key(col.name()) == wanted || fold_key(col.form_label()) == wanted
        })
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical header names, in order.
pub fn canonical_headers() -> [&'static str; 14] {
    Column::ALL.map(Column::name)
}

fn fold_key(key: &str) -> String {
    key.trim()
        .trim_end_matches(':')
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
