//! Extraction instruction sent with every sheet image.
//!
//! The instruction is built from [`crate::schema::Column`] so the keys the
//! model is asked for can never drift from the keys the aggregator expects.
//! Callers can override it via
//! [`crate::config::ExtractionConfig::instruction`]; the default here is used
//! only when no override is provided.

use crate::schema::Column;

const INSTRUCTION_HEAD: &str = r#"You are reading a scanned "Ficha de Apropriação" (appropriation sheet): a handwritten construction form recording material and service quantities per road segment.

Extract the handwritten values and return ONLY a JSON object with exactly these keys:
"#;

const INSTRUCTION_RULES: &str = r#"
Rules:
- Transcribe exactly what is handwritten. Do not guess or complete missing values.
- If a field is blank or illegible, use an empty string "".
- Convert QUANTITY to a number where possible.
- Output only the JSON object. No commentary, no markdown fences."#;

/// Build the default extraction instruction.
///
/// Each key line also carries the printed form label so the model can find
/// the field on the sheet.
pub fn default_instruction() -> String {
    let mut out = String::from(INSTRUCTION_HEAD);
    for col in Column::ALL {
        out.push_str(&format!("- {} (form label: \"{}\")\n", col.name(), col.form_label()));
    }
    out.push_str(INSTRUCTION_RULES);
    out
}
