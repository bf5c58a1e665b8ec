//! Response parsing: raw model text → [`FieldRecord`].
//!
//! Models asked for "only JSON" still wrap it in ```` ```json ```` fences
//! often enough that the fences are stripped unconditionally. Nothing else is
//! repaired: text that is not a JSON object after cleanup is a
//! [`ParseError`] for that one file.

use crate::error::ParseError;
use crate::record::FieldRecord;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_OPEN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").unwrap());

static RE_CLOSE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```\s*$").unwrap());

/// Strip surrounding whitespace, a byte-order mark, and outer code fences.
pub fn strip_code_fences(raw: &str) -> &str {
    let s = raw.trim().trim_start_matches('\u{FEFF}').trim();
    let start = RE_OPEN_FENCE.find(s).map(|m| m.end()).unwrap_or(0);
    let s = &s[start..];
    let end = RE_CLOSE_FENCE.find(s).map(|m| m.start()).unwrap_or(s.len());
    s[..end].trim()
}

/// Decode a model response into a record.
///
/// Unknown keys are kept; mapping onto the canonical columns happens in
/// [`crate::pipeline::aggregate`].
pub fn parse(raw: &str) -> Result<FieldRecord, ParseError> {
    let cleaned = strip_code_fences(raw);
    let value: serde_json::Value =
        serde_json::from_str(cleaned).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    match value {
        serde_json::Value::Object(map) => Ok(FieldRecord::new(map)),
        other => Err(ParseError::NotAnObject(json_kind(&other))),
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_and_bare_parse_identically() {
        let fenced = parse("```json\n{\"DATA\":\"1\"}\n```").unwrap();
        let bare = parse("{\"DATA\":\"1\"}").unwrap();
        assert_eq!(fenced, bare);
        assert_eq!(*bare.get("DATA").unwrap(), "1");
    }

    #[test]
    fn fence_without_language() {
        let r = parse("```\n{\"QUANTITY\": 4}\n```").unwrap();
        assert_eq!(*r.get("QUANTITY").unwrap(), 4);
    }

    #[test]
    fn fence_on_one_line_with_whitespace() {
        let r = parse("  ```json {\"UNIT\": \"m3\"} ```  \n").unwrap();
        assert_eq!(*r.get("UNIT").unwrap(), "m3");
    }

    #[test]
    fn crlf_fences() {
        let r = parse("```json\r\n{\"NOTES\": \"ok\"}\r\n```\r\n").unwrap();
        assert_eq!(*r.get("NOTES").unwrap(), "ok");
    }

    #[test]
    fn bom_is_ignored() {
        let r = parse("\u{FEFF}{\"DATE\": \"01/02/2024\"}").unwrap();
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn unknown_keys_pass_through() {
        let r = parse(r#"{"DATE": "", "SIGNATURE": "J. Silva"}"#).unwrap();
        assert_eq!(*r.get("SIGNATURE").unwrap(), "J. Silva");
    }

    #[test]
    fn not_json_is_parse_error() {
        let err = parse("not json").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn prose_around_json_is_parse_error() {
        let err = parse("Here is the data: {\"DATE\": \"x\"}").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn array_is_not_a_record() {
        let err = parse("```json\n[{\"DATE\": \"x\"}]\n```").unwrap_err();
        assert_eq!(err, ParseError::NotAnObject("an array"));
    }

    #[test]
    fn empty_response_is_parse_error() {
        assert!(parse("").is_err());
        assert!(parse("```json\n```").is_err());
    }

    #[test]
    fn strip_leaves_inner_backticks() {
        let s = strip_code_fences("```json\n{\"NOTES\": \"use `x`\"}\n```");
        assert_eq!(s, "{\"NOTES\": \"use `x`\"}");
    }
}
