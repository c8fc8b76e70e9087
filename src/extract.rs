//! Pull a JSON payload out of free-text model output.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{InsightError, Result};

/// Characters of the trimmed input kept in a `MalformedResponse` preview.
pub const PREVIEW_CHARS: usize = 200;

const FENCE: &str = "```";
const JSON_TAG: &str = "json";

/// Strip one surrounding Markdown code fence, with or without a language tag.
///
/// Text that does not start with a fence is returned trimmed and otherwise
/// untouched, so the function is idempotent.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix(FENCE) else {
        return trimmed;
    };

    let tag_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')))
        .unwrap_or(rest.len());
    // A tag counts when only blanks follow it on the opener line. A `json`
    // tag is also dropped when the body is glued straight onto it.
    let after_tag = rest[tag_len..].trim_start_matches([' ', '\t']);
    let body = if tag_len > 0 && (after_tag.is_empty() || after_tag.starts_with(['\n', '\r'])) {
        after_tag
    } else if rest.get(..JSON_TAG.len()).is_some_and(|t| t.eq_ignore_ascii_case(JSON_TAG)) {
        &rest[JSON_TAG.len()..]
    } else {
        rest
    };

    let body = body.trim();
    body.strip_suffix(FENCE).unwrap_or(body).trim()
}

/// Parse model text as JSON after fence stripping.
pub fn extract_value(text: Option<&str>) -> Result<Value> {
    let raw = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(InsightError::EmptyResponse),
    };

    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(InsightError::EmptyResponse);
    }

    serde_json::from_str(body).map_err(|e| InsightError::MalformedResponse {
        preview: raw.trim().chars().take(PREVIEW_CHARS).collect(),
        reason: e.to_string(),
    })
}

/// Parse and decode into `T`. Shape failures are `SchemaMismatch`, not `MalformedResponse`.
pub fn extract<T: DeserializeOwned>(text: Option<&str>) -> Result<T> {
    let value = extract_value(text)?;
    serde_json::from_value(value).map_err(|e| InsightError::SchemaMismatch {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_fence_variants_yield_same_value() {
        let inputs = [
            "```json\n{\"a\":1}\n```",
            "```\n{\"a\":1}\n```",
            "{\"a\":1}",
            "  ```JSON\r\n{\"a\":1}\r\n```  ",
            "```json \n{\"a\":1}\n```",
            "```json\t\r\n{\"a\":1}\n```",
            "```json{\"a\":1}```",
        ];
        for input in inputs {
            assert_eq!(extract_value(Some(input)).unwrap(), json!({"a": 1}), "{input:?}");
        }
    }

    #[test]
    fn test_strip_is_idempotent() {
        let once = strip_code_fence("```json\n{\"a\":1}\n```");
        assert_eq!(strip_code_fence(once), once);
    }

    #[test]
    fn test_single_line_fence_without_tag() {
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_empty_inputs() {
        for input in [None, Some(""), Some("   \n\t ")] {
            assert!(matches!(extract_value(input), Err(InsightError::EmptyResponse)));
        }
    }

    #[test]
    fn test_fence_with_nothing_inside_is_empty() {
        assert!(matches!(
            extract_value(Some("```json\n```")),
            Err(InsightError::EmptyResponse)
        ));
    }

    #[test]
    fn test_malformed_preview_is_first_200_chars() {
        match extract_value(Some("not json")) {
            Err(InsightError::MalformedResponse { preview, .. }) => assert_eq!(preview, "not json"),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }

        let long = format!("  {}  ", "ب".repeat(450));
        match extract_value(Some(&long)) {
            Err(InsightError::MalformedResponse { preview, .. }) => {
                assert_eq!(preview.chars().count(), PREVIEW_CHARS);
                assert_eq!(preview, "ب".repeat(PREVIEW_CHARS));
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[derive(Debug, Deserialize)]
    struct Shape {
        ok: bool,
        #[serde(default)]
        notes: Vec<String>,
    }

    #[test]
    fn test_typed_extract_tolerates_missing_defaulted_keys() {
        let shape: Shape = extract(Some("{\"ok\":true}")).unwrap();
        assert!(shape.ok);
        assert!(shape.notes.is_empty());
    }

    #[test]
    fn test_typed_extract_reports_schema_mismatch() {
        let err = extract::<Shape>(Some("{\"ok\":\"yes\"}")).unwrap_err();
        assert!(matches!(err, InsightError::SchemaMismatch { .. }));

        let err = extract::<Shape>(Some("[1,2,3]")).unwrap_err();
        assert!(matches!(err, InsightError::SchemaMismatch { .. }));
    }
}
