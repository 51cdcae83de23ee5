//! Recovers a JSON object from free-form model output.
//!
//! Models wrap JSON in prose, markdown fences, or truncate it. The strategies
//! below run in order and the first one that yields a parseable object wins.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, trace};

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap());

static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").unwrap());

/// Which strategy recovered the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    Direct,
    JsonCodeBlock,
    BalancedBraces,
    ArrayFragment,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Direct => "direct",
            ExtractionMethod::JsonCodeBlock => "json_code_block",
            ExtractionMethod::BalancedBraces => "balanced_braces",
            ExtractionMethod::ArrayFragment => "array_fragment",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// No strategy produced a JSON object.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("Model output is empty")]
    Empty,

    #[error("No JSON object found in model output: {reason}")]
    NotFound {
        reason: String,
        /// Last cleanup strategy that isolated candidate text, if any.
        cleaned_by: Option<ExtractionMethod>,
    },
}

impl ExtractError {
    /// Name of the cleanup that was tried, or `"none"` when only the raw
    /// text was parsed.
    pub fn cleaning_method(&self) -> &'static str {
        match self {
            ExtractError::NotFound { cleaned_by: Some(method), .. } => method.as_str(),
            _ => "none",
        }
    }
}

/// A recovered object plus the strategy that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub object: Map<String, Value>,
    pub method: ExtractionMethod,
}

type Strategy = fn(&str, &[&str]) -> Option<String>;

const STRATEGIES: [(ExtractionMethod, Strategy); 4] = [
    (ExtractionMethod::Direct, direct),
    (ExtractionMethod::JsonCodeBlock, fenced),
    (ExtractionMethod::BalancedBraces, balanced_object),
    (ExtractionMethod::ArrayFragment, array_fragment),
];

/// Runs the strategies in order.
///
/// `array_keys` names the arrays worth salvaging on their own (for example
/// `"countries"`) when the surrounding object is broken.
pub fn extract_object(text: &str, array_keys: &[&str]) -> Result<Extracted, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }

    let mut last_error = String::from("no candidate text");
    let mut cleaned_by = None;

    for (method, strategy) in STRATEGIES {
        let Some(candidate) = strategy(text, array_keys) else {
            trace!("Strategy {} found nothing", method);
            continue;
        };
        if method != ExtractionMethod::Direct {
            cleaned_by = Some(method);
        }

        match serde_json::from_str::<Value>(&candidate) {
            Ok(Value::Object(object)) => {
                debug!("Recovered model output via {}", method);
                return Ok(Extracted { object, method });
            }
            Ok(other) => {
                last_error = format!("expected a JSON object, found {}", json_kind(&other));
            }
            Err(e) => {
                trace!("Strategy {} candidate did not parse: {}", method, e);
                last_error = e.to_string();
            }
        }
    }

    Err(ExtractError::NotFound { reason: last_error, cleaned_by })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn direct(text: &str, _: &[&str]) -> Option<String> {
    Some(text.trim().to_string())
}

fn fenced(text: &str, _: &[&str]) -> Option<String> {
    JSON_FENCE
        .captures(text)
        .or_else(|| ANY_FENCE.captures(text))
        .map(|c| c[1].to_string())
}

fn balanced_object(text: &str, _: &[&str]) -> Option<String> {
    let start = text.find('{')?;
    balanced_span(&text[start..], '{', '}').map(String::from)
}

fn array_fragment(text: &str, array_keys: &[&str]) -> Option<String> {
    array_keys.iter().find_map(|key| {
        let quoted = format!("\"{}\"", key);
        let at = text.find(&quoted)?;
        let rest = &text[at + quoted.len()..];
        let rest = rest.trim_start().strip_prefix(':')?.trim_start();
        if !rest.starts_with('[') {
            return None;
        }
        let array = balanced_span(rest, '[', ']')?;
        Some(format!("{{{}: {}}}", quoted, array))
    })
}

/// Returns the prefix of `text` (which starts with `open`) up to and
/// including its matching `close`, skipping delimiters inside strings.
fn balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: &[&str] = &["countries", "candidates"];

    #[test]
    fn test_direct() {
        let got = extract_object(r#" {"countries": []} "#, KEYS).unwrap();
        assert_eq!(got.method, ExtractionMethod::Direct);
        assert!(got.object["countries"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_json_fence_preferred() {
        let text = "Here you go:\n```\nnot this\n```\n```json\n{\"a\": 1}\n```";
        let got = extract_object(text, KEYS).unwrap();
        assert_eq!(got.method, ExtractionMethod::JsonCodeBlock);
        assert_eq!(got.object["a"], 1);
    }

    #[test]
    fn test_plain_fence() {
        let text = "```\n{\"candidates\": [{\"hs_code\": \"950300\"}]}\n```";
        let got = extract_object(text, KEYS).unwrap();
        assert_eq!(got.method, ExtractionMethod::JsonCodeBlock);
        assert_eq!(got.object["candidates"][0]["hs_code"], "950300");
    }

    #[test]
    fn test_balanced_braces_in_prose() {
        let text = r#"Sure! The answer is {"note": "use {braces} freely", "n": {"x": 2}} hope that helps"#;
        let got = extract_object(text, KEYS).unwrap();
        assert_eq!(got.method, ExtractionMethod::BalancedBraces);
        assert_eq!(got.object["note"], "use {braces} freely");
        assert_eq!(got.object["n"]["x"], 2);
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let text = r#"prefix {"reasoning": "the \"made in\" label}", "ok": true} suffix"#;
        let got = extract_object(text, KEYS).unwrap();
        assert_eq!(got.object["ok"], true);
    }

    #[test]
    fn test_array_fragment_from_truncated_object() {
        let text = r#"{"countries": [{"country": "China", "confidence": 0.7}], "notes": "cut off here"#;
        let got = extract_object(text, KEYS).unwrap();
        assert_eq!(got.method, ExtractionMethod::ArrayFragment);
        assert_eq!(got.object["countries"][0]["country"], "China");
    }

    #[test]
    fn test_not_found() {
        let err = extract_object("I cannot determine the origin of this product.", KEYS).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { cleaned_by: None, .. }));
        assert_eq!(err.cleaning_method(), "none");
    }

    #[test]
    fn test_not_found_reports_cleanup_tried() {
        let err = extract_object("```json\n{broken\n```", KEYS).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::NotFound { cleaned_by: Some(ExtractionMethod::JsonCodeBlock), .. }
        ));
        assert_eq!(err.cleaning_method(), "json_code_block");

        let err = extract_object(r#"note {"countries": [oops]} end"#, KEYS).unwrap_err();
        assert_eq!(err.cleaning_method(), "array_fragment");
    }

    #[test]
    fn test_top_level_array_rejected() {
        let err = extract_object("[1, 2, 3]", &[]).unwrap_err();
        assert_eq!(
            err,
            ExtractError::NotFound {
                reason: "expected a JSON object, found an array".to_string(),
                cleaned_by: None,
            }
        );
    }

    #[test]
    fn test_empty() {
        let err = extract_object("   ", KEYS).unwrap_err();
        assert_eq!(err, ExtractError::Empty);
        assert_eq!(err.cleaning_method(), "none");
    }

    #[test]
    fn test_method_names() {
        assert_eq!(ExtractionMethod::Direct.to_string(), "direct");
        assert_eq!(ExtractionMethod::ArrayFragment.as_str(), "array_fragment");
    }
}
