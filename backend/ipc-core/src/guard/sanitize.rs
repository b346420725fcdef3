//! Recursive string scrubbing for handler arguments.
//!
//! Strings lose every `<script>...</script>` block and every
//! `javascript:` / `data:` / `vbscript:` scheme marker (case-insensitive),
//! then get trimmed. Arrays and objects are scrubbed element- and field-wise;
//! object keys, numbers, booleans and null pass through.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const SCRIPT_BLOCK_PATTERN: &str = r"(?is)<script\b[^>]*>.*?</script\s*>";
const SCRIPT_SCHEME_PATTERN: &str = r"(?i)(?:javascript|data|vbscript):";

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(SCRIPT_BLOCK_PATTERN).expect("valid regex pattern"));
static SCRIPT_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(SCRIPT_SCHEME_PATTERN).expect("valid regex pattern"));

pub fn sanitize_args(args: Vec<Value>) -> Vec<Value> {
    args.into_iter().map(sanitize_value).collect()
}

pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(sanitize_str(&text)),
        Value::Array(elements) => Value::Array(elements.into_iter().map(sanitize_value).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, field)| (key, sanitize_value(field)))
                .collect(),
        ),
        other => other,
    }
}

pub fn sanitize_str(text: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(text, "");
    let without_schemes = SCRIPT_SCHEME.replace_all(&without_scripts, "");
    without_schemes.trim().to_string()
}
