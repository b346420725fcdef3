//! Positional argument validation against [`ValidationSchema`]s.
//!
//! Walks depth-first and stops at the first violation. Paths read like
//! `argument[1].title` or `argument[0].tags[2]`.

use crate::error::guard::GuardError;

use common::ErrorLocation;
use models::ValidationSchema;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

struct Violation {
    field: String,
    reason: String,
}

/// Validate `args[i]` against `schemas[i]`. Arguments without a schema pass.
#[track_caller]
pub fn validate_args(args: &[Value], schemas: &[ValidationSchema]) -> Result<(), GuardError> {
    for (index, schema) in schemas.iter().enumerate() {
        let path = format!("argument[{index}]");
        if let Err(violation) = validate_value(args.get(index), schema, &path) {
            return Err(GuardError::Validation {
                field: violation.field,
                reason: violation.reason,
                location: ErrorLocation::from(Location::caller()),
            });
        }
    }

    Ok(())
}

fn validate_value(
    value: Option<&Value>,
    schema: &ValidationSchema,
    path: &str,
) -> Result<(), Violation> {
    let value = match value {
        None | Some(Value::Null) => {
            if schema.is_required() {
                return Err(violation(path, "is required"));
            }
            return Ok(());
        }
        Some(value) => value,
    };

    match (schema, value) {
        (
            ValidationSchema::String {
                min_length,
                max_length,
                pattern,
                allowed,
                ..
            },
            Value::String(text),
        ) => {
            let length = text.chars().count();

            if let Some(min) = min_length.filter(|min| length < *min) {
                return Err(violation(path, format!("must be at least {min} characters")));
            }

            if let Some(max) = max_length.filter(|max| length > *max) {
                return Err(violation(path, format!("must be at most {max} characters")));
            }

            if let Some(pattern) = pattern {
                check_pattern(text, pattern, path)?;
            }

            if let Some(allowed) = allowed {
                if !allowed.iter().any(|candidate| candidate == text) {
                    return Err(violation(
                        path,
                        format!("must be one of [{}]", allowed.join(", ")),
                    ));
                }
            }

            Ok(())
        }
        (ValidationSchema::Number { .. }, Value::Number(_)) => Ok(()),
        (ValidationSchema::Boolean { .. }, Value::Bool(_)) => Ok(()),
        (ValidationSchema::Object { properties, .. }, Value::Object(fields)) => {
            for (name, property_schema) in properties {
                let property_path = format!("{path}.{name}");
                validate_value(fields.get(name), property_schema, &property_path)?;
            }
            Ok(())
        }
        (ValidationSchema::Array { items, .. }, Value::Array(elements)) => {
            if let Some(item_schema) = items {
                for (index, element) in elements.iter().enumerate() {
                    let element_path = format!("{path}[{index}]");
                    validate_value(Some(element), item_schema, &element_path)?;
                }
            }
            Ok(())
        }
        (schema, _) => Err(violation(
            path,
            format!("must be of type {}", schema.kind()),
        )),
    }
}

fn check_pattern(text: &str, pattern: &str, path: &str) -> Result<(), Violation> {
    let mut cache = PATTERN_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if !cache.contains_key(pattern) {
        let compiled = Regex::new(pattern)
            .map_err(|e| violation(path, format!("has an invalid pattern: {e}")))?;
        cache.insert(pattern.to_string(), compiled);
    }

    match cache.get(pattern) {
        Some(regex) if regex.is_match(text) => Ok(()),
        _ => Err(violation(path, format!("does not match pattern {pattern}"))),
    }
}

fn violation(path: &str, reason: impl Into<String>) -> Violation {
    Violation {
        field: path.to_string(),
        reason: reason.into(),
    }
}
