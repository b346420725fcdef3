//! Declarative argument schemas for guarded handlers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Shape one positional argument (or nested value) must have.
///
/// The discriminant is explicit: arrays and objects are distinct kinds, and
/// only string schemas carry length/pattern/enum constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ValidationSchema {
    String {
        #[serde(default)]
        required: bool,
        #[serde(default)]
        min_length: Option<usize>,
        #[serde(default)]
        max_length: Option<usize>,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default, rename = "enum")]
        allowed: Option<Vec<String>>,
    },
    Number {
        #[serde(default)]
        required: bool,
    },
    Boolean {
        #[serde(default)]
        required: bool,
    },
    Object {
        #[serde(default)]
        required: bool,
        #[serde(default)]
        properties: BTreeMap<String, ValidationSchema>,
    },
    Array {
        #[serde(default)]
        required: bool,
        #[serde(default)]
        items: Option<Box<ValidationSchema>>,
    },
}

impl ValidationSchema {
    pub fn string() -> Self {
        ValidationSchema::String {
            required: false,
            min_length: None,
            max_length: None,
            pattern: None,
            allowed: None,
        }
    }

    pub fn number() -> Self {
        ValidationSchema::Number { required: false }
    }

    pub fn boolean() -> Self {
        ValidationSchema::Boolean { required: false }
    }

    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, ValidationSchema)>,
        K: Into<String>,
    {
        ValidationSchema::Object {
            required: false,
            properties: properties
                .into_iter()
                .map(|(name, schema)| (name.into(), schema))
                .collect(),
        }
    }

    pub fn array(items: ValidationSchema) -> Self {
        ValidationSchema::Array {
            required: false,
            items: Some(Box::new(items)),
        }
    }

    pub fn required(mut self) -> Self {
        match &mut self {
            ValidationSchema::String { required, .. }
            | ValidationSchema::Number { required }
            | ValidationSchema::Boolean { required }
            | ValidationSchema::Object { required, .. }
            | ValidationSchema::Array { required, .. } => *required = true,
        }
        self
    }

    /// Length bounds are in characters. Ignored on non-string schemas.
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        if let ValidationSchema::String {
            min_length,
            max_length,
            ..
        } = &mut self
        {
            *min_length = min;
            *max_length = max;
        }
        self
    }

    pub fn pattern(mut self, regex: impl Into<String>) -> Self {
        if let ValidationSchema::String { pattern, .. } = &mut self {
            *pattern = Some(regex.into());
        }
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let ValidationSchema::String { allowed, .. } = &mut self {
            *allowed = Some(values.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn is_required(&self) -> bool {
        match self {
            ValidationSchema::String { required, .. }
            | ValidationSchema::Number { required }
            | ValidationSchema::Boolean { required }
            | ValidationSchema::Object { required, .. }
            | ValidationSchema::Array { required, .. } => *required,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ValidationSchema::String { .. } => "string",
            ValidationSchema::Number { .. } => "number",
            ValidationSchema::Boolean { .. } => "boolean",
            ValidationSchema::Object { .. } => "object",
            ValidationSchema::Array { .. } => "array",
        }
    }
}
