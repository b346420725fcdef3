use serde::{Deserialize, Serialize};

/// Deployment mode of the host process.
///
/// Only `Development` and `Test` count as explicitly non-production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Production,
    Development,
    Test,
}

impl RuntimeEnvironment {
    /// Case-insensitive parse. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" => Some(RuntimeEnvironment::Production),
            "development" => Some(RuntimeEnvironment::Development),
            "test" => Some(RuntimeEnvironment::Test),
            _ => None,
        }
    }

    /// Whether error stacks may leave the guard boundary.
    pub fn exposes_stacks(&self) -> bool {
        !matches!(self, RuntimeEnvironment::Production)
    }
}
