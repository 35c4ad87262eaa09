use serde::{Deserialize, Serialize};
use std::fmt;

/// Answer to a destructive operation: perform it, skip it, or ask the operator at startup.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyChoice {
    Yes,
    No,
    Ask,
}

impl fmt::Display for PolicyChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyChoice::Yes => f.write_str("yes"),
            PolicyChoice::No => f.write_str("no"),
            PolicyChoice::Ask => f.write_str("ask"),
        }
    }
}

/// Destructive operation policy applied when destination tables already exist.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PolicyConfig {
    /// Drop and recreate a table whose live columns differ from the declaration.
    #[serde(default = "default_choice")]
    pub recreate: PolicyChoice,
    /// Clear a table that already holds rows before loading.
    #[serde(default = "default_choice")]
    pub truncate: PolicyChoice,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            recreate: default_choice(),
            truncate: default_choice(),
        }
    }
}

fn default_choice() -> PolicyChoice {
    PolicyChoice::Yes
}
