use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// How raw addon names are folded before they are compared or used as path
/// segments. Configured once per installation area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamePolicy {
    #[default]
    Trim,
    Lowercase,
}

impl NamePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::Lowercase => "lowercase",
        }
    }

    pub fn normalize(self, raw: &str) -> Result<AddonName> {
        let trimmed = raw.trim();
        let folded = match self {
            Self::Trim => trimmed.to_string(),
            Self::Lowercase => trimmed.to_lowercase(),
        };
        AddonName::new(folded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddonName(String);

impl AddonName {
    /// Wraps an already-normalized name, rejecting values that cannot be a
    /// single path segment.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(anyhow!("addon name must not be empty"));
        }
        if value == "." || value == ".." {
            return Err(anyhow!("addon name must not be '{value}'"));
        }
        if value
            .chars()
            .any(|ch| ch == '/' || ch == '\\' || ch == '\0' || ch.is_control())
        {
            return Err(anyhow!(
                "addon name contains path separator or control character: {value:?}"
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AddonName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
