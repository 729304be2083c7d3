use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

pub const DESCRIPTOR_FILE: &str = "info.ini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddonState {
    Enabled,
    Disabled,
}

impl AddonState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }

    /// Only an explicit off value disables an addon; anything else,
    /// including an empty value, counts as enabled.
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "0" | "false" | "off" | "no" | "disabled" => Self::Disabled,
            _ => Self::Enabled,
        }
    }
}

/// Parsed `info.ini` descriptor of one addon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonMetadata {
    pub name: String,
    pub version: String,
    pub state: AddonState,
    /// Top-level keys, including `name`, `version` and `state`.
    pub fields: BTreeMap<String, String>,
    pub sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl AddonMetadata {
    pub fn descriptor_path(addon_dir: &Path) -> PathBuf {
        addon_dir.join(DESCRIPTOR_FILE)
    }

    pub fn load(addon_dir: &Path) -> Result<Self> {
        let path = Self::descriptor_path(addon_dir);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read addon descriptor: {}", path.display()))?;
        Self::from_ini_str(&raw)
            .with_context(|| format!("failed to parse addon descriptor: {}", path.display()))
    }

    pub fn from_ini_str(input: &str) -> Result<Self> {
        let mut fields = BTreeMap::new();
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current_section: Option<String> = None;

        for (index, line) in input.lines().enumerate() {
            let line = line.trim().trim_start_matches('\u{feff}');
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let section = header
                    .strip_suffix(']')
                    .ok_or_else(|| anyhow!("unterminated section header on line {}", index + 1))?
                    .trim();
                if section.is_empty() {
                    return Err(anyhow!("empty section header on line {}", index + 1));
                }
                sections.entry(section.to_string()).or_default();
                current_section = Some(section.to_string());
                continue;
            }

            let (raw_key, raw_value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("expected 'key = value' on line {}", index + 1))?;
            let key = raw_key.trim();
            if key.is_empty() {
                return Err(anyhow!("empty key on line {}", index + 1));
            }
            let value = unquote(raw_value.trim()).to_string();

            match &current_section {
                Some(section) => {
                    sections
                        .entry(section.clone())
                        .or_default()
                        .insert(key.to_string(), value);
                }
                None => {
                    fields.insert(key.to_string(), value);
                }
            }
        }

        let name = required_field(&fields, "name")?;
        let version = required_field(&fields, "version")?;
        let state = fields
            .get("state")
            .map(|value| AddonState::parse(value))
            .unwrap_or(AddonState::Enabled);

        Ok(Self {
            name,
            version,
            state,
            fields,
            sections,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.state == AddonState::Enabled
    }
}

fn required_field(fields: &BTreeMap<String, String>, key: &str) -> Result<String> {
    let value = fields
        .get(key)
        .ok_or_else(|| anyhow!("missing required field: {key}"))?;
    if value.is_empty() {
        return Err(anyhow!("required field is empty: {key}"));
    }
    Ok(value.clone())
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
