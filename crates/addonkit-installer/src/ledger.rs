use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fs_utils::write_atomic;

/// Installed addon name to installed version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub addons: BTreeMap<String, String>,
}

impl Ledger {
    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.addons.get(name).map(String::as_str)
    }

    fn to_toml_string(&self) -> Result<String> {
        let body = toml::to_string(self).context("failed to serialize addon ledger")?;
        Ok(format!(
            "# Managed by addonkit. Installed addon name -> version.\n{}",
            if self.addons.is_empty() {
                "[addons]\n".to_string()
            } else {
                body
            }
        ))
    }
}

/// Reads and rewrites the ledger file. Every write replaces the whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the ledger, creating an empty ledger file when none exists.
    pub fn load(&self) -> Result<Ledger> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let ledger = Ledger::default();
                self.save(&ledger)?;
                return Ok(ledger);
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read addon ledger: {}", self.path.display())
                });
            }
        };

        toml::from_str(&raw)
            .with_context(|| format!("failed to parse addon ledger: {}", self.path.display()))
    }

    /// Loads the ledger without creating anything; a missing file reads as
    /// empty.
    pub fn read(&self) -> Result<Ledger> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => toml::from_str(&raw)
                .with_context(|| format!("failed to parse addon ledger: {}", self.path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Ledger::default()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read addon ledger: {}", self.path.display())),
        }
    }

    /// Upserts `entries`; an existing version for the same name is replaced.
    pub fn merge<I, K, V>(&self, entries: I) -> Result<Ledger>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut ledger = self.load()?;
        for (name, version) in entries {
            ledger.addons.insert(name.into(), version.into());
        }
        self.save(&ledger)?;
        Ok(ledger)
    }

    /// Drops `keys`; keys that are not present are ignored.
    pub fn subtract<I, K>(&self, keys: I) -> Result<Ledger>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut ledger = self.load()?;
        for key in keys {
            ledger.addons.remove(key.as_ref());
        }
        self.save(&ledger)?;
        Ok(ledger)
    }

    fn save(&self, ledger: &Ledger) -> Result<()> {
        let payload = ledger.to_toml_string()?;
        write_atomic(&self.path, payload.as_bytes())
            .with_context(|| format!("failed to write addon ledger: {}", self.path.display()))
    }
}
