use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use addonkit_core::{AddonName, DESCRIPTOR_FILE};

pub const LEDGER_FILE: &str = "addons.lock.toml";
pub const CONFIG_FILE: &str = "addonkit.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonLayout {
    root: PathBuf,
    package_dir: PathBuf,
    addons_dir: PathBuf,
}

impl AddonLayout {
    /// Default layout: `<root>/packages` for archives, `<root>/addons` for
    /// installed addons.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            package_dir: root.join("packages"),
            addons_dir: root.join("addons"),
            root,
        }
    }

    pub fn with_package_dir(mut self, package_dir: impl Into<PathBuf>) -> Self {
        self.package_dir = package_dir.into();
        self
    }

    pub fn with_addons_dir(mut self, addons_dir: impl Into<PathBuf>) -> Self {
        self.addons_dir = addons_dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    pub fn addons_dir(&self) -> &Path {
        &self.addons_dir
    }

    pub fn addon_dir(&self, name: &AddonName) -> PathBuf {
        self.addons_dir.join(name.as_str())
    }

    pub fn descriptor_path(&self, name: &AddonName) -> PathBuf {
        self.addon_dir(name).join(DESCRIPTOR_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.addons_dir.join(LEDGER_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".addonkit")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.state_dir().join("locks")
    }

    pub fn lock_path(&self, name: &AddonName) -> PathBuf {
        self.locks_dir().join(format!("{}.lock", name.as_str()))
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [
            self.package_dir.clone(),
            self.addons_dir.clone(),
            self.locks_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
