use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use addonkit_core::NamePolicy;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::hooks::CommandImporter;
use crate::layout::AddonLayout;

pub const ROOT_ENV: &str = "ADDONKIT_ROOT";
pub const DEFAULT_IMPORT_SCRIPT: &str = "install.sql";

/// Contents of `addonkit.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddonkitConfig {
    pub package_dir: Option<PathBuf>,
    pub addons_dir: Option<PathBuf>,
    pub name_policy: NamePolicy,
    pub import_script: String,
    pub import: Option<ImportConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    /// Program followed by its arguments; the script arrives on stdin.
    pub command: Vec<String>,
    #[serde(default)]
    pub table_prefix: String,
}

impl Default for AddonkitConfig {
    fn default() -> Self {
        Self {
            package_dir: None,
            addons_dir: None,
            name_policy: NamePolicy::default(),
            import_script: DEFAULT_IMPORT_SCRIPT.to_string(),
            import: None,
        }
    }
}

impl AddonkitConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse addonkit config")?;
        let script = config.import_script.trim();
        if script.is_empty() {
            return Err(anyhow!("import_script must not be empty"));
        }
        if Path::new(script).is_absolute() || script.contains("..") {
            return Err(anyhow!(
                "import_script must be a path inside the addon directory: {script}"
            ));
        }
        if let Some(import) = &config.import {
            if import.command.is_empty() {
                return Err(anyhow!("[import] command must name a program"));
            }
        }
        Ok(config)
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw)
                .with_context(|| format!("invalid config file: {}", path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read config: {}", path.display()))
            }
        }
    }

    /// Layout under `root`, with configured relative paths resolved against it.
    pub fn layout(&self, root: &Path) -> AddonLayout {
        let mut layout = AddonLayout::new(root);
        if let Some(package_dir) = &self.package_dir {
            layout = layout.with_package_dir(root.join(package_dir));
        }
        if let Some(addons_dir) = &self.addons_dir {
            layout = layout.with_addons_dir(root.join(addons_dir));
        }
        layout
    }

    pub fn importer(&self) -> Result<Option<CommandImporter>> {
        self.import
            .as_ref()
            .map(|import| CommandImporter::new(&import.command, import.table_prefix.clone()))
            .transpose()
    }
}

/// `--root` wins, then `ADDONKIT_ROOT`, then the current directory.
pub fn resolve_root(cli_root: Option<&Path>) -> Result<PathBuf> {
    let env_root = std::env::var_os(ROOT_ENV).map(PathBuf::from);
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    Ok(select_root(cli_root, env_root.as_deref(), &cwd))
}

pub(crate) fn select_root(cli_root: Option<&Path>, env_root: Option<&Path>, cwd: &Path) -> PathBuf {
    let chosen = cli_root
        .or(env_root.filter(|value| !value.as_os_str().is_empty()))
        .unwrap_or(cwd);
    if chosen.is_absolute() {
        chosen.to_path_buf()
    } else {
        cwd.join(chosen)
    }
}
