use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which addon-provided capability was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Install,
    DataImport,
    Uninstall,
}

impl HookPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::DataImport => "data-import",
            Self::Uninstall => "uninstall",
        }
    }
}

#[derive(Debug, Error)]
pub enum AddonError {
    #[error("invalid addon name {raw:?}: {reason}")]
    InvalidName { raw: String, reason: String },

    #[error("addon {name} not found: {detail}")]
    PackageNotFound { name: String, detail: String },

    #[error("addon {name} is already installed; confirm replacement with --yes")]
    AlreadyInstalled { name: String },

    #[error("addon {name} is busy: {detail}")]
    AddonBusy { name: String, detail: String },

    #[error("invalid package for addon {name}: {reason}")]
    InvalidPackage { name: String, reason: String },

    #[error("{} hook of addon {name} failed: {reason}", phase.as_str())]
    InstallHookFailed {
        name: String,
        phase: HookPhase,
        reason: String,
    },

    #[error("backup of addon {name} failed: {reason}")]
    BackupFailed { name: String, reason: String },

    #[error("permission denied writing {}", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("addon {name} is locked by another operation ({holder}); remove {} if no addonkit process is running", lock_path.display())]
    AddonLocked {
        name: String,
        holder: String,
        lock_path: PathBuf,
    },

    #[error("{cause}; rollback also failed: {rollback}")]
    RollbackFailed {
        cause: Box<AddonError>,
        rollback: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AddonError {
    /// Short machine-readable code, stable across message wording changes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "invalid-name",
            Self::PackageNotFound { .. } => "package-not-found",
            Self::AlreadyInstalled { .. } => "already-installed",
            Self::AddonBusy { .. } => "addon-busy",
            Self::InvalidPackage { .. } => "invalid-package",
            Self::InstallHookFailed { .. } => "install-hook-failed",
            Self::BackupFailed { .. } => "backup-failed",
            Self::PermissionDenied { .. } => "permission-denied",
            Self::AddonLocked { .. } => "addon-locked",
            Self::RollbackFailed { .. } => "rollback-failed",
            Self::Other(_) => "internal",
        }
    }
}

/// Maps a ledger write failure onto the taxonomy, surfacing permission
/// problems as [`AddonError::PermissionDenied`].
pub(crate) fn ledger_write_error(path: PathBuf, err: anyhow::Error) -> AddonError {
    let permission_denied = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .find(|io_err| io_err.kind() == io::ErrorKind::PermissionDenied)
        .map(|io_err| io::Error::new(io_err.kind(), io_err.to_string()));

    match permission_denied {
        Some(source) => AddonError::PermissionDenied { path, source },
        None => AddonError::Other(err),
    }
}

/// Formats an error with its full cause chain on one line.
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
