use std::path::PathBuf;

use crate::backup::BackupRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    Resolving,
    Unpacking,
    Validating,
    RunningHook,
    Committing,
    Done,
    Aborting,
    RolledBack,
}

impl TransactionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Unpacking => "unpacking",
            Self::Validating => "validating",
            Self::RunningHook => "running-hook",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Aborting => "aborting",
            Self::RolledBack => "rolled-back",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallRequest {
    pub name: String,
    pub version: Option<String>,
    pub backup_id: Option<String>,
    pub password: Option<String>,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    pub name: String,
    pub password: Option<String>,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveRequest {
    pub name: String,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupRequest {
    pub name: String,
    pub password: Option<String>,
    /// Defaults to the package directory.
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    pub previous_version: Option<String>,
    pub archive: PathBuf,
    /// Snapshot of the replaced installation, left in the package directory.
    pub backup: Option<BackupRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(InstallReport),
    Cancelled { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(InstallReport),
    UpToDate { name: String, version: String },
    Cancelled { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed { name: String, version: String },
    Cancelled { name: String },
}

/// One row of `list`: ledger state joined with what is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonStatus {
    pub name: String,
    pub ledger_version: Option<String>,
    pub installed_version: Option<String>,
    pub enabled: Option<bool>,
    pub available_versions: Vec<String>,
    pub backups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoctorFinding {
    /// Ledger lists the addon but its directory or descriptor is unusable.
    LedgerWithoutInstall { name: String, version: String },
    /// Installed with a valid descriptor but missing from the ledger.
    InstallWithoutLedger { name: String, version: String },
    VersionMismatch {
        name: String,
        ledger_version: String,
        installed_version: String,
    },
    StaleLock {
        lock_path: PathBuf,
        addon: Option<String>,
        operation: Option<String>,
        phase: Option<String>,
        backup: Option<PathBuf>,
    },
}
