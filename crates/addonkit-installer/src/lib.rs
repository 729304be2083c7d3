mod backup;
mod config;
mod error;
mod fs_utils;
mod hooks;
mod layout;
mod ledger;
mod lock;
mod orchestrator;
mod prompt;
mod types;

pub use backup::{current_backup_id, BackupManager, BackupRecord, BACKUP_ID_FORMAT};
pub use config::{resolve_root, AddonkitConfig, ImportConfig, DEFAULT_IMPORT_SCRIPT, ROOT_ENV};
pub use error::{AddonError, HookPhase};
pub use fs_utils::{dir_exists, file_exists, remove_dir_recursive, write_atomic};
pub use hooks::{
    AddonRegistry, CommandImporter, DataImporter, HookContext, Installable,
    TABLE_PREFIX_PLACEHOLDER,
};
pub use layout::{AddonLayout, CONFIG_FILE, LEDGER_FILE};
pub use ledger::{Ledger, LedgerStore};
pub use lock::{read_lock_intents, AddonLock, LockIntent};
pub use orchestrator::LifecycleOrchestrator;
pub use prompt::{NonInteractive, Prompt};
pub use types::{
    AddonStatus, BackupRequest, DoctorFinding, InstallOutcome, InstallReport, InstallRequest,
    RemoveOutcome, RemoveRequest, TransactionPhase, UpdateOutcome, UpdateRequest,
};
