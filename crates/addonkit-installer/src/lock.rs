use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use addonkit_core::AddonName;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::AddonError;
use crate::fs_utils::remove_file_if_exists;
use crate::layout::AddonLayout;
use crate::types::TransactionPhase;

const INTENT_VERSION: u32 = 1;

/// Write-ahead record kept in the lock file while an operation runs. A lock
/// file that outlives its process tells an operator what was interrupted and
/// which backup to restore from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockIntent {
    pub version: u32,
    pub pid: u32,
    pub addon: String,
    pub operation: String,
    pub started_at_unix: u64,
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
}

impl LockIntent {
    pub fn holder(&self) -> String {
        format!(
            "{} by pid {} in phase {}",
            self.operation, self.pid, self.phase
        )
    }
}

/// Exclusive per-addon lock. Released when dropped.
#[derive(Debug)]
pub struct AddonLock {
    path: PathBuf,
    intent: LockIntent,
}

impl AddonLock {
    pub fn acquire(
        layout: &AddonLayout,
        name: &AddonName,
        operation: &str,
    ) -> Result<Self, AddonError> {
        let path = layout.lock_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let holder = read_intent(&path)
                    .ok()
                    .flatten()
                    .map(|intent| intent.holder())
                    .unwrap_or_else(|| "unknown holder".to_string());
                return Err(AddonError::AddonLocked {
                    name: name.to_string(),
                    holder,
                    lock_path: path,
                });
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("failed to claim addon lock: {}", path.display()))
                    .into());
            }
        };

        let intent = LockIntent {
            version: INTENT_VERSION,
            pid: std::process::id(),
            addon: name.to_string(),
            operation: operation.to_string(),
            started_at_unix: current_unix_timestamp(),
            phase: TransactionPhase::Resolving.as_str().to_string(),
            backup: None,
        };

        let written = serialize_intent(&intent).and_then(|payload| {
            file.write_all(payload.as_bytes())
                .and_then(|_| file.flush())
                .with_context(|| format!("failed to write addon lock: {}", path.display()))
        });
        if let Err(err) = written {
            let _ = remove_file_if_exists(&path);
            return Err(err.into());
        }

        tracing::debug!(addon = %name, operation, lock = %path.display(), "addon lock acquired");
        Ok(Self { path, intent })
    }

    pub fn intent(&self) -> &LockIntent {
        &self.intent
    }

    pub fn set_phase(&mut self, phase: TransactionPhase) {
        tracing::debug!(
            addon = %self.intent.addon,
            operation = %self.intent.operation,
            phase = phase.as_str(),
            "transaction phase"
        );
        self.intent.phase = phase.as_str().to_string();
        self.persist();
    }

    pub fn record_backup(&mut self, archive: &Path) {
        self.intent.backup = Some(archive.to_path_buf());
        self.persist();
    }

    // Intent updates are advisory; a failed rewrite must not abort the
    // operation the lock protects.
    fn persist(&self) {
        let written = serialize_intent(&self.intent).and_then(|payload| {
            fs::write(&self.path, payload)
                .with_context(|| format!("failed to update addon lock: {}", self.path.display()))
        });
        if let Err(err) = written {
            tracing::warn!(error = %format!("{err:#}"), "addon lock intent not updated");
        }
    }
}

impl Drop for AddonLock {
    fn drop(&mut self) {
        if let Err(err) = remove_file_if_exists(&self.path) {
            tracing::warn!(
                lock = %self.path.display(),
                error = %err,
                "failed to release addon lock"
            );
        }
    }
}

/// Lock files left in the locks directory, with whatever intent could be
/// parsed from them.
pub fn read_lock_intents(layout: &AddonLayout) -> Result<Vec<(PathBuf, Option<LockIntent>)>> {
    let dir = layout.locks_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read lock directory: {}", dir.display()));
        }
    };

    let mut locks = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|value| value.to_str()) != Some("lock") {
            continue;
        }
        let intent = read_intent(&path).ok().flatten();
        locks.push((path, intent));
    }
    locks.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(locks)
}

fn read_intent(path: &Path) -> Result<Option<LockIntent>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read addon lock: {}", path.display()));
        }
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let intent = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse addon lock: {}", path.display()))?;
    Ok(Some(intent))
}

fn serialize_intent(intent: &LockIntent) -> Result<String> {
    let mut payload =
        serde_json::to_string_pretty(intent).context("failed to serialize lock intent")?;
    payload.push('\n');
    Ok(payload)
}

fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
