use std::fs;
use std::path::{Path, PathBuf};

use addonkit_core::{backup_file_name, AddonName, ArchiveCodec};
use anyhow::{anyhow, Context, Result};

use crate::fs_utils::{dir_exists, file_exists, remove_dir_recursive};
use crate::layout::AddonLayout;

pub const BACKUP_ID_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub name: String,
    pub backup_id: String,
    pub path: PathBuf,
}

pub fn current_backup_id() -> String {
    chrono::Local::now().format(BACKUP_ID_FORMAT).to_string()
}

/// Snapshots installed addons into `<name>.back.<id>.zip` archives and
/// restores them on the rollback path.
pub struct BackupManager<'a> {
    layout: &'a AddonLayout,
    codec: &'a dyn ArchiveCodec,
}

impl<'a> BackupManager<'a> {
    pub fn new(layout: &'a AddonLayout, codec: &'a dyn ArchiveCodec) -> Self {
        Self { layout, codec }
    }

    /// Packs the installed addon into the package directory and, once the
    /// archive is verified on disk, removes the installed directory. If the
    /// removal fails partway the installation is restored from the archive.
    pub fn backup(&self, name: &AddonName) -> Result<BackupRecord> {
        self.backup_with_id(name, &current_backup_id())
    }

    pub fn backup_with_id(&self, name: &AddonName, backup_id: &str) -> Result<BackupRecord> {
        let record = self.pack(name, self.layout.package_dir(), backup_id, None)?;

        let addon_dir = self.layout.addon_dir(name);
        if let Err(err) = remove_dir_recursive(&addon_dir) {
            let cleared = anyhow::Error::new(err).context(format!(
                "backup {} written but failed to clear {}",
                record.path.display(),
                addon_dir.display()
            ));
            // A partial clear leaves a broken addon; put it back from the
            // archive just written.
            return Err(match self.restore(&record, name) {
                Ok(()) => cleared.context("installation restored from backup"),
                Err(restore_err) => cleared.context(format!(
                    "restore also failed, backup kept at {}: {restore_err:#}",
                    record.path.display()
                )),
            });
        }
        tracing::debug!(
            addon = %name,
            archive = %record.path.display(),
            "backup taken, installation cleared"
        );
        Ok(record)
    }

    /// Packs the installed addon into `out_dir` and leaves the installation
    /// in place.
    pub fn snapshot(
        &self,
        name: &AddonName,
        out_dir: &Path,
        password: Option<&str>,
    ) -> Result<BackupRecord> {
        self.pack(name, out_dir, &current_backup_id(), password)
    }

    /// Unpacks `record` onto the addon directory, then deletes the backup
    /// archive once the directory exists again.
    pub fn restore(&self, record: &BackupRecord, name: &AddonName) -> Result<()> {
        let addon_dir = self.layout.addon_dir(name);
        self.codec
            .unpack(&record.path, &addon_dir, None)
            .with_context(|| {
                format!(
                    "failed to unpack backup {} into {}",
                    record.path.display(),
                    addon_dir.display()
                )
            })?;

        if !dir_exists(&addon_dir) {
            return Err(anyhow!(
                "backup {} unpacked but {} does not exist; backup kept",
                record.path.display(),
                addon_dir.display()
            ));
        }

        fs::remove_file(&record.path).with_context(|| {
            format!("failed to delete restored backup {}", record.path.display())
        })?;
        tracing::debug!(
            addon = %name,
            archive = %record.path.display(),
            "backup restored"
        );
        Ok(())
    }

    fn pack(
        &self,
        name: &AddonName,
        out_dir: &Path,
        backup_id: &str,
        password: Option<&str>,
    ) -> Result<BackupRecord> {
        let addon_dir = self.layout.addon_dir(name);
        if !dir_exists(&addon_dir) {
            return Err(anyhow!(
                "addon directory does not exist: {}",
                addon_dir.display()
            ));
        }

        let archive_path = out_dir.join(backup_file_name(name.as_str(), backup_id));
        if archive_path.exists() {
            return Err(anyhow!(
                "backup archive already exists: {}",
                archive_path.display()
            ));
        }

        self.codec
            .pack(&addon_dir, &archive_path, password)
            .with_context(|| format!("failed to pack {}", addon_dir.display()))?;

        if !file_exists(&archive_path) {
            return Err(anyhow!(
                "archive codec reported success but {} is missing",
                archive_path.display()
            ));
        }

        Ok(BackupRecord {
            name: name.to_string(),
            backup_id: backup_id.to_string(),
            path: archive_path,
        })
    }
}
