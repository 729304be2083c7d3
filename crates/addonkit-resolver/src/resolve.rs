use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use addonkit_core::{backup_file_name, versioned_file_name, PackageArchive};
use anyhow::{Context, Result};

use crate::order::{select_latest, select_update_candidate, sort_by_file_name_desc};

/// Picks archive files out of the shared package directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageResolver {
    package_dir: PathBuf,
}

impl PackageResolver {
    pub fn new(package_dir: impl Into<PathBuf>) -> Self {
        Self {
            package_dir: package_dir.into(),
        }
    }

    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    /// Resolves the single archive to install for `addon`.
    ///
    /// A backup id wins over a version; with neither, the latest versioned
    /// archive by file name is chosen. Returns `Ok(None)` when nothing
    /// matching exists on disk.
    pub fn resolve(
        &self,
        addon: &str,
        version: Option<&str>,
        backup_id: Option<&str>,
    ) -> Result<Option<PackageArchive>> {
        let file_name = match (backup_id, version) {
            (Some(backup_id), _) => backup_file_name(addon, backup_id),
            (None, Some(version)) => versioned_file_name(addon, version),
            (None, None) => {
                let archives = self.list_archives(addon)?;
                let selected = select_latest(&archives).cloned();
                tracing::debug!(
                    addon,
                    candidates = archives.len(),
                    selected = selected.as_ref().map(|archive| archive.file_name.as_str()),
                    "resolved latest archive"
                );
                return Ok(selected);
            }
        };

        let path = self.package_dir.join(&file_name);
        if !path.is_file() {
            tracing::debug!(addon, file = %file_name, "requested archive not found");
            return Ok(None);
        }
        Ok(PackageArchive::parse(addon, &path))
    }

    /// Resolves the archive `update` should move to, if any is newer than
    /// `installed_version`.
    pub fn resolve_update(
        &self,
        addon: &str,
        installed_version: &str,
    ) -> Result<Option<PackageArchive>> {
        let archives = self.list_archives(addon)?;
        Ok(select_update_candidate(&archives, installed_version).cloned())
    }

    /// Every archive of `addon` in the package directory, newest file name
    /// first. A missing package directory yields an empty list.
    pub fn list_archives(&self, addon: &str) -> Result<Vec<PackageArchive>> {
        let entries = match fs::read_dir(&self.package_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!(
                        "failed to read package directory: {}",
                        self.package_dir.display()
                    )
                });
            }
        };

        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| {
                format!(
                    "failed to read package directory entry: {}",
                    self.package_dir.display()
                )
            })?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(archive) = PackageArchive::parse(addon, &entry.path()) {
                archives.push(archive);
            }
        }

        sort_by_file_name_desc(&mut archives);
        Ok(archives)
    }
}
