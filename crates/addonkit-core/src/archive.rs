use std::path::{Path, PathBuf};

pub const ARCHIVE_EXTENSION: &str = "zip";
pub const BACKUP_MARKER: &str = "back";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveKind {
    Versioned { version: String },
    Backup { backup_id: String },
}

/// One archive file in the package directory, named either
/// `<addon>.<version>.zip` or `<addon>.back.<backup_id>.zip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageArchive {
    pub addon: String,
    pub file_name: String,
    pub path: PathBuf,
    pub kind: ArchiveKind,
}

impl PackageArchive {
    /// Classifies `path` as an archive of `addon`, or returns `None` when the
    /// file name is not `<addon>.<something>.zip`.
    pub fn parse(addon: &str, path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let rest = file_name.strip_prefix(addon)?.strip_prefix('.')?;
        if !has_zip_suffix(rest) {
            return None;
        }
        let stem = strip_zip_suffix(rest);
        if stem.is_empty() {
            return None;
        }

        let backup_prefix = format!("{BACKUP_MARKER}.");
        let kind = match stem.strip_prefix(&backup_prefix) {
            Some(backup_id) if !backup_id.is_empty() => ArchiveKind::Backup {
                backup_id: backup_id.to_string(),
            },
            _ => ArchiveKind::Versioned {
                version: stem.to_string(),
            },
        };

        Some(Self {
            addon: addon.to_string(),
            file_name,
            path: path.to_path_buf(),
            kind,
        })
    }

    pub fn version(&self) -> Option<&str> {
        match &self.kind {
            ArchiveKind::Versioned { version } => Some(version),
            ArchiveKind::Backup { .. } => None,
        }
    }

    pub fn backup_id(&self) -> Option<&str> {
        match &self.kind {
            ArchiveKind::Backup { backup_id } => Some(backup_id),
            ArchiveKind::Versioned { .. } => None,
        }
    }

    pub fn is_backup(&self) -> bool {
        matches!(self.kind, ArchiveKind::Backup { .. })
    }
}

pub fn versioned_file_name(addon: &str, version: &str) -> String {
    ensure_zip_suffix(&format!("{addon}.{version}"))
}

pub fn backup_file_name(addon: &str, backup_id: &str) -> String {
    ensure_zip_suffix(&format!("{addon}.{BACKUP_MARKER}.{backup_id}"))
}

/// Appends `.zip` unless the name already carries it (case-insensitive).
pub fn ensure_zip_suffix(name: &str) -> String {
    if has_zip_suffix(name) {
        name.to_string()
    } else {
        format!("{name}.{ARCHIVE_EXTENSION}")
    }
}

fn has_zip_suffix(name: &str) -> bool {
    let suffix_len = ARCHIVE_EXTENSION.len() + 1;
    name.len() > suffix_len
        && name.is_char_boundary(name.len() - suffix_len)
        && name[name.len() - suffix_len..].eq_ignore_ascii_case(".zip")
}

fn strip_zip_suffix(name: &str) -> &str {
    if has_zip_suffix(name) {
        &name[..name.len() - ARCHIVE_EXTENSION.len() - 1]
    } else {
        name
    }
}
