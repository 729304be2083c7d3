use std::collections::VecDeque;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use zip::write::{FileOptions, SimpleFileOptions};
use zip::{AesMode, CompressionMethod, ZipArchive, ZipWriter};

/// Packs and unpacks addon directories. Archive entries are relative to the
/// addon directory itself.
pub trait ArchiveCodec {
    fn pack(&self, source_dir: &Path, archive_path: &Path, password: Option<&str>) -> Result<()>;

    fn unpack(&self, archive_path: &Path, dest_dir: &Path, password: Option<&str>) -> Result<()>;
}

/// Zip codec, AES-256 encrypted when a password is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCodec;

impl ArchiveCodec for ZipCodec {
    fn pack(&self, source_dir: &Path, archive_path: &Path, password: Option<&str>) -> Result<()> {
        if !source_dir.is_dir() {
            return Err(anyhow!(
                "archive source is not a directory: {}",
                source_dir.display()
            ));
        }
        if let Some(parent) = archive_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let result = write_zip(source_dir, archive_path, password);
        if result.is_err() && archive_path.exists() {
            if let Err(err) = fs::remove_file(archive_path) {
                tracing::warn!(
                    path = %archive_path.display(),
                    error = %err,
                    "failed to remove partial archive"
                );
            }
        }
        result
    }

    fn unpack(&self, archive_path: &Path, dest_dir: &Path, password: Option<&str>) -> Result<()> {
        let file = File::open(archive_path)
            .with_context(|| format!("failed to open archive: {}", archive_path.display()))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("failed to read zip archive: {}", archive_path.display()))?;
        fs::create_dir_all(dest_dir)
            .with_context(|| format!("failed to create {}", dest_dir.display()))?;

        for index in 0..archive.len() {
            let mut entry = match password {
                Some(password) => archive.by_index_decrypt(index, password.as_bytes()),
                None => archive.by_index(index),
            }
            .with_context(|| {
                format!(
                    "failed to read entry {index} of {}",
                    archive_path.display()
                )
            })?;

            let relative = entry
                .enclosed_name()
                .ok_or_else(|| anyhow!("archive entry escapes destination: {}", entry.name()))?;
            let out_path = dest_dir.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path)
                    .with_context(|| format!("failed to create {}", out_path.display()))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let mut out_file = File::create(&out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            io::copy(&mut entry, &mut out_file)
                .with_context(|| format!("failed to extract {}", out_path.display()))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                    .with_context(|| format!("failed to set mode on {}", out_path.display()))?;
            }
        }

        Ok(())
    }
}

fn write_zip(source_dir: &Path, archive_path: &Path, password: Option<&str>) -> Result<()> {
    let file = File::create(archive_path)
        .with_context(|| format!("failed to create archive: {}", archive_path.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = entry_options(password);

    for relative in collect_entries(source_dir)? {
        let source = source_dir.join(&relative);
        let entry_name = entry_name(&relative);
        let metadata = fs::symlink_metadata(&source)
            .with_context(|| format!("failed to stat {}", source.display()))?;

        if metadata.is_dir() {
            writer
                .add_directory(entry_name.as_str(), options)
                .with_context(|| format!("failed to add directory {entry_name}"))?;
            continue;
        }

        writer
            .start_file(entry_name.as_str(), file_options_for(options, &metadata))
            .with_context(|| format!("failed to add file {entry_name}"))?;
        let mut input =
            File::open(&source).with_context(|| format!("failed to open {}", source.display()))?;
        io::copy(&mut input, &mut writer)
            .with_context(|| format!("failed to compress {}", source.display()))?;
    }

    writer
        .finish()
        .with_context(|| format!("failed to finalize archive: {}", archive_path.display()))?;
    Ok(())
}

fn entry_options(password: Option<&str>) -> FileOptions<'_, ()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    match password {
        Some(password) => options.with_aes_encryption(AesMode::Aes256, password),
        None => options,
    }
}

#[cfg(unix)]
fn file_options_for<'k>(
    options: FileOptions<'k, ()>,
    metadata: &fs::Metadata,
) -> FileOptions<'k, ()> {
    use std::os::unix::fs::PermissionsExt;
    options.unix_permissions(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn file_options_for<'k>(
    options: FileOptions<'k, ()>,
    _metadata: &fs::Metadata,
) -> FileOptions<'k, ()> {
    options
}

/// Relative paths of every directory and regular file under `root`, sorted so
/// archives are reproducible. Symlinks are skipped, never followed.
fn collect_entries(root: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(root.to_path_buf());

    while let Some(dir) = queue.pop_front() {
        for entry in
            fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            let relative = path
                .strip_prefix(root)
                .with_context(|| format!("failed to relativize {}", path.display()))?
                .to_path_buf();

            if file_type.is_dir() {
                entries.push(relative);
                queue.push_back(path);
            } else if file_type.is_file() {
                entries.push(relative);
            } else {
                tracing::warn!(path = %path.display(), "skipping non-regular file while packing");
            }
        }
    }

    entries.sort();
    Ok(entries)
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
