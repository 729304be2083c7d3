use addonkit_core::PackageArchive;

/// Orders archives by descending file name.
///
/// This is plain string order, not semantic version order: `demo.1.9.0.zip`
/// sorts ahead of `demo.1.10.0.zip`.
pub fn sort_by_file_name_desc(archives: &mut [PackageArchive]) {
    archives.sort_by(|a, b| b.file_name.cmp(&a.file_name));
}

/// The archive an unversioned install picks: the versioned archive with the
/// greatest file name. Backups are never picked implicitly.
pub fn select_latest(archives: &[PackageArchive]) -> Option<&PackageArchive> {
    archives
        .iter()
        .filter(|archive| !archive.is_backup())
        .max_by(|a, b| a.file_name.cmp(&b.file_name))
}

/// The newest versioned archive whose embedded version compares greater than
/// `installed_version`, using the same string comparison as
/// [`sort_by_file_name_desc`]. Only dotted release versions count, so
/// `demo.beta.zip` or `demo.latest.zip` never arrive through an update.
pub fn select_update_candidate<'a>(
    archives: &'a [PackageArchive],
    installed_version: &str,
) -> Option<&'a PackageArchive> {
    archives
        .iter()
        .filter(|archive| {
            archive.version().is_some_and(|version| {
                is_release_version(version) && version > installed_version
            })
        })
        .max_by(|a, b| a.file_name.cmp(&b.file_name))
}

/// Digit-led and dot-separated with no empty part, e.g. `1.0` or `2.10.3`.
fn is_release_version(version: &str) -> bool {
    version.starts_with(|ch: char| ch.is_ascii_digit())
        && version.contains('.')
        && version.split('.').all(|part| !part.is_empty())
}
