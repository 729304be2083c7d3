use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use super::*;

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn package_dir(files: &[&str]) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let seq = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "addonkit-resolver-{}-{nanos}-{seq}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("must create package dir");
    for file in files {
        fs::write(dir.join(file), b"zip").expect("must write archive");
    }
    dir
}

fn resolved_file(
    resolver: &PackageResolver,
    version: Option<&str>,
    backup: Option<&str>,
) -> Option<String> {
    resolver
        .resolve("demo", version, backup)
        .expect("resolve must not error")
        .map(|archive| archive.file_name)
}

#[test]
fn unversioned_resolve_picks_greatest_file_name() {
    let dir = package_dir(&["demo.1.0.0.zip", "demo.1.2.0.zip", "demo.2.0.0.zip"]);
    let resolver = PackageResolver::new(&dir);

    assert_eq!(
        resolved_file(&resolver, None, None).as_deref(),
        Some("demo.2.0.0.zip")
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unversioned_resolve_uses_string_order_not_semver() {
    // 1.9.0 beats 1.10.0 because '9' > '1' byte-wise.
    let dir = package_dir(&["demo.1.9.0.zip", "demo.1.10.0.zip"]);
    let resolver = PackageResolver::new(&dir);

    assert_eq!(
        resolved_file(&resolver, None, None).as_deref(),
        Some("demo.1.9.0.zip")
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unversioned_resolve_ignores_backups_and_other_addons() {
    let dir = package_dir(&[
        "demo.1.0.0.zip",
        "demo.back.20240101120000.zip",
        "demox.9.9.9.zip",
        "demo.notes.txt",
    ]);
    let resolver = PackageResolver::new(&dir);

    assert_eq!(
        resolved_file(&resolver, None, None).as_deref(),
        Some("demo.1.0.0.zip")
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn exact_version_resolves_single_file() {
    let dir = package_dir(&["demo.1.0.0.zip", "demo.2.0.0.zip"]);
    let resolver = PackageResolver::new(&dir);

    assert_eq!(
        resolved_file(&resolver, Some("1.0.0"), None).as_deref(),
        Some("demo.1.0.0.zip")
    );
    assert_eq!(
        resolved_file(&resolver, Some("1.0.0.zip"), None).as_deref(),
        Some("demo.1.0.0.zip")
    );
    assert_eq!(resolved_file(&resolver, Some("3.0.0"), None), None);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn backup_id_takes_precedence_over_version() {
    let dir = package_dir(&["demo.1.0.0.zip", "demo.back.20190227110637.zip"]);
    let resolver = PackageResolver::new(&dir);

    let archive = resolver
        .resolve("demo", Some("1.0.0"), Some("20190227110637"))
        .expect("resolve")
        .expect("backup must resolve");
    assert_eq!(archive.file_name, "demo.back.20190227110637.zip");
    assert_eq!(archive.backup_id(), Some("20190227110637"));

    assert_eq!(resolved_file(&resolver, None, Some("20000101000000")), None);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_package_dir_resolves_to_nothing() {
    let dir = package_dir(&[]);
    let resolver = PackageResolver::new(dir.join("missing"));

    assert_eq!(resolved_file(&resolver, None, None), None);
    assert!(resolver.list_archives("demo").expect("list").is_empty());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn list_archives_is_sorted_newest_first() {
    let dir = package_dir(&[
        "demo.1.0.0.zip",
        "demo.back.20240101120000.zip",
        "demo.2.0.0.zip",
    ]);
    let resolver = PackageResolver::new(&dir);

    let names = resolver
        .list_archives("demo")
        .expect("list")
        .into_iter()
        .map(|archive| archive.file_name)
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "demo.back.20240101120000.zip",
            "demo.2.0.0.zip",
            "demo.1.0.0.zip"
        ]
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn update_candidate_is_newest_greater_version() {
    let dir = package_dir(&[
        "demo.1.0.0.zip",
        "demo.1.1.0.zip",
        "demo.1.2.0.zip",
        "demo.back.20240101120000.zip",
    ]);
    let resolver = PackageResolver::new(&dir);

    let candidate = resolver
        .resolve_update("demo", "1.0.0")
        .expect("resolve")
        .expect("must find update");
    assert_eq!(candidate.version(), Some("1.2.0"));

    assert!(resolver
        .resolve_update("demo", "1.2.0")
        .expect("resolve")
        .is_none());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn update_candidate_compares_versions_as_strings() {
    let dir = package_dir(&["demo.1.10.0.zip"]);
    let resolver = PackageResolver::new(&dir);

    // "1.10.0" < "1.9.0" as strings, so nothing is considered newer.
    assert!(resolver
        .resolve_update("demo", "1.9.0")
        .expect("resolve")
        .is_none());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn update_candidate_ignores_non_release_stems() {
    let dir = package_dir(&[
        "demo.1.0.0.zip",
        "demo.beta.zip",
        "demo.latest.zip",
        "demo.2.zip",
        "demo.1..0.zip",
    ]);
    let resolver = PackageResolver::new(&dir);

    assert!(resolver
        .resolve_update("demo", "1.0.0")
        .expect("resolve")
        .is_none());

    fs::write(dir.join("demo.1.1.0.zip"), b"zip").expect("must write archive");
    let candidate = resolver
        .resolve_update("demo", "1.0.0")
        .expect("resolve")
        .expect("must find release");
    assert_eq!(candidate.version(), Some("1.1.0"));
    let _ = fs::remove_dir_all(&dir);
}
