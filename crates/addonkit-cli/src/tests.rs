use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use addonkit_core::{ArchiveCodec, ZipCodec};
use addonkit_installer::{
    AddonError, AddonStatus, BackupRecord, DoctorFinding, InstallOutcome, InstallReport,
    LedgerStore, RemoveOutcome, UpdateOutcome,
};
use clap::error::ErrorKind;
use clap::Parser;

use super::*;
use crate::completion::write_completions_script;
use crate::prompts::is_affirmative;
use crate::render::*;

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let seq = TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let root = std::env::temp_dir().join(format!(
        "addonkit-cli-{}-{nanos}-{seq}",
        std::process::id()
    ));
    fs::create_dir_all(&root).expect("must create test root");
    root
}

fn write_package(root: &Path, addon: &str, version: &str, state: &str) {
    let staging = root.join("staging").join(format!("{addon}-{version}"));
    fs::create_dir_all(&staging).expect("must create staging");
    fs::write(
        staging.join("info.ini"),
        format!("name = {addon}\nversion = {version}\nstate = {state}\n"),
    )
    .expect("must write descriptor");
    let archive = root
        .join("packages")
        .join(format!("{addon}.{version}.zip"));
    ZipCodec
        .pack(&staging, &archive, None)
        .expect("must pack fixture");
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("must parse")
}

fn run(root: &Path, args: &[&str]) -> anyhow::Result<()> {
    let root_arg = root.display().to_string();
    let mut full = vec!["addonkit", "--root", root_arg.as_str(), "--plain"];
    full.extend_from_slice(args);
    run_cli(parse(&full), OutputStyle::Plain)
}

fn sample_report(previous_version: Option<&str>, backup: bool) -> InstallReport {
    InstallReport {
        name: "demo".to_string(),
        version: "2.0.0".to_string(),
        previous_version: previous_version.map(str::to_string),
        archive: PathBuf::from("/srv/packages/demo.2.0.0.zip"),
        backup: backup.then(|| BackupRecord {
            name: "demo".to_string(),
            backup_id: "20240101000000".to_string(),
            path: PathBuf::from("/srv/packages/demo.back.20240101000000.zip"),
        }),
    }
}

#[test]
fn cli_parses_install_flags() {
    let cli = parse(&[
        "addonkit",
        "install",
        "demo",
        "-r",
        "1.2.0",
        "-p",
        "secret",
        "-y",
        "--backup-id",
        "20240101000000",
    ]);

    match cli.command {
        Commands::Install {
            name,
            password,
            version,
            yes,
            backup_id,
        } => {
            assert_eq!(name, "demo");
            assert_eq!(version.as_deref(), Some("1.2.0"));
            assert_eq!(password.as_deref(), Some("secret"));
            assert!(yes);
            assert_eq!(backup_id.as_deref(), Some("20240101000000"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_accepts_global_flags_after_subcommand() {
    let cli = parse(&["addonkit", "list", "--root", "/srv/app", "--plain", "-v"]);
    assert_eq!(cli.root.as_deref(), Some(Path::new("/srv/app")));
    assert!(cli.plain);
    assert!(cli.verbose);
    assert!(matches!(cli.command, Commands::List));
}

#[test]
fn cli_parses_backup_output_dir() {
    let cli = parse(&["addonkit", "backup", "demo", "--out", "/tmp/snapshots"]);
    match cli.command {
        Commands::Backup { name, out, password } => {
            assert_eq!(name, "demo");
            assert_eq!(out.as_deref(), Some(Path::new("/tmp/snapshots")));
            assert!(password.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_requires_addon_name() {
    let err = Cli::try_parse_from(["addonkit", "remove"]).expect_err("must require name");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn cli_rejects_unknown_completion_shell() {
    let err = Cli::try_parse_from(["addonkit", "completions", "tcsh"])
        .expect_err("must reject shell");
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn completions_script_names_the_binary() {
    for shell in [
        CliCompletionShell::Bash,
        CliCompletionShell::Zsh,
        CliCompletionShell::Fish,
        CliCompletionShell::Powershell,
    ] {
        let mut output = Vec::new();
        write_completions_script(shell, &mut output).expect("must write completions");
        let script = String::from_utf8(output).expect("must be utf-8");
        assert!(script.contains("addonkit"), "{shell:?} script missing binary name");
    }
}

#[test]
fn confirmation_accepts_only_yes() {
    assert!(is_affirmative("y\n"));
    assert!(is_affirmative(" YES "));
    assert!(!is_affirmative("\n"));
    assert!(!is_affirmative("n"));
    assert!(!is_affirmative("yep"));
}

#[test]
fn resolve_output_style_uses_rich_only_for_terminal_stdout() {
    assert_eq!(resolve_output_style(true), OutputStyle::Rich);
    assert_eq!(resolve_output_style(false), OutputStyle::Plain);
    assert_eq!(current_output_style(true), OutputStyle::Plain);
}

#[test]
fn render_status_line_badges() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "installed demo 1.0.0"),
        "installed demo 1.0.0"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "installed demo 1.0.0"),
        "[OK] installed demo 1.0.0"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "err", "demo: not installed"),
        "[ERR] demo: not installed"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "info", "demo is up to date"),
        "[..] demo is up to date"
    );
}

#[test]
fn render_error_line_includes_cause_chain() {
    let err = anyhow::anyhow!("permission denied").context("failed to write ledger");
    assert_eq!(
        render_error_line(OutputStyle::Plain, &err),
        "error: failed to write ledger: permission denied"
    );
    assert!(render_error_line(OutputStyle::Rich, &err).contains("[ERR]"));
}

#[test]
fn install_lines_mention_replaced_version_and_backup() {
    let lines = format_install_outcome_lines(
        &InstallOutcome::Installed(sample_report(Some("1.0.0"), true)),
        OutputStyle::Rich,
    );
    assert_eq!(
        lines,
        vec![
            "[OK] installed demo 1.0.0 -> 2.0.0".to_string(),
            "[..] backup kept at /srv/packages/demo.back.20240101000000.zip".to_string(),
        ]
    );

    let fresh = format_install_outcome_lines(
        &InstallOutcome::Installed(sample_report(None, false)),
        OutputStyle::Plain,
    );
    assert_eq!(fresh, vec!["installed demo 2.0.0".to_string()]);
}

#[test]
fn update_and_remove_lines_cover_every_outcome() {
    assert_eq!(
        format_update_outcome_lines(
            &UpdateOutcome::UpToDate {
                name: "demo".to_string(),
                version: "2.0.0".to_string(),
            },
            OutputStyle::Plain,
        ),
        vec!["demo 2.0.0 is up to date".to_string()]
    );
    assert_eq!(
        format_update_outcome_lines(
            &UpdateOutcome::Cancelled {
                name: "demo".to_string()
            },
            OutputStyle::Rich,
        ),
        vec!["[..] update of demo cancelled".to_string()]
    );
    assert_eq!(
        format_remove_outcome_lines(
            &RemoveOutcome::Removed {
                name: "demo".to_string(),
                version: "1.0.0".to_string(),
            },
            OutputStyle::Rich,
        ),
        vec!["[OK] removed demo 1.0.0".to_string()]
    );
}

#[test]
fn list_lines_flag_drift() {
    let statuses = vec![
        AddonStatus {
            name: "demo".to_string(),
            ledger_version: Some("1.0.0".to_string()),
            installed_version: Some("1.0.0".to_string()),
            enabled: Some(true),
            available_versions: vec!["2.0.0".to_string(), "1.0.0".to_string()],
            backups: vec!["20240101000000".to_string()],
        },
        AddonStatus {
            name: "ghost".to_string(),
            ledger_version: Some("0.5.0".to_string()),
            installed_version: None,
            enabled: None,
            available_versions: Vec::new(),
            backups: Vec::new(),
        },
    ];

    let lines = format_list_lines(&statuses, OutputStyle::Rich);

    assert_eq!(
        lines[0],
        "[OK] demo ledger=1.0.0 installed=1.0.0 state=enabled available=2.0.0,1.0.0 backups=1"
    );
    assert_eq!(
        lines[1],
        "[WARN] ghost ledger=0.5.0 installed=- state=missing available=- backups=0"
    );
    assert_eq!(
        format_list_lines(&[], OutputStyle::Plain),
        vec!["no addons installed".to_string()]
    );
}

#[test]
fn doctor_lines_point_at_backup_of_interrupted_operation() {
    let findings = vec![DoctorFinding::StaleLock {
        lock_path: PathBuf::from("/srv/.addonkit/locks/demo.lock"),
        addon: Some("demo".to_string()),
        operation: Some("update".to_string()),
        phase: Some("unpacking".to_string()),
        backup: Some(PathBuf::from("/srv/packages/demo.back.20240101000000.zip")),
    }];

    assert_eq!(
        format_doctor_lines(&findings, OutputStyle::Plain),
        vec![
            "stale lock /srv/.addonkit/locks/demo.lock: update of demo stopped in phase unpacking, restore from /srv/packages/demo.back.20240101000000.zip"
                .to_string()
        ]
    );
    assert_eq!(
        format_doctor_lines(&[], OutputStyle::Rich),
        vec!["[OK] no problems found".to_string()]
    );
}

#[test]
fn install_update_remove_round_trip_through_cli() {
    let root = test_root();
    write_package(&root, "demo", "1.0.0", "0");

    run(&root, &["install", "demo", "--yes"]).expect("must install");
    assert!(root.join("addons/demo/info.ini").is_file());

    write_package(&root, "demo", "1.1.0", "0");
    run(&root, &["update", "demo", "--yes"]).expect("must update");
    let ledger = LedgerStore::new(root.join("addons/addons.lock.toml"))
        .read()
        .expect("must read ledger");
    assert_eq!(ledger.version_of("demo"), Some("1.1.0"));

    run(&root, &["doctor"]).expect("healthy install has no findings");
    run(&root, &["list"]).expect("must list");

    run(&root, &["remove", "demo", "--yes"]).expect("must remove");
    assert!(!root.join("addons/demo").exists());
}

#[test]
fn cli_surfaces_taxonomy_errors() {
    let root = test_root();
    write_package(&root, "demo", "1.0.0", "1");
    run(&root, &["install", "demo", "-y"]).expect("must install");

    let err = run(&root, &["remove", "demo", "-y"]).expect_err("enabled addon is busy");
    let addon_err = err
        .downcast_ref::<AddonError>()
        .expect("must carry addon error");
    assert_eq!(addon_err.code(), "addon-busy");

    let err = run(&root, &["update", "missing", "-y"]).expect_err("missing addon");
    assert!(matches!(
        err.downcast_ref::<AddonError>(),
        Some(AddonError::PackageNotFound { .. })
    ));
}

#[test]
fn config_file_relocates_package_dir() {
    let root = test_root();
    fs::write(
        root.join("addonkit.toml"),
        "package_dir = \"archives\"\nname_policy = \"lowercase\"\n",
    )
    .expect("must write config");
    write_package(&root, "demo", "1.0.0", "0");
    fs::create_dir_all(root.join("archives")).expect("must create archives");
    fs::rename(
        root.join("packages/demo.1.0.0.zip"),
        root.join("archives/demo.1.0.0.zip"),
    )
    .expect("must move package");

    run(&root, &["install", "DEMO", "--yes"]).expect("must install from configured dir");
    assert!(root.join("addons/demo").is_dir());
}

#[test]
fn doctor_fails_when_problems_are_found() {
    let root = test_root();
    LedgerStore::new(root.join("addons/addons.lock.toml"))
        .merge([("ghost", "1.0.0")])
        .expect("must seed ledger");

    let err = run(&root, &["doctor"]).expect_err("must report problems");
    assert!(err.to_string().contains("1 problem"));
}
