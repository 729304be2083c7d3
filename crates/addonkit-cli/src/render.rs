use std::io::{self, IsTerminal};

use addonkit_installer::{
    AddonStatus, BackupRecord, DoctorFinding, InstallOutcome, InstallReport, RemoveOutcome,
    UpdateOutcome,
};
use anstyle::{AnsiColor, Effects, Style};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_section(self, title: &str) {
        if let Some(line) = render_section_header(self.style, title) {
            println!("{line}");
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn current_output_style(plain: bool) -> OutputStyle {
    if plain {
        return OutputStyle::Plain;
    }
    resolve_output_style(io::stdout().is_terminal())
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

pub(crate) fn render_error_line(style: OutputStyle, err: &anyhow::Error) -> String {
    let message = format!("error: {err:#}");
    match style {
        OutputStyle::Plain => message,
        OutputStyle::Rich => format!("{} {message}", colorize(error_style(), "[ERR]")),
    }
}

fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn error_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightRed.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn format_report_lines(verb: &str, report: &InstallReport, style: OutputStyle) -> Vec<String> {
    let headline = match report.previous_version.as_deref() {
        Some(previous) => format!("{verb} {} {previous} -> {}", report.name, report.version),
        None => format!("{verb} {} {}", report.name, report.version),
    };
    let mut lines = vec![render_status_line(style, "ok", &headline)];
    if let Some(backup) = &report.backup {
        lines.push(render_status_line(
            style,
            "info",
            &format!("backup kept at {}", backup.path.display()),
        ));
    }
    lines
}

pub(crate) fn format_install_outcome_lines(
    outcome: &InstallOutcome,
    style: OutputStyle,
) -> Vec<String> {
    match outcome {
        InstallOutcome::Installed(report) => format_report_lines("installed", report, style),
        InstallOutcome::Cancelled { name } => vec![render_status_line(
            style,
            "info",
            &format!("install of {name} cancelled"),
        )],
    }
}

pub(crate) fn format_update_outcome_lines(
    outcome: &UpdateOutcome,
    style: OutputStyle,
) -> Vec<String> {
    match outcome {
        UpdateOutcome::Updated(report) => format_report_lines("updated", report, style),
        UpdateOutcome::UpToDate { name, version } => vec![render_status_line(
            style,
            "info",
            &format!("{name} {version} is up to date"),
        )],
        UpdateOutcome::Cancelled { name } => vec![render_status_line(
            style,
            "info",
            &format!("update of {name} cancelled"),
        )],
    }
}

pub(crate) fn format_remove_outcome_lines(
    outcome: &RemoveOutcome,
    style: OutputStyle,
) -> Vec<String> {
    let line = match outcome {
        RemoveOutcome::Removed { name, version } => {
            render_status_line(style, "ok", &format!("removed {name} {version}"))
        }
        RemoveOutcome::Cancelled { name } => {
            render_status_line(style, "info", &format!("removal of {name} cancelled"))
        }
    };
    vec![line]
}

pub(crate) fn format_backup_line(record: &BackupRecord, style: OutputStyle) -> String {
    render_status_line(
        style,
        "ok",
        &format!("backed up {} to {}", record.name, record.path.display()),
    )
}

pub(crate) fn format_list_lines(statuses: &[AddonStatus], style: OutputStyle) -> Vec<String> {
    if statuses.is_empty() {
        return vec![render_status_line(style, "info", "no addons installed")];
    }

    statuses
        .iter()
        .map(|status| {
            let state = match status.enabled {
                Some(true) => "enabled",
                Some(false) => "disabled",
                None => "missing",
            };
            let badge = match (&status.ledger_version, &status.installed_version) {
                (Some(ledger), Some(installed)) if ledger == installed => "ok",
                _ => "warn",
            };
            let message = format!(
                "{} ledger={} installed={} state={state} available={} backups={}",
                status.name,
                status.ledger_version.as_deref().unwrap_or("-"),
                status.installed_version.as_deref().unwrap_or("-"),
                join_or_dash(&status.available_versions),
                status.backups.len()
            );
            render_status_line(style, badge, &message)
        })
        .collect()
}

pub(crate) fn format_doctor_lines(findings: &[DoctorFinding], style: OutputStyle) -> Vec<String> {
    if findings.is_empty() {
        return vec![render_status_line(style, "ok", "no problems found")];
    }

    findings
        .iter()
        .map(|finding| match finding {
            DoctorFinding::LedgerWithoutInstall { name, version } => render_status_line(
                style,
                "err",
                &format!("{name}: recorded as {version} but not installed"),
            ),
            DoctorFinding::InstallWithoutLedger { name, version } => render_status_line(
                style,
                "warn",
                &format!("{name}: installed ({version}) but missing from the ledger"),
            ),
            DoctorFinding::VersionMismatch {
                name,
                ledger_version,
                installed_version,
            } => render_status_line(
                style,
                "warn",
                &format!(
                    "{name}: ledger records {ledger_version}, descriptor says {installed_version}"
                ),
            ),
            DoctorFinding::StaleLock {
                lock_path,
                addon,
                operation,
                phase,
                backup,
            } => {
                let mut message = match (addon, operation, phase) {
                    (Some(addon), Some(operation), Some(phase)) => format!(
                        "stale lock {}: {operation} of {addon} stopped in phase {phase}",
                        lock_path.display()
                    ),
                    _ => format!("stale lock {}: intent unreadable", lock_path.display()),
                };
                if let Some(backup) = backup {
                    message.push_str(&format!(", restore from {}", backup.display()));
                }
                render_status_line(style, "warn", &message)
            }
        })
        .collect()
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(",")
    }
}
