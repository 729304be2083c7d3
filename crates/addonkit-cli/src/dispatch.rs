use std::io;

use addonkit_installer::{
    resolve_root, AddonLayout, AddonkitConfig, BackupRequest, InstallRequest,
    LifecycleOrchestrator, RemoveRequest, UpdateRequest,
};
use anyhow::{anyhow, Result};

use crate::completion::write_completions_script;
use crate::prompts::TerminalPrompt;
use crate::render::{
    format_backup_line, format_doctor_lines, format_install_outcome_lines, format_list_lines,
    format_remove_outcome_lines, format_update_outcome_lines, OutputStyle, TerminalRenderer,
};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli, style: OutputStyle) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        return write_completions_script(shell, &mut io::stdout().lock());
    }

    let orchestrator = build_orchestrator(&cli)?;
    let renderer = TerminalRenderer::from_style(style);

    match cli.command {
        Commands::Install {
            name,
            password,
            version,
            yes,
            backup_id,
        } => {
            let outcome = orchestrator.install(&InstallRequest {
                name,
                version,
                backup_id,
                password,
                confirmed: yes,
            })?;
            renderer.print_lines(&format_install_outcome_lines(&outcome, renderer.style()));
        }
        Commands::Update {
            name,
            password,
            yes,
        } => {
            let outcome = orchestrator.update(&UpdateRequest {
                name,
                password,
                confirmed: yes,
            })?;
            renderer.print_lines(&format_update_outcome_lines(&outcome, renderer.style()));
        }
        Commands::Remove { name, yes } => {
            let outcome = orchestrator.remove(&RemoveRequest {
                name,
                confirmed: yes,
            })?;
            renderer.print_lines(&format_remove_outcome_lines(&outcome, renderer.style()));
        }
        Commands::Backup {
            name,
            password,
            out,
        } => {
            let record = orchestrator.backup(&BackupRequest {
                name,
                password,
                out_dir: out,
            })?;
            println!("{}", format_backup_line(&record, renderer.style()));
        }
        Commands::List => {
            let statuses = orchestrator.list()?;
            renderer.print_section("addons");
            renderer.print_lines(&format_list_lines(&statuses, renderer.style()));
        }
        Commands::Doctor => {
            let findings = orchestrator.doctor()?;
            renderer.print_section("doctor");
            renderer.print_lines(&format_doctor_lines(&findings, renderer.style()));
            if !findings.is_empty() {
                return Err(anyhow!("doctor found {} problem(s)", findings.len()));
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn build_orchestrator(cli: &Cli) -> Result<LifecycleOrchestrator> {
    let root = resolve_root(cli.root.as_deref())?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| AddonLayout::new(&root).config_path());
    let config = AddonkitConfig::load(&config_path)?;
    tracing::debug!(
        config = %config_path.display(),
        name_policy = config.name_policy.as_str(),
        "configuration loaded"
    );

    let orchestrator =
        LifecycleOrchestrator::from_config(&config, &root)?.with_prompt(Box::new(TerminalPrompt));
    Ok(orchestrator)
}
