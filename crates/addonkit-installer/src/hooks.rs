use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use addonkit_core::{AddonMetadata, AddonName};
use anyhow::{anyhow, Context, Result};

/// What an addon's lifecycle hooks get to see.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub name: &'a AddonName,
    pub addon_dir: &'a Path,
    pub metadata: &'a AddonMetadata,
}

/// Lifecycle capability an addon may provide. Addons without one are simply
/// absent from the [`AddonRegistry`].
pub trait Installable {
    fn install(&self, ctx: &HookContext<'_>) -> Result<()>;

    fn uninstall(&self, _ctx: &HookContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Addon capabilities known to one invocation. Built by the host before the
/// orchestrator runs and dropped with it.
#[derive(Default)]
pub struct AddonRegistry {
    entries: BTreeMap<String, Box<dyn Installable>>,
}

impl AddonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &AddonName, addon: Box<dyn Installable>) {
        self.entries.insert(name.to_string(), addon);
    }

    pub fn get(&self, name: &AddonName) -> Option<&dyn Installable> {
        self.entries.get(name.as_str()).map(Box::as_ref)
    }
}

/// Applies an addon-provided data script. Implementations are expected to be
/// idempotent (insert-or-ignore); the orchestrator does not enforce it.
pub trait DataImporter {
    fn import(&self, name: &AddonName, script: &Path) -> Result<()>;
}

pub const TABLE_PREFIX_PLACEHOLDER: &str = "__PREFIX__";

/// Feeds the script to an external command on stdin, after substituting the
/// table prefix placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandImporter {
    program: String,
    args: Vec<String>,
    table_prefix: String,
}

impl CommandImporter {
    pub fn new(command: &[String], table_prefix: impl Into<String>) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("import command must not be empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            table_prefix: table_prefix.into(),
        })
    }
}

impl DataImporter for CommandImporter {
    fn import(&self, name: &AddonName, script: &Path) -> Result<()> {
        let raw = fs::read_to_string(script)
            .with_context(|| format!("failed to read import script: {}", script.display()))?;
        let prepared =
            replace_ascii_case_insensitive(&raw, TABLE_PREFIX_PLACEHOLDER, &self.table_prefix);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("ADDONKIT_ADDON", name.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start import command '{}'", self.program))?;

        let Some(mut stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("import command '{}' has no stdin pipe", self.program));
        };
        // wait_with_output drains stdout and stderr while this thread writes.
        let payload = prepared.into_bytes();
        let writer = thread::spawn(move || stdin.write_all(&payload));

        let output = child
            .wait_with_output()
            .with_context(|| format!("import command '{}' did not finish", self.program))?;
        let fed = writer
            .join()
            .map_err(|_| anyhow!("stdin writer for '{}' panicked", self.program))?;
        if output.status.success() {
            return fed
                .with_context(|| format!("failed to feed import script to '{}'", self.program));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        Err(anyhow!(
            "import command '{}' failed: status={} stdout='{}' stderr='{}'",
            self.program,
            output.status,
            stdout.trim(),
            stderr.trim()
        ))
    }
}

pub(crate) fn replace_ascii_case_insensitive(
    haystack: &str,
    needle: &str,
    replacement: &str,
) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut cursor = 0;
    while let Some(found) = lower_haystack[cursor..].find(&lower_needle) {
        let start = cursor + found;
        out.push_str(&haystack[cursor..start]);
        out.push_str(replacement);
        cursor = start + needle.len();
    }
    out.push_str(&haystack[cursor..]);
    out
}
