use std::io::{self, IsTerminal, Write};

use addonkit_installer::Prompt;
use anyhow::{bail, Result};

/// Asks on stderr, reads the answer from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn confirm(&self, message: &str) -> Result<bool> {
        if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
            bail!("cannot prompt for confirmation in non-interactive mode; pass --yes to proceed");
        }

        write!(io::stderr(), "{message} [y/N] ")?;
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(is_affirmative(&input))
    }
}

pub(crate) fn is_affirmative(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
