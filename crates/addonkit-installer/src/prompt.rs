use anyhow::{bail, Result};

/// Operator confirmation. `Ok(false)` is a decline; an error means nobody
/// could be asked.
pub trait Prompt {
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// Refuses to ask. Operations that need confirmation fail unless the request
/// is already confirmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl Prompt for NonInteractive {
    fn confirm(&self, message: &str) -> Result<bool> {
        bail!(
            "cannot prompt for confirmation in non-interactive mode ({message}); pass --yes to proceed"
        )
    }
}
