//! Terminal password entry.

use indicatif::ProgressBar;
use secrecy::SecretString;

use amtctl_core::{CoreError, PasswordReader};

const PROMPT: &str = "Please enter AMT Password: ";

/// Reads the AMT password from the terminal without echo.
///
/// A running spinner is suspended while the prompt is shown.
#[derive(Default)]
pub struct TerminalPasswordReader {
    spinner: Option<ProgressBar>,
}

impl TerminalPasswordReader {
    pub fn with_spinner(spinner: ProgressBar) -> Self {
        Self { spinner: Some(spinner) }
    }
}

impl PasswordReader for TerminalPasswordReader {
    fn read_password(&self) -> Result<SecretString, CoreError> {
        let entered = match &self.spinner {
            Some(spinner) => spinner.suspend(|| rpassword::prompt_password(PROMPT)),
            None => rpassword::prompt_password(PROMPT),
        }
        .map_err(|e| CoreError::MissingOrIncorrectPassword {
            reason: format!("prompt failed: {e}"),
        })?;

        if entered.is_empty() {
            return Err(CoreError::MissingOrIncorrectPassword {
                reason: "no password entered".into(),
            });
        }
        Ok(SecretString::from(entered))
    }
}
