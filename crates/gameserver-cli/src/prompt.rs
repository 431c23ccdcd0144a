//! Operator confirmation prompts.

use std::io::{self, BufRead, IsTerminal, Write};

use gameserver_core::{ConfirmRequest, Confirmer};
use tracing::{info, warn};

/// Asks on stderr and reads the answer from stdin.
///
/// Without an interactive stdin every question is declined.
#[derive(Debug, Default)]
pub(crate) struct TerminalConfirm;

impl Confirmer for TerminalConfirm {
    fn confirm(&mut self, request: &ConfirmRequest) -> bool {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            warn!(question = %request, "stdin is not a terminal; declining (pass --yes to accept)");
            return false;
        }
        let mut stderr = io::stderr();
        if write!(stderr, "{} [y/N] ", request.to_string().trim_end())
            .and_then(|()| stderr.flush())
            .is_err()
        {
            return false;
        }
        let mut answer = String::new();
        match stdin.lock().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(err) => {
                warn!(error = %err, "failed to read confirmation");
                false
            }
        }
    }
}

/// Accepts every question; selected by `--yes`.
#[derive(Debug, Default)]
pub(crate) struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&mut self, request: &ConfirmRequest) -> bool {
        info!(question = %request, "accepted by --yes");
        true
    }
}

pub(crate) fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn only_explicit_yes_is_affirmative() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn assume_yes_accepts_everything() {
        let request = ConfirmRequest::RemoveInstallDir {
            game: "Valheim".to_string(),
            path: PathBuf::from("/srv/vh"),
        };
        assert!(AssumeYes.confirm(&request));
    }
}
