//! Interactive confirmation and notice rendering.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use marigold_storefront::Notice;
use marigold_storefront::cart::{AlwaysConfirm, Confirmer, DestructiveAction};

/// Asks on the terminal; anything other than `y`/`yes` declines.
struct TerminalConfirmer;

#[async_trait]
impl Confirmer for TerminalConfirmer {
    async fn confirm(&self, action: &DestructiveAction) -> bool {
        let question = action.prompt();
        tokio::task::spawn_blocking(move || ask(&question))
            .await
            .unwrap_or(false)
    }
}

fn ask(question: &str) -> bool {
    let mut err = std::io::stderr().lock();
    if write!(err, "{question} [y/N] ").and_then(|()| err.flush()).is_err() {
        return false;
    }

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Confirmer for this invocation: `--yes` skips the prompt.
pub fn confirmer(assume_yes: bool) -> Box<dyn Confirmer> {
    if assume_yes {
        Box::new(AlwaysConfirm)
    } else {
        Box::new(TerminalConfirmer)
    }
}

/// Render a failure notice on stderr.
pub fn show_notice(notice: &Notice) {
    let mut err = std::io::stderr().lock();
    let _ = match notice {
        Notice::Fields(fields) => {
            let mut result = writeln!(err, "Please correct the following:");
            for (field, message) in fields.iter() {
                result = result.and_then(|()| writeln!(err, "  {field}: {message}"));
            }
            result
        }
        Notice::Blocking(_) | Notice::NetworkUnreachable => writeln!(err, "{notice}"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }
}
