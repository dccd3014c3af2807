//! Error display for the CLI.

use colored::Colorize;
use mapicheck_client::ClusterError;
use mapicheck_verify::VerifyError;

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(hint) = hint_for(err) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

/// A hint for the first error in the chain that has one.
fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    for cause in err.chain() {
        if let Some(verify) = cause.downcast_ref::<VerifyError>() {
            if verify.is_timeout() {
                return Some(
                    "The cluster may still be converging. Raise MAPICHECK_WAIT_SHORT_SECS, \
                     MAPICHECK_WAIT_MEDIUM_SECS or MAPICHECK_WAIT_LONG_SECS to wait longer.",
                );
            }
            if verify.is_cancelled() {
                return Some("Interrupted before the cluster converged.");
            }
        }

        if let Some(cluster) = cause.downcast_ref::<ClusterError>() {
            return match cluster {
                ClusterError::Api { status: 401, .. } => {
                    Some("Your token may have expired. Pass a fresh one with --token or MAPICHECK_TOKEN.")
                }
                ClusterError::Api { status: 403, .. } => {
                    Some("The token may not have permission for this operation.")
                }
                ClusterError::Transport(_) => {
                    Some("Check your network connection and the API server URL (--api-url).")
                }
                _ => None,
            };
        }
    }
    None
}
