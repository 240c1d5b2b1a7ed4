//! Colored terminal output
//!
//! Everything here writes to stderr. Stdout is reserved for artifact data
//! (`--stdout`), listings and exports.

use crate::transfer::TransferStatus;
use owo_colors::OwoColorize;
use std::error::Error;

/// Print an action header (blue, bold)
/// Example: "==> Resolving github.com/dpb587/gget"
pub fn action(message: &str) {
    eprintln!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print a detail line (dimmed prefix)
/// Example: "     gget-linux-amd64 -> bin/gget"
pub fn detail(message: &str) {
    eprintln!("     {}", message.dimmed());
}

/// Print a success message (green)
pub fn success(message: &str) {
    eprintln!("{} {}", "==>".green().bold(), message.green());
}

/// Print an info message (cyan)
/// Example: ":: Found 2 files (14.2 MiB) from github.com/dpb587/gget@v0.5.0"
pub fn info(message: &str) {
    eprintln!("{} {}", "::".cyan(), message);
}

/// Print a warning message (yellow)
pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Print an error message (red)
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// Final per-artifact line, colored by status.
/// Example: "√ gget-linux-amd64 done (sha256 OK)"
pub fn transfer_status(status: TransferStatus, subject: &str, summary: &str) {
    let marker = status.marker();
    match status {
        TransferStatus::Done => eprintln!("{} {} {}", marker.green().bold(), subject, summary.dimmed()),
        TransferStatus::Errored => eprintln!("{} {} {}", marker.red().bold(), subject, summary.red()),
        TransferStatus::Skipped | TransferStatus::Aborted => {
            eprintln!("{} {} {}", marker.yellow().bold(), subject.dimmed(), summary.dimmed())
        }
    }
}

/// An error followed by each of its sources, joined with `: `.
/// Example: "connecting: request to https://... failed: connection reset"
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
