//! Output formatting utilities for CLI commands

use colored::Colorize;
use shutter_shared::{RoundResult, ToggleOutcome};

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print one round, one line per endpoint.
pub fn round(result: &RoundResult) {
    let action = if result.enabled { "enable" } else { "disable" };
    info(&format!(
        "{} round: {}/{} acknowledged in {} ms",
        action,
        result.acknowledged(),
        result.outcomes.len(),
        result.elapsed_ms
    ));

    for o in &result.outcomes {
        let line = format!("  {:<24} {}", o.endpoint.to_string(), o.outcome);
        match o.outcome {
            ToggleOutcome::Acknowledged => println!("{}", line.green()),
            ToggleOutcome::Failed(_) => println!("{}", line.red()),
            ToggleOutcome::TimedOut => println!("{}", line.yellow()),
        }
    }

    if let Some(err) = &result.error {
        warning(err);
    }
}

/// Print a value as pretty JSON.
pub fn json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
