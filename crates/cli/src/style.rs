//! Terminal styling for CLI output.

use console::Style;

use rebaser_core::RebaseResult;

/// Green checkmark prefix.
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Red cross prefix.
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Yellow warning prefix.
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// One-line summary of a rebase outcome.
pub fn rebase_result(result: RebaseResult, branch: &str) -> String {
    match result {
        RebaseResult::Success => success(&format!("Rebased onto {branch}")),
        RebaseResult::UpToDate => success(&format!("Already up to date with {branch}")),
        RebaseResult::Conflicts => warn(&format!(
            "Could not rebase onto {branch}: conflicts could not be resolved automatically"
        )),
        RebaseResult::Error => error(&format!("Failed to rebase onto {branch}")),
    }
}
