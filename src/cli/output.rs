//! Output helpers for consistent CLI formatting
//!
//! Results a script might consume go to stdout unadorned; status lines are
//! prefixed and styled (`console` drops the styling when not on a terminal).

use console::style;

/// Display a success step
pub fn step_ok(message: &str) {
    println!("{} {}", style("[OK]").green(), message);
}

/// Display a success step with detail
pub fn step_ok_detail(message: &str, detail: &str) {
    println!("{} {} ({})", style("[OK]").green(), message, style(detail).dim());
}

/// Display a warning step with hint
pub fn step_warn_hint(message: &str, hint: &str) {
    println!("{} {} - {}", style("[WARN]").yellow(), message, style(hint).dim());
}

/// Display an info step
pub fn step_info(message: &str) {
    println!("{} {}", style("[INFO]").cyan(), message);
}

/// Display a remark on stderr, keeping stdout clean for values
pub fn remark(message: &str) {
    eprintln!("{}", style(message).dim());
}

/// Print a styled key-value pair
pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}
