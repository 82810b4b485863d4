//! ANSI colour for console results.
//!
//! Colour is on by default and switched off by `--no-color`, `NO_COLOR`,
//! `TERM=dumb`, or when stdout is not a terminal.

use std::ffi::OsStr;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};

static COLOR_ENABLED: AtomicBool = AtomicBool::new(true);

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const MAGENTA: &str = "\x1b[35m";

/// Decide once per process whether to emit colour
pub fn init(no_color_flag: bool) {
    let enabled = color_allowed(
        no_color_flag,
        std::env::var_os("NO_COLOR").as_deref(),
        std::env::var_os("TERM").as_deref(),
    ) && std::io::stdout().is_terminal();
    set_enabled(enabled);
}

/// `NO_COLOR` only counts when it holds a non-empty value
fn color_allowed(no_color_flag: bool, no_color: Option<&OsStr>, term: Option<&OsStr>) -> bool {
    let no_color_set = no_color.is_some_and(|v| !v.is_empty());
    let is_dumb_term = term.is_some_and(|t| t == "dumb");
    !no_color_flag && !no_color_set && !is_dumb_term
}

pub fn set_enabled(enabled: bool) {
    COLOR_ENABLED.store(enabled, Ordering::Relaxed);
}

#[must_use]
pub fn is_enabled() -> bool {
    COLOR_ENABLED.load(Ordering::Relaxed)
}

/// Wrap text with a colour code if colour is enabled
#[must_use]
pub fn paint(color: &str, text: &str) -> String {
    if is_enabled() {
        format!("{color}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Embolden every occurrence of `needle` in `text`
#[must_use]
pub fn emphasize(text: &str, needle: &str) -> String {
    if !is_enabled() || needle.is_empty() {
        return text.to_string();
    }
    text.replace(needle, &format!("{BOLD}{needle}{RESET}"))
}
