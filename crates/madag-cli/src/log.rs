//! Diagnostic verbosity gating for stderr progress output.
//!
//! No logging crate is pulled in for this: the CLI's diagnostics are a
//! handful of `eprintln!` call sites, gated by comparing against a level
//! read once from `MADAG_LOG` (`error`/`warn`/`info`/`debug`, default `warn`).
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    fn from_str(s: &str) -> Option<Level> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Some(Level::Error),
            "warn" => Some(Level::Warn),
            "info" => Some(Level::Info),
            "debug" => Some(Level::Debug),
            _ => None,
        }
    }
}

static CURRENT: OnceLock<Level> = OnceLock::new();

/// Reads `MADAG_LOG` once per process; unset or unrecognized values fall
/// back to `warn`.
fn current_level() -> Level {
    *CURRENT.get_or_init(|| {
        std::env::var("MADAG_LOG")
            .ok()
            .and_then(|v| Level::from_str(&v))
            .unwrap_or(Level::Warn)
    })
}

/// Prints `msg` to stderr if `level` is at or below the configured verbosity.
pub fn log(level: Level, msg: &str) {
    if level <= current_level() {
        eprintln!("{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_level_strings_are_rejected() {
        assert_eq!(Level::from_str("verbose"), None);
        assert_eq!(Level::from_str("DEBUG"), Some(Level::Debug));
    }

    #[test]
    fn levels_order_error_below_debug() {
        assert!(Level::Error < Level::Debug);
        assert!(Level::Warn < Level::Info);
    }
}
