//! Command-line interface.

mod commands;

pub use commands::run;

/// Peek at argv before clap parses, so logging can be configured first.
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}
