//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General or internal error
/// - 2: Misuse of shell command (reserved by clap for usage errors)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// Unexpected failure; details go to the log only.
    pub const INTERNAL: i32 = 1;

    /// Template unavailable (missing, deleted, or already submitted).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input, or the template cannot accept the operation.
    pub const INVALID_INPUT: i32 = 4;

    /// Lock number mismatch.
    pub const CONFLICT: i32 = 5;
}

/// Log filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Supplier used for proof requests when the config names none.
pub const DEFAULT_SUPPLIER: &str = "WTMMOCK";

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name under the XDG base directories.
pub const APP_DIR_NAME: &str = "tmplctl";
