//! Exit codes for the CLI.
//!
//! Codes 0-3 report whether the command itself ran. Codes 4 and 5 are only
//! used with `--fail-on-oracle`, so scripts can gate on the scan verdict.

/// Successful execution (and, with `--fail-on-oracle`, no oracle found)
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Malformed transcript, capabilities or configuration
pub const INVALID_INPUT: u8 = 2;

/// Input file not found
pub const NOT_FOUND: u8 = 3;

/// An oracle was found (`--fail-on-oracle`)
pub const ORACLE_FOUND: u8 = 4;

/// The verdict was UNCERTAIN or COULD_NOT_TEST (`--fail-on-oracle`)
pub const INCONCLUSIVE: u8 = 5;
