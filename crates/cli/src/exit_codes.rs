//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `uocc-skid` exit codes.
//! Schedulers alert on them, so they are part of the job's contract.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                                |
//! |---------|------------------|--------------------------------------------|
//! | 0       | Universal        | Success                                    |
//! | 1       | Universal        | General error (local I/O, logging setup)   |
//! | 2       | Universal        | CLI usage error (bad args)                 |
//! | 10-19   | config           | Settings and secrets                       |
//! | 20-29   | services         | Feature service, Sheets, mail              |
//! | 30-39   | data             | Distribution, reconciliation, locations    |
//! | 40-49   | survey           | Survey bundle rewrite                      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map the error to it in `SkidError::exit_code`

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - every stage completed.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - temp dir, log file, or other local I/O.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments. clap exits with this on its own.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (10-19)
// =============================================================================

/// Settings file unreadable, malformed, or invalid.
pub const EXIT_SETTINGS: u8 = 10;

/// Neither the secrets mount nor the local secrets directory exists.
pub const EXIT_SECRETS_NOT_FOUND: u8 = 11;

/// Secrets file present but unreadable or missing a key.
pub const EXIT_SECRETS_INVALID: u8 = 12;

// =============================================================================
// Services (20-29)
// =============================================================================

/// Credentials rejected or no token available.
pub const EXIT_AUTH: u8 = 20;

/// Feature service or mail request failed.
pub const EXIT_SERVICE: u8 = 21;

/// Spreadsheet or worksheet could not be read or written.
pub const EXIT_SHEETS: u8 = 22;

// =============================================================================
// Data (30-39)
// =============================================================================

/// At least one district ledger could not be updated.
pub const EXIT_DISTRIBUTION: u8 = 30;

/// A table lacks a column the job keys on.
pub const EXIT_DATA: u8 = 31;

/// Location rows could not be converted to features.
pub const EXIT_LOCATIONS: u8 = 32;

// =============================================================================
// Survey (40-49)
// =============================================================================

/// Survey package is not a readable archive or lacks the facility CSV.
pub const EXIT_SURVEY_BUNDLE: u8 = 40;
