//! CLI Exit Code Registry
//!
//! Single source of truth for `parcelmerge` exit codes. Scripts rely on
//! them, so existing values never change meaning.
//!
//! | Code | Meaning                                                    |
//! |------|------------------------------------------------------------|
//! | 0    | Success                                                    |
//! | 1    | General error (unspecified)                                |
//! | 2    | Usage error (bad arguments)                                |
//! | 3    | Merge recorded conflicts and `--fail-on-conflict` was set  |
//! | 4    | Policy file failed to parse or validate                    |
//! | 5    | Runtime error: unreadable or malformed input, write failed |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, nothing to merge.
pub const EXIT_USAGE: u8 = 2;

/// The merge succeeded but sources disagreed on at least one field, and the
/// caller asked to treat that as failure.
pub const EXIT_MERGE_CONFLICTS: u8 = 3;

/// Policy TOML is malformed or fails validation.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// Input file unreadable, record or metadata JSON malformed, or output
/// could not be written.
pub const EXIT_RUNTIME: u8 = 5;
