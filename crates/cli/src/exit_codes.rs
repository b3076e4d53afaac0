//! CLI exit codes.
//!
//! Scripts driving batch runs rely on these values; never renumber.
//!
//! | Range | Domain    | Description                                  |
//! |-------|-----------|----------------------------------------------|
//! | 0     | Universal | Success                                      |
//! | 1     | Universal | General error                                |
//! | 2     | Universal | Usage error (bad arguments)                  |
//! | 3-9   | input     | Workbooks and configuration                  |
//! | 10-19 | output    | Changes workbook and JSON report             |

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Command completed. Aborted categories are reported, not failures.
pub const EXIT_SUCCESS: u8 = 0;

/// Unspecified failure (terminal I/O and the like).
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments, e.g. `--batch` without `--events`.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Input (3-9)
// =============================================================================

/// A workbook, a configured sheet or the config file does not exist.
pub const EXIT_INPUT_MISSING: u8 = 3;

/// A workbook exists but cannot be opened or read.
pub const EXIT_INPUT_READ: u8 = 4;

/// Config file does not parse or fails validation.
pub const EXIT_CONFIG: u8 = 5;

/// The estimate workbook lacks its event name.
pub const EXIT_ESTIMATE: u8 = 6;

/// No event was selected for reconciliation.
pub const EXIT_NO_EVENTS: u8 = 7;

// =============================================================================
// Output (10-19)
// =============================================================================

/// The changes workbook cannot be written.
pub const EXIT_OUTPUT_WRITE: u8 = 10;

/// The JSON report cannot be written.
pub const EXIT_REPORT_WRITE: u8 = 11;
