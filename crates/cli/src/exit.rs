//! Process exit codes.

use doc_converter_core::{BatchSummary, ConversionError, ErrorKind};
use std::process::ExitCode;

pub const SUCCESS: u8 = 0;
pub const INVALID: u8 = 2;
pub const NOT_FOUND: u8 = 3;
pub const CONVERSION: u8 = 4;
pub const PERMISSION: u8 = 5;
pub const CANCELLED: u8 = 130;

pub fn code_for_kind(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidConfig | ErrorKind::UnsupportedConversion => INVALID,
        ErrorKind::NotFound => NOT_FOUND,
        ErrorKind::Conversion | ErrorKind::Timeout => CONVERSION,
        ErrorKind::Permission => PERMISSION,
        ErrorKind::Cancelled => CANCELLED,
    }
}

/// Exit code for an error that aborted the command.
///
/// Errors that did not originate in the converter count as invalid usage.
pub fn code_for_error(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ConversionError>())
        .map(|e| code_for_kind(e.kind()))
        .unwrap_or(INVALID)
}

pub fn code_for_summary(summary: &BatchSummary) -> u8 {
    if summary.cancelled {
        CANCELLED
    } else if summary.failed > 0 {
        CONVERSION
    } else {
        SUCCESS
    }
}

pub fn exit_code(code: u8) -> ExitCode {
    ExitCode::from(code)
}
