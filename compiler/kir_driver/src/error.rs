//! Driver errors.

use thiserror::Error;

use crate::status::{status_name, Status};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DriverError {
    /// A driver entry point returned a non-success status.
    #[error("{call} failed with status {status} ({})", status_name(*status))]
    NativeCallFailure { call: &'static str, status: Status },

    #[error("no OpenCL library could be loaded (tried {})", tried.join(", "))]
    LibraryUnavailable { tried: Vec<String> },

    #[error("OpenCL library {library} does not export {symbol}")]
    MissingSymbol { library: String, symbol: &'static str },

    /// A query returned a value of unexpected size.
    #[error("{query} returned {actual} bytes, expected {expected}")]
    MalformedInfo {
        query: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl DriverError {
    /// The native status, when the error came from a driver call.
    pub fn status(&self) -> Option<Status> {
        match self {
            DriverError::NativeCallFailure { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Map a status to `Ok(())` or a [`DriverError::NativeCallFailure`].
pub fn check(call: &'static str, status: Status) -> Result<(), DriverError> {
    if status == crate::status::CL_SUCCESS {
        Ok(())
    } else {
        Err(DriverError::NativeCallFailure { call, status })
    }
}
