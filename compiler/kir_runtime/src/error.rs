//! Runtime errors.
//!
//! [`Error`] is the one error type `compute` and context creation return.
//! Lower layers keep their own errors ([`CodegenError`], [`DriverError`])
//! and convert on the way up.

use std::any::Any;
use std::fmt;

use kir_codegen::CodegenError;
use kir_driver::status::{status_name, Status};
use kir_driver::DriverError;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// No platform or device matches, the entry method is missing, or
    /// naming metadata or bindings do not fit the kernel.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported construct: {construct}")]
    Unsupported { construct: String },

    #[error("not yet implemented: {construct}")]
    NotYetImplemented { construct: String },

    /// A generator or runtime defect, never a user-actionable condition.
    #[error("internal invariant violated: {message}")]
    Internal { message: String },

    /// A driver call returned a non-success status.
    #[error("{}", native_message(call, *status, log.as_deref()))]
    NativeCall {
        call: &'static str,
        status: Status,
        /// Device build log, for failed program builds.
        log: Option<String>,
    },

    #[error(transparent)]
    Execution(#[from] ExecutionFailure),

    #[error("context is closed")]
    Closed,
}

fn native_message(call: &str, status: Status, log: Option<&str>) -> String {
    let mut message = format!("{call} failed with status {status} ({})", status_name(status));
    if let Some(log) = log.filter(|log| !log.trim().is_empty()) {
        message.push_str(":\n");
        message.push_str(log.trim_end());
    }
    message
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// The native status, for [`Error::NativeCall`].
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::NativeCall { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<CodegenError> for Error {
    fn from(err: CodegenError) -> Self {
        match err {
            CodegenError::Configuration(message) => Error::Configuration(message),
            CodegenError::Unsupported { construct } => Error::Unsupported { construct },
            CodegenError::NotYetImplemented { construct } => Error::NotYetImplemented { construct },
            CodegenError::InternalInvariant { message } => Error::Internal { message },
        }
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::NativeCallFailure { call, status } => Error::NativeCall {
                call,
                status,
                log: None,
            },
            DriverError::LibraryUnavailable { .. } | DriverError::MissingSymbol { .. } => {
                Error::Configuration(err.to_string())
            }
            DriverError::MalformedInfo { .. } => Error::Internal {
                message: err.to_string(),
            },
        }
    }
}

/// Why one work-item failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct KernelFault {
    message: String,
}

impl KernelFault {
    pub fn new(message: impl Into<String>) -> Self {
        KernelFault {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Fault for a work-item that panicked.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_owned()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "work-item panicked".to_owned()
        };
        KernelFault::new(message)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemFault {
    pub work_item: usize,
    pub fault: KernelFault,
}

/// Every fault of one `compute` call, ordered by work-item id.
///
/// Items that completed before or alongside a fault keep their side
/// effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionFailure {
    /// Work-items the call was asked to run.
    pub total: usize,
    pub faults: Vec<ItemFault>,
}

impl ExecutionFailure {
    pub fn new(total: usize, mut faults: Vec<ItemFault>) -> Self {
        faults.sort_by_key(|fault| fault.work_item);
        ExecutionFailure { total, faults }
    }

    /// Ids of the failed work-items, ascending.
    pub fn work_items(&self) -> impl Iterator<Item = usize> + '_ {
        self.faults.iter().map(|fault| fault.work_item)
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} work-items failed", self.faults.len(), self.total)?;
        if let Some(first) = self.faults.first() {
            write!(f, "; work-item {}: {}", first.work_item, first.fault)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutionFailure {}

/// Collapse per-item outcomes into `Ok` or one [`ExecutionFailure`].
pub(crate) fn collect_faults(total: usize, faults: Vec<ItemFault>) -> Result<(), Error> {
    if faults.is_empty() {
        Ok(())
    } else {
        Err(ExecutionFailure::new(total, faults).into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests;
