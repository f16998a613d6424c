//! Code generation errors.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// Missing entry method, missing helper naming metadata, or an
    /// unresolvable field or method.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A node with no valid translation into the kernel language.
    #[error("unsupported construct: {construct}")]
    Unsupported { construct: String },

    #[error("not yet implemented: {construct}")]
    NotYetImplemented { construct: String },

    /// The generator reached a state its input contract rules out.
    #[error("internal invariant violated: {message}")]
    InternalInvariant { message: String },
}

impl CodegenError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn unsupported(construct: impl Into<String>) -> Self {
        Self::Unsupported {
            construct: construct.into(),
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::InternalInvariant {
            message: message.into(),
        }
    }
}
