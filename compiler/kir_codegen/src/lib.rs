//! Structured code generation for kir kernels.
//!
//! Turns a [`KernelClass`](kir_ir::KernelClass), whose methods have already
//! been analyzed into typed node graphs and structured bodies, into one
//! compilation unit of OpenCL C.
//!
//! # Pipeline
//!
//! 1. [`generate_kernel_source`] derives the kernel argument list from the
//!    class fields and emits forward prototypes for helper methods.
//! 2. Each method is emitted by a `FunctionEmitter`, which implements
//!    [`StructuredSink`](kir_ir::StructuredSink) and is driven by
//!    [`kir_ir::sequence`] over the method body.
//! 3. Expressions are evaluated with an explicit worklist; shared and
//!    side-effecting nodes become named temporaries exactly once.
//!    A planning pass first finds shared values that are used across a
//!    block, branch, or case boundary, so they are bound in a scope that
//!    covers every consumer.
//!
//! Helper methods come first, the entry method last. Every generated
//! function receives the kernel arguments as explicit parameters.

mod error;
mod expr;
mod function;
mod placement;
mod stmt;
mod types;
mod unit;
mod writer;

#[cfg(test)]
mod test_helpers;

pub use error::CodegenError;
pub use types::{sanitize_identifier, TypeNamer};
pub use unit::{generate_kernel_source, KernelSource};
pub use writer::CodeWriter;
