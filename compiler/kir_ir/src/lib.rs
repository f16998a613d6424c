//! Kernel IR for the kir compiler.
//!
//! This crate is the input contract of the structured code generator:
//!
//! - **Node graph** ([`Graph`], [`Node`], [`NodeKind`]): an arena of typed,
//!   immutable nodes addressed by [`NodeId`]. Operands may be shared; a node
//!   can have any number of consumers.
//! - **Types** ([`KernelType`], [`ClassName`]): the semantic type attached
//!   to every node.
//! - **Metadata** ([`Metadata`]): kernel-language names declared for helper
//!   functions and helper types.
//! - **Classes** ([`KernelClass`], [`MethodGraph`], [`KernelArgument`]):
//!   a kernel's ordered fields and its analyzed methods.
//! - **Structure** ([`Stmt`], [`Block`], [`StructuredSink`]): the nested
//!   block form produced by the upstream sequencer, and the callbacks that
//!   replay it into a code generator.
//!
//! Building the graph (bytecode analysis, dominance, loop recovery) happens
//! upstream. Everything here is plain data plus a few builder helpers.

mod class;
mod graph;
mod metadata;
mod structure;
mod types;

pub use class::{Field, KernelArgument, KernelClass, MethodGraph, Param, ENTRY_METHOD};
pub use graph::{
    BinaryOp, CompareOp, Graph, InvokeKind, Invocation, Node, NodeId, NodeKind, SwitchKind,
    ThreeWayMode,
};
pub use metadata::{HelperFunction, Metadata, TypeMetadata, WORK_ITEM_CLASS};
pub use structure::{sequence, Block, BlockKind, Label, Stmt, StructuredSink, SwitchArm};
pub use types::{ClassName, KernelType};
