//! Shared factories for generator tests. Only compiled in test builds.

use kir_ir::{
    ClassName, Graph, KernelClass, KernelType, Metadata, MethodGraph, Param, Stmt, ENTRY_METHOD,
};

use crate::error::CodegenError;
use crate::function::{FunctionEmitter, UnitContext};

pub(crate) const KERNEL: &str = "demo.Kernel";
pub(crate) const MATH: &str = "demo.Math";

pub(crate) fn kernel_name() -> ClassName {
    ClassName::new(KERNEL)
}

pub(crate) fn math() -> ClassName {
    ClassName::new(MATH)
}

/// Helper metadata used across tests: `demo.Math.{a,b,f}` and a
/// literal `demo.Float2.make`.
pub(crate) fn test_metadata() -> Metadata {
    let float2 = ClassName::new("demo.Float2");
    Metadata::with_builtins()
        .with_function(&math(), "a", "fa", false)
        .with_function(&math(), "b", "fb", false)
        .with_function(&math(), "f", "f", false)
        .with_function(&float2, "make", "float2", true)
        .with_type(&float2, "float2", Some(2))
}

/// A method `f(params) -> return_type` with the given graph and body.
pub(crate) fn method(
    params: Vec<Param>,
    return_type: KernelType,
    graph: Graph,
    body: Vec<Stmt>,
) -> MethodGraph {
    MethodGraph::new("f", params, return_type).with_body(graph, body)
}

pub(crate) fn entry(graph: Graph, body: Vec<Stmt>) -> MethodGraph {
    MethodGraph::new(ENTRY_METHOD, vec![], KernelType::Void).with_body(graph, body)
}

/// Kernel class with test metadata and the given method as method 0.
pub(crate) fn class_with(method: MethodGraph) -> KernelClass {
    KernelClass::new(KERNEL)
        .with_metadata(test_metadata())
        .with_method(method)
}

/// Run `f` against an emitter for method 0 of `class`.
pub(crate) fn with_emitter<T>(
    class: &KernelClass,
    f: impl FnOnce(&mut FunctionEmitter<'_>) -> T,
) -> T {
    let ctx = UnitContext::new(class);
    let mut emitter = FunctionEmitter::new(&ctx, &class.methods[0]);
    f(&mut emitter)
}

/// Replay method 0's body; returns `(declarations, body text)`.
pub(crate) fn emit_body(class: &KernelClass) -> Result<(Vec<String>, String), CodegenError> {
    let ctx = UnitContext::new(class);
    let mut emitter = FunctionEmitter::new(&ctx, &class.methods[0]);
    kir_ir::sequence(&class.methods[0].body, &mut emitter)?;
    emitter.finish()
}
