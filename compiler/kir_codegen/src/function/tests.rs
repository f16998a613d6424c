use kir_ir::{Block, Graph, KernelClass, KernelType, MethodGraph, Param, StructuredSink};
use pretty_assertions::assert_eq;

use crate::test_helpers::{class_with, entry, method, with_emitter, KERNEL};

use super::*;

fn saxpy_class() -> KernelClass {
    KernelClass::new(KERNEL)
        .with_field("alpha", KernelType::Float)
        .with_field("xs", KernelType::array_of(KernelType::Float))
        .with_method(entry(Graph::new(), vec![]))
        .with_method(MethodGraph::new(
            "scale",
            vec![Param::new("v", KernelType::Float)],
            KernelType::Float,
        ))
}

#[test]
fn entry_signature_puts_kernel_arguments_first() {
    let class = saxpy_class();
    let ctx = UnitContext::new(&class);
    assert_eq!(
        signature(&ctx, &class.methods[0], MethodRole::Entry),
        Ok("__kernel void process_work_item(float alpha, __global float* xs)".to_owned())
    );
}

#[test]
fn helper_signature_appends_kernel_arguments() {
    let class = saxpy_class();
    let ctx = UnitContext::new(&class);
    assert_eq!(
        signature(&ctx, &class.methods[1], MethodRole::Helper),
        Ok("float scale(float v, float alpha, __global float* xs)".to_owned())
    );
}

#[test]
fn empty_parameter_list_is_void() {
    let class = class_with(method(vec![], KernelType::Int, Graph::new(), vec![]));
    let ctx = UnitContext::new(&class);
    assert_eq!(
        signature(&ctx, &class.methods[0], MethodRole::Helper),
        Ok("int f(void)".to_owned())
    );
}

#[test]
fn entry_returning_a_value_is_configuration_error() {
    let class = class_with(method(vec![], KernelType::Int, Graph::new(), vec![]));
    let ctx = UnitContext::new(&class);
    assert!(matches!(
        signature(&ctx, &class.methods[0], MethodRole::Entry),
        Err(CodegenError::Configuration(_))
    ));
}

#[test]
fn phis_are_declared_up_front() {
    let mut graph = Graph::new();
    let start = graph.marker(kir_ir::NodeKind::Start);
    let zero = graph.float(0.0);
    graph.phi(KernelType::Float, &[(start, zero)]);
    let class = class_with(method(vec![], KernelType::Void, graph, vec![]));
    let declarations = with_emitter(&class, |emitter| emitter.declarations.clone());
    assert_eq!(declarations, vec!["float phi0;".to_owned()]);
}

#[test]
fn unclosed_block_fails_finish() {
    let class = class_with(method(vec![], KernelType::Void, Graph::new(), vec![]));
    let ctx = UnitContext::new(&class);
    let mut emitter = FunctionEmitter::new(&ctx, &class.methods[0]);
    assert_eq!(emitter.start_block(&Block::sequence("B1")), Ok(()));
    assert!(matches!(
        emitter.finish(),
        Err(CodegenError::InternalInvariant { .. })
    ));
}

#[test]
fn emit_method_wraps_body_and_declarations() {
    let mut graph = Graph::new();
    let p = graph.param(0, KernelType::Int);
    let ret = graph.ret(Some(p));
    let class = class_with(method(
        vec![Param::new("x", KernelType::Int)],
        KernelType::Int,
        graph,
        vec![kir_ir::Stmt::Return(ret)],
    ));
    let ctx = UnitContext::new(&class);
    let mut out = CodeWriter::new();
    assert_eq!(
        emit_method(&ctx, &class.methods[0], MethodRole::Helper, &mut out),
        Ok(())
    );
    assert_eq!(out.take_output(), "int f(int x) {\n    return x;\n}\n");
}
