use kir_ir::{
    BinaryOp, Block, CompareOp, Graph, KernelType, Label, NodeId, NodeKind, Param, Stmt,
    StructuredSink, SwitchArm,
};
use pretty_assertions::assert_eq;

use crate::error::CodegenError;
use crate::test_helpers::{class_with, emit_body, method, with_emitter};

use super::*;

fn int_param() -> Vec<Param> {
    vec![Param::new("p", KernelType::Int)]
}

fn body_of(
    params: Vec<Param>,
    return_type: KernelType,
    graph: Graph,
    body: Vec<Stmt>,
) -> Result<(Vec<String>, String), CodegenError> {
    emit_body(&class_with(method(params, return_type, graph, body)))
}

#[test]
fn if_else_with_returns_has_no_jumps() {
    let mut graph = Graph::new();
    let p = graph.param(0, KernelType::Int);
    let zero = graph.int(0);
    let cond = graph.compare(CompareOp::Gt, p, zero);
    let branch = graph.if_node(cond);
    let one = graph.int(1);
    let two = graph.int(2);
    let ret_one = graph.ret(Some(one));
    let ret_two = graph.ret(Some(two));

    let body = vec![Stmt::If {
        node: branch,
        then_body: vec![Stmt::Return(ret_one)],
        else_body: vec![Stmt::Return(ret_two)],
    }];
    let (declarations, text) = body_of(int_param(), KernelType::Int, graph, body).unwrap();

    assert!(declarations.is_empty());
    assert_eq!(
        text,
        "if (p > 0) {\n    return 1;\n} else {\n    return 2;\n}\n"
    );
    assert!(!text.contains("goto"));
    assert!(!text.contains("_exit"));
}

fn store_loop(with_break: bool) -> Result<(Vec<String>, String), CodegenError> {
    let mut graph = Graph::new();
    let array = graph.param(0, KernelType::array_of(KernelType::Int));
    let zero = graph.int(0);
    let one = graph.int(1);
    let store = graph.array_store(array, zero, one);
    let back = graph.marker(NodeKind::Goto);
    let out = graph.marker(NodeKind::Goto);

    let mut loop_body = vec![Stmt::Effect(store)];
    if with_break {
        loop_body.push(Stmt::Break {
            from: out,
            label: Label::new("L1"),
        });
    } else {
        loop_body.push(Stmt::Continue {
            from: back,
            label: Label::new("L1"),
        });
    }
    let body = vec![Stmt::Block {
        block: Block::looping("L1"),
        body: loop_body,
    }];
    body_of(
        vec![Param::new("xs", KernelType::array_of(KernelType::Int))],
        KernelType::Void,
        graph,
        body,
    )
}

#[test]
fn loop_without_break_has_no_exit_label() {
    let (_, text) = store_loop(false).unwrap();
    assert_eq!(
        text,
        "L1: while (true) {\n    xs[0] = 1;\n    goto L1;\n}\n"
    );
    assert!(!text.contains("L1_exit"));
}

#[test]
fn loop_with_break_emits_exit_label_once() {
    let (_, text) = store_loop(true).unwrap();
    assert_eq!(
        text,
        "L1: while (true) {\n    xs[0] = 1;\n    goto L1_exit;\n}\nL1_exit: ;\n"
    );
    assert_eq!(text.matches("L1_exit: ;").count(), 1);
}

#[test]
fn loop_counter_phi_is_assigned_on_each_edge() {
    let mut graph = Graph::new();
    let n = graph.param(0, KernelType::Int);
    let entry = graph.marker(NodeKind::Start);
    let back = graph.marker(NodeKind::Goto);
    let out = graph.marker(NodeKind::Goto);
    let zero = graph.int(0);
    let one = graph.int(1);

    let phi_id = NodeId::new(u32::try_from(graph.len()).unwrap());
    let next_id = NodeId::new(phi_id.raw() + 1);
    let phi = graph.phi(KernelType::Int, &[(entry, zero), (back, next_id)]);
    let next = graph.binary(BinaryOp::Add, phi, one);
    assert_eq!(next, next_id);

    let cond = graph.compare(CompareOp::Lt, phi, n);
    let branch = graph.if_node(cond);
    let ret = graph.ret(None);

    let body = vec![
        Stmt::Edge { from: entry },
        Stmt::Block {
            block: Block::looping("L1"),
            body: vec![Stmt::If {
                node: branch,
                then_body: vec![Stmt::Continue {
                    from: back,
                    label: Label::new("L1"),
                }],
                else_body: vec![Stmt::Break {
                    from: out,
                    label: Label::new("L1"),
                }],
            }],
        },
        Stmt::Return(ret),
    ];
    let (declarations, text) = body_of(
        vec![Param::new("n", KernelType::Int)],
        KernelType::Void,
        graph,
        body,
    )
    .unwrap();

    assert_eq!(declarations, vec!["int phi0;".to_owned()]);
    assert_eq!(
        text,
        "phi0 = 0;\n\
         L1: while (true) {\n\
         \x20   if (phi0 < n) {\n\
         \x20       phi0 = (phi0 + 1);\n\
         \x20       goto L1;\n\
         \x20   } else {\n\
         \x20       goto L1_exit;\n\
         \x20   }\n\
         }\n\
         L1_exit: ;\n\
         return;\n"
    );
}

#[test]
fn swapping_phis_stages_values() {
    let mut graph = Graph::new();
    let entry = graph.marker(NodeKind::Start);
    let back = graph.marker(NodeKind::Goto);
    let one = graph.int(1);
    let two = graph.int(2);
    let first = NodeId::new(u32::try_from(graph.len()).unwrap());
    let second = NodeId::new(first.raw() + 1);
    graph.phi(KernelType::Int, &[(entry, one), (back, second)]);
    graph.phi(KernelType::Int, &[(entry, two), (back, first)]);

    let class = class_with(method(vec![], KernelType::Void, graph, vec![]));
    let text = with_emitter(&class, |emitter| {
        emitter.write_edge(back)?;
        Ok::<_, CodegenError>(emitter.writer.output().to_owned())
    })
    .unwrap();

    assert_eq!(
        text,
        "int var2 = phi1;\nint var3 = phi0;\nphi0 = var2;\nphi1 = var3;\n"
    );
}

#[test]
fn switch_always_has_default() {
    let mut graph = Graph::new();
    let p = graph.param(0, KernelType::Int);
    let switch = graph.add(
        NodeKind::Switch(kir_ir::SwitchKind::Lookup),
        KernelType::Void,
        &[p],
    );
    let ten = graph.int(10);
    let ret_ten = graph.ret(Some(ten));
    let zero = graph.int(0);
    let ret_zero = graph.ret(Some(zero));

    let body = vec![
        Stmt::Switch {
            node: switch,
            arms: vec![SwitchArm {
                key: 1,
                body: vec![Stmt::Return(ret_ten)],
            }],
            default: vec![],
        },
        Stmt::Return(ret_zero),
    ];
    let (_, text) = body_of(int_param(), KernelType::Int, graph, body).unwrap();
    assert_eq!(
        text,
        "switch (p) {\n\
         \x20   case 1: {\n\
         \x20       return 10;\n\
         \x20       break;\n\
         \x20   }\n\
         \x20   default: {\n\
         \x20       break;\n\
         \x20   }\n\
         }\n\
         return 0;\n"
    );
}

#[test]
fn value_shared_by_both_arms_is_bound_before_the_branch() {
    let mut graph = Graph::new();
    let p = graph.param(0, KernelType::Int);
    let one = graph.int(1);
    let x = graph.binary(BinaryOp::Add, p, one);
    let square = graph.binary(BinaryOp::Mul, x, x);
    let diff = graph.binary(BinaryOp::Sub, x, x);
    let cond = graph.compare(CompareOp::Eq, p, one);
    let branch = graph.if_node(cond);
    let ret_square = graph.ret(Some(square));
    let ret_diff = graph.ret(Some(diff));

    let body = vec![Stmt::If {
        node: branch,
        then_body: vec![Stmt::Return(ret_square)],
        else_body: vec![Stmt::Return(ret_diff)],
    }];
    let (_, text) = body_of(int_param(), KernelType::Int, graph, body).unwrap();
    assert_eq!(
        text,
        "int var0 = (p + 1);\n\
         if (p == 1) {\n\
         \x20   return (var0 * var0);\n\
         } else {\n\
         \x20   return (var0 - var0);\n\
         }\n"
    );
}

#[test]
fn value_used_in_a_branch_and_after_it_is_evaluated_once() {
    let mut graph = Graph::new();
    let p = graph.param(0, KernelType::Int);
    let xs = graph.param(1, KernelType::array_of(KernelType::Int));
    let x = graph.binary(BinaryOp::Mul, p, p);
    let one = graph.int(1);
    let cond = graph.compare(CompareOp::Gt, p, one);
    let branch = graph.if_node(cond);
    let zero = graph.int(0);
    let store = graph.array_store(xs, zero, x);
    let ret = graph.ret(Some(x));

    let body = vec![
        Stmt::If {
            node: branch,
            then_body: vec![Stmt::Effect(store)],
            else_body: vec![],
        },
        Stmt::Return(ret),
    ];
    let params = vec![
        Param::new("p", KernelType::Int),
        Param::new("xs", KernelType::array_of(KernelType::Int)),
    ];
    let (_, text) = body_of(params, KernelType::Int, graph, body).unwrap();
    assert_eq!(text.matches("(p * p)").count(), 1);
    assert_eq!(
        text,
        "int var0 = (p * p);\n\
         if (p > 1) {\n\
         \x20   xs[0] = var0;\n\
         } else {\n\
         }\n\
         return var0;\n"
    );
}

#[test]
fn loop_invariant_value_used_after_the_loop_is_bound_before_it() {
    let mut graph = Graph::new();
    let p = graph.param(0, KernelType::Int);
    let xs = graph.param(1, KernelType::array_of(KernelType::Int));
    let k = graph.binary(BinaryOp::Mul, p, p);
    let zero = graph.int(0);
    let store = graph.array_store(xs, zero, k);
    let out = graph.marker(NodeKind::Goto);
    let ret = graph.ret(Some(k));

    let body = vec![
        Stmt::Block {
            block: Block::looping("L1"),
            body: vec![
                Stmt::Effect(store),
                Stmt::Break {
                    from: out,
                    label: Label::new("L1"),
                },
            ],
        },
        Stmt::Return(ret),
    ];
    let params = vec![
        Param::new("p", KernelType::Int),
        Param::new("xs", KernelType::array_of(KernelType::Int)),
    ];
    let (_, text) = body_of(params, KernelType::Int, graph, body).unwrap();
    assert_eq!(
        text,
        "int var0 = (p * p);\n\
         L1: while (true) {\n\
         \x20   xs[0] = var0;\n\
         \x20   goto L1_exit;\n\
         }\n\
         L1_exit: ;\n\
         return var0;\n"
    );
}

#[test]
fn value_tied_to_a_loop_phi_is_kept_past_the_loop() {
    let mut graph = Graph::new();
    let n = graph.param(0, KernelType::Int);
    let xs = graph.param(1, KernelType::array_of(KernelType::Int));
    let entry = graph.marker(NodeKind::Start);
    let back = graph.marker(NodeKind::Goto);
    let out = graph.marker(NodeKind::Goto);
    let zero = graph.int(0);
    let one = graph.int(1);

    let phi_id = NodeId::new(u32::try_from(graph.len()).unwrap());
    let next_id = NodeId::new(phi_id.raw() + 1);
    let phi = graph.phi(KernelType::Int, &[(entry, zero), (back, next_id)]);
    let next = graph.binary(BinaryOp::Add, phi, one);
    assert_eq!(next, next_id);
    let store = graph.array_store(xs, zero, next);
    let cond = graph.compare(CompareOp::Lt, phi, n);
    let branch = graph.if_node(cond);
    let ret = graph.ret(Some(next));

    let body = vec![
        Stmt::Edge { from: entry },
        Stmt::Block {
            block: Block::looping("L1"),
            body: vec![
                Stmt::Effect(store),
                Stmt::If {
                    node: branch,
                    then_body: vec![Stmt::Continue {
                        from: back,
                        label: Label::new("L1"),
                    }],
                    else_body: vec![Stmt::Break {
                        from: out,
                        label: Label::new("L1"),
                    }],
                },
            ],
        },
        Stmt::Return(ret),
    ];
    let params = vec![
        Param::new("n", KernelType::Int),
        Param::new("xs", KernelType::array_of(KernelType::Int)),
    ];
    let (declarations, text) = body_of(params, KernelType::Int, graph, body).unwrap();

    assert_eq!(declarations, vec!["int phi0;".to_owned(), "int var1;".to_owned()]);
    assert_eq!(text.matches("(phi0 + 1)").count(), 1);
    assert_eq!(
        text,
        "phi0 = 0;\n\
         L1: while (true) {\n\
         \x20   var1 = (phi0 + 1);\n\
         \x20   xs[0] = var1;\n\
         \x20   if (phi0 < n) {\n\
         \x20       phi0 = var1;\n\
         \x20       goto L1;\n\
         \x20   } else {\n\
         \x20       goto L1_exit;\n\
         \x20   }\n\
         }\n\
         L1_exit: ;\n\
         return var1;\n"
    );
}

#[test]
fn side_effects_in_nested_scope_are_hoisted() {
    let mut graph = Graph::new();
    let array = graph.param(0, KernelType::array_of(KernelType::Float));
    let zero = graph.int(0);
    let load = graph.array_load(array, zero);
    let ret = graph.ret(Some(load));

    let body = vec![
        Stmt::Block {
            block: Block::sequence("B1"),
            body: vec![Stmt::Effect(load)],
        },
        Stmt::Return(ret),
    ];
    let (declarations, text) = body_of(
        vec![Param::new("xs", KernelType::array_of(KernelType::Float))],
        KernelType::Float,
        graph,
        body,
    )
    .unwrap();
    assert_eq!(declarations, vec!["float var0;".to_owned()]);
    assert_eq!(text, "B1: {\n    var0 = xs[0];\n}\nreturn var0;\n");
}

#[test]
fn duplicate_label_is_invariant_violation() {
    let graph = Graph::new();
    let body = vec![
        Stmt::Block {
            block: Block::sequence("B1"),
            body: vec![],
        },
        Stmt::Block {
            block: Block::sequence("B1"),
            body: vec![],
        },
    ];
    assert!(matches!(
        body_of(vec![], KernelType::Void, graph, body),
        Err(CodegenError::InternalInvariant { .. })
    ));
}

#[test]
fn break_to_unknown_label_is_invariant_violation() {
    let mut graph = Graph::new();
    let from = graph.marker(NodeKind::Goto);
    let body = vec![Stmt::Break {
        from,
        label: Label::new("nowhere"),
    }];
    assert!(matches!(
        body_of(vec![], KernelType::Void, graph, body),
        Err(CodegenError::InternalInvariant { .. })
    ));
}

#[test]
fn continue_to_sequence_block_is_invariant_violation() {
    let mut graph = Graph::new();
    let from = graph.marker(NodeKind::Goto);
    let body = vec![Stmt::Block {
        block: Block::sequence("B1"),
        body: vec![Stmt::Continue {
            from,
            label: Label::new("B1"),
        }],
    }];
    assert!(matches!(
        body_of(vec![], KernelType::Void, graph, body),
        Err(CodegenError::InternalInvariant { .. })
    ));
}

#[test]
fn mismatched_block_close_is_invariant_violation() {
    let class = class_with(method(vec![], KernelType::Void, Graph::new(), vec![]));
    let result = with_emitter(&class, |emitter| {
        emitter.start_block(&Block::sequence("A"))?;
        emitter.finish_block(&Block::sequence("B"))
    });
    assert!(matches!(result, Err(CodegenError::InternalInvariant { .. })));
}

#[test]
fn strip_outer_parens_only_removes_enclosing_pair() {
    assert_eq!(strip_outer_parens("(a < b)"), "a < b");
    assert_eq!(strip_outer_parens("(a) + (b)"), "(a) + (b)");
    assert_eq!(strip_outer_parens("x"), "x");
}
