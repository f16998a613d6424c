use pretty_assertions::assert_eq;

use super::*;

#[test]
fn ids_are_allocated_sequentially() {
    let mut graph = Graph::new();
    let a = graph.int(1);
    let b = graph.int(2);
    assert_eq!(a, NodeId::new(0));
    assert_eq!(b, NodeId::new(1));
    assert_eq!(graph.len(), 2);
}

#[test]
fn use_counts_count_every_operand_slot() {
    let mut graph = Graph::new();
    let ten = graph.int(10);
    let twenty = graph.int(20);
    let inner = graph.binary(BinaryOp::Add, ten, twenty);
    let outer = graph.binary(BinaryOp::Add, inner, inner);

    let counts = graph.use_counts();
    assert_eq!(counts[inner.index()], 2);
    assert_eq!(counts[ten.index()], 1);
    assert_eq!(counts[outer.index()], 0);
}

#[test]
fn binary_takes_left_operand_type() {
    let mut graph = Graph::new();
    let a = graph.float(1.5);
    let b = graph.float(2.0);
    let sum = graph.binary(BinaryOp::Mul, a, b);
    assert_eq!(graph.get(sum).map(|n| n.ty.clone()), Some(KernelType::Float));
}

#[test]
fn array_load_takes_element_type() {
    let mut graph = Graph::new();
    let array = graph.param(0, KernelType::array_of(KernelType::Float));
    let index = graph.int(0);
    let load = graph.array_load(array, index);
    assert_eq!(graph.get(load).map(|n| n.ty.clone()), Some(KernelType::Float));
}

#[test]
fn phi_splits_predecessors_and_values() {
    let mut graph = Graph::new();
    let left = graph.marker(NodeKind::Goto);
    let right = graph.marker(NodeKind::Goto);
    let one = graph.int(1);
    let two = graph.int(2);
    let phi = graph.phi(KernelType::Int, &[(left, one), (right, two)]);

    let node = graph.get(phi).map(Clone::clone);
    let Some(Node {
        kind: NodeKind::Phi { predecessors },
        operands,
        ..
    }) = node
    else {
        panic!("expected phi node");
    };
    assert_eq!(predecessors.as_slice(), &[left, right]);
    assert_eq!(operands.as_slice(), &[one, two]);
    assert_eq!(graph.phis().count(), 1);
}

#[test]
fn integer_division_is_side_effecting() {
    let div = NodeKind::Binary(BinaryOp::Div);
    assert!(div.has_side_effects(&KernelType::Int));
    assert!(!div.has_side_effects(&KernelType::Float));
    assert!(!NodeKind::Binary(BinaryOp::Add).has_side_effects(&KernelType::Int));
    assert!(NodeKind::ArrayLoad.has_side_effects(&KernelType::Float));
}

#[test]
fn receiver_presence_follows_invoke_kind() {
    let owner = ClassName::new("demo.Kernel");
    assert!(!Invocation::new(InvokeKind::Static, owner.clone(), "f").has_receiver());
    assert!(Invocation::new(InvokeKind::Special, owner.clone(), "g").has_receiver());
    assert!(!Invocation::new(InvokeKind::Dynamic, owner, "h").has_receiver());
}

#[test]
fn class_name_simple_name() {
    assert_eq!(ClassName::new("demo.vec.Float2").simple_name(), "Float2");
    assert_eq!(ClassName::new("Outer$Inner").simple_name(), "Inner");
    assert_eq!(ClassName::new("Plain").simple_name(), "Plain");
}
