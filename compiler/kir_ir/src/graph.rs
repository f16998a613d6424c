//! Node arena: the typed data/control graph of one analyzed method.
//!
//! Nodes are immutable once added and addressed by [`NodeId`]. Operands
//! refer to earlier or later nodes freely; the arena does not require a
//! topological order, only that every operand id is in bounds.
//!
//! # Operand layout
//!
//! Each [`NodeKind`] documents what its operands mean. The generator reads
//! them positionally, so builders must follow the documented order.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::types::{ClassName, KernelType};

// ── ID newtypes ─────────────────────────────────────────────────────

/// Index of a node inside its [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a node ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Operators ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    /// Logical (zero-filling) right shift.
    UShr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr | BinaryOp::UShr => ">>",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// How a three-way numeric compare treats unordered (NaN) operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThreeWayMode {
    /// Integral compare; operands are always ordered.
    Integral,
    /// Unordered operands compare as `-1`.
    NanBelow,
    /// Unordered operands compare as `1`.
    NanAbove,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Static,
    /// Constructor, private, or super call bound at analysis time.
    Special,
    Virtual,
    Interface,
    /// Call site bound at run time through a bootstrap method.
    Dynamic,
}

/// Target of an [`NodeKind::Invoke`] node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Invocation {
    pub kind: InvokeKind,
    pub owner: ClassName,
    pub method: Arc<str>,
}

impl Invocation {
    pub fn new(kind: InvokeKind, owner: ClassName, method: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            owner,
            method: method.into(),
        }
    }

    /// Whether operand 0 of the call is the receiver.
    pub fn has_receiver(&self) -> bool {
        matches!(
            self.kind,
            InvokeKind::Special | InvokeKind::Virtual | InvokeKind::Interface
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwitchKind {
    Lookup,
    Table,
}

// ── Nodes ───────────────────────────────────────────────────────────

/// The closed set of node kinds.
///
/// Operand order is given per variant. Variants without a note take no
/// operands.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    // Constants
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(Arc<str>),
    Null,
    /// A class literal used as a value.
    ClassLiteral(ClassName),

    // Method inputs
    /// The n-th declared parameter of the method.
    Param(u32),
    /// The kernel receiver.
    This,

    // Arithmetic and comparison
    /// `[lhs, rhs]`
    Binary(BinaryOp),
    /// `[value]`
    Negate,
    /// `[lhs, rhs]`, boolean result.
    Compare(CompareOp),
    /// `[lhs, rhs]`, `-1`/`0`/`1` result.
    ThreeWay(ThreeWayMode),
    /// `[lhs, rhs]`, reference identity compare.
    ReferenceCompare(CompareOp),
    /// `[value]`, converts to the node's type.
    Convert,

    // Memory
    /// `[receiver]`
    GetField(Arc<str>),
    /// `[receiver, value]`
    PutField(Arc<str>),
    GetStatic { owner: ClassName, field: Arc<str> },
    /// `[value]`
    PutStatic { owner: ClassName, field: Arc<str> },
    /// `[array, index]`
    ArrayLoad,
    /// `[array, index, value]`
    ArrayStore,
    /// `[array]`
    ArrayLength,

    // Type tests
    /// `[value]`
    InstanceOf(ClassName),
    /// `[value]`
    CheckCast(ClassName),

    // Allocation
    New(ClassName),
    /// `[length]`; the node's type is the array type.
    NewArray,
    /// One operand per dimension.
    NewMultiArray,

    /// `[receiver?, args...]`; the receiver is present when
    /// [`Invocation::has_receiver`] holds.
    Invoke(Invocation),

    /// Join value. Operand `i` is the value flowing in from
    /// `predecessors[i]`.
    Phi { predecessors: SmallVec<[NodeId; 2]> },

    // Control markers
    Start,
    Label,
    Merge,
    LoopHeader,
    Goto,
    /// `[condition]`
    If,
    /// `[value]`
    Switch(SwitchKind),
    /// `[value?]`
    Return,
    /// `[exception]`
    Throw,
    /// `[exception]`, start of a handler.
    Catch,
    /// `[object]`
    MonitorEnter,
    /// `[object]`
    MonitorExit,
}

impl NodeKind {
    /// Whether the node must execute exactly once at its scheduled
    /// position (and therefore always gets a temporary when it yields a
    /// value).
    pub fn has_side_effects(&self, ty: &KernelType) -> bool {
        match self {
            NodeKind::Binary(BinaryOp::Div | BinaryOp::Rem) => ty.is_integral(),
            NodeKind::Invoke(_)
            | NodeKind::ArrayLoad
            | NodeKind::ArrayStore
            | NodeKind::PutField(_)
            | NodeKind::PutStatic { .. }
            | NodeKind::New(_)
            | NodeKind::NewArray
            | NodeKind::NewMultiArray
            | NodeKind::MonitorEnter
            | NodeKind::MonitorExit
            | NodeKind::Throw => true,
            _ => false,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            NodeKind::Int(_)
                | NodeKind::Long(_)
                | NodeKind::Float(_)
                | NodeKind::Double(_)
                | NodeKind::String(_)
                | NodeKind::Null
        )
    }

    /// Control markers carry no value and never appear as operands.
    pub fn is_control_marker(&self) -> bool {
        matches!(
            self,
            NodeKind::Start
                | NodeKind::Label
                | NodeKind::Merge
                | NodeKind::LoopHeader
                | NodeKind::Goto
        )
    }
}

/// A typed graph element.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: KernelType,
    pub operands: SmallVec<[NodeId; 3]>,
}

// ── Arena ───────────────────────────────────────────────────────────

/// Arena of nodes for one method.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its id.
    pub fn add(&mut self, kind: NodeKind, ty: KernelType, operands: &[NodeId]) -> NodeId {
        let id = NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(Node {
            kind,
            ty,
            operands: operands.iter().copied().collect(),
        });
        id
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::new(u32::try_from(i).unwrap_or(u32::MAX)), node))
    }

    /// Number of operand slots referring to each node, indexed by
    /// [`NodeId::index`]. A node used twice by the same consumer counts
    /// twice. Out-of-range operands are ignored.
    pub fn use_counts(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.nodes.len()];
        for node in &self.nodes {
            for operand in &node.operands {
                if let Some(count) = counts.get_mut(operand.index()) {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// Phi nodes in arena order.
    pub fn phis(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.iter()
            .filter(|(_, node)| matches!(node.kind, NodeKind::Phi { .. }))
    }

    // ── Builders ────────────────────────────────────────────────────

    pub fn int(&mut self, value: i32) -> NodeId {
        self.add(NodeKind::Int(value), KernelType::Int, &[])
    }

    pub fn long(&mut self, value: i64) -> NodeId {
        self.add(NodeKind::Long(value), KernelType::Long, &[])
    }

    pub fn float(&mut self, value: f32) -> NodeId {
        self.add(NodeKind::Float(value), KernelType::Float, &[])
    }

    pub fn double(&mut self, value: f64) -> NodeId {
        self.add(NodeKind::Double(value), KernelType::Double, &[])
    }

    pub fn param(&mut self, index: u32, ty: KernelType) -> NodeId {
        self.add(NodeKind::Param(index), ty, &[])
    }

    pub fn this(&mut self, class: &ClassName) -> NodeId {
        self.add(NodeKind::This, KernelType::Object(class.clone()), &[])
    }

    /// Binary operation typed after its left operand.
    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let ty = self.type_of(lhs);
        self.add(NodeKind::Binary(op), ty, &[lhs, rhs])
    }

    pub fn compare(&mut self, op: CompareOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add(NodeKind::Compare(op), KernelType::Bool, &[lhs, rhs])
    }

    pub fn convert(&mut self, value: NodeId, to: KernelType) -> NodeId {
        self.add(NodeKind::Convert, to, &[value])
    }

    pub fn get_field(&mut self, receiver: NodeId, field: &str, ty: KernelType) -> NodeId {
        self.add(NodeKind::GetField(field.into()), ty, &[receiver])
    }

    /// Load typed after the array's element type.
    pub fn array_load(&mut self, array: NodeId, index: NodeId) -> NodeId {
        let ty = self
            .get(array)
            .and_then(|node| node.ty.element().cloned())
            .unwrap_or(KernelType::Void);
        self.add(NodeKind::ArrayLoad, ty, &[array, index])
    }

    pub fn array_store(&mut self, array: NodeId, index: NodeId, value: NodeId) -> NodeId {
        self.add(NodeKind::ArrayStore, KernelType::Void, &[array, index, value])
    }

    pub fn invoke(
        &mut self,
        invocation: Invocation,
        ty: KernelType,
        operands: &[NodeId],
    ) -> NodeId {
        self.add(NodeKind::Invoke(invocation), ty, operands)
    }

    /// Phi from `(predecessor, value)` pairs.
    pub fn phi(&mut self, ty: KernelType, incoming: &[(NodeId, NodeId)]) -> NodeId {
        let predecessors = incoming.iter().map(|&(pred, _)| pred).collect();
        let values: SmallVec<[NodeId; 3]> = incoming.iter().map(|&(_, value)| value).collect();
        self.add(NodeKind::Phi { predecessors }, ty, &values)
    }

    pub fn marker(&mut self, kind: NodeKind) -> NodeId {
        self.add(kind, KernelType::Void, &[])
    }

    pub fn if_node(&mut self, condition: NodeId) -> NodeId {
        self.add(NodeKind::If, KernelType::Void, &[condition])
    }

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        match value {
            Some(value) => self.add(NodeKind::Return, KernelType::Void, &[value]),
            None => self.add(NodeKind::Return, KernelType::Void, &[]),
        }
    }

    fn type_of(&self, id: NodeId) -> KernelType {
        self.get(id)
            .map_or(KernelType::Void, |node| node.ty.clone())
    }
}

#[cfg(test)]
mod tests;
