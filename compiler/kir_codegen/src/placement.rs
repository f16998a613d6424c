//! Placement of shared pure temporaries.
//!
//! Pure values are rendered at their first consumer. When that consumer
//! sits inside a block, branch, or case and another consumer follows the
//! construct or sits in a sibling arm, a temporary bound at the first
//! consumer would be out of scope at the second. A planning pass replays
//! the structured body once before emission and records, per construct,
//! the shared nodes to bind in the enclosing scope just before the
//! construct opens. Either way each shared node is rendered once.

use std::convert::Infallible;
use std::ops::Range;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use kir_ir::{Block, Graph, Label, MethodGraph, NodeId, NodeKind, StructuredSink};

use crate::error::CodegenError;
use crate::function::FunctionEmitter;

/// Construct a hoist list belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Anchor {
    Block(Label),
    /// An `if` or `switch` control node.
    Branch(NodeId),
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Hoist {
    /// Shared nodes in order of first use.
    pub(crate) nodes: Vec<NodeId>,
    /// Phis reassigned on an edge that lands inside the construct.
    pub(crate) unstable: FxHashSet<NodeId>,
}

#[derive(Debug, Default)]
pub(crate) struct Placement {
    hoists: FxHashMap<Anchor, Hoist>,
}

impl Placement {
    /// Plan `method`; `shared` tells which nodes are shared pure values.
    pub(crate) fn plan(method: &MethodGraph, shared: impl Fn(NodeId) -> bool) -> Self {
        let mut planner = Planner {
            graph: &method.graph,
            shared,
            leaves: Vec::new(),
            spans: Vec::new(),
            open: Vec::new(),
        };
        if let Err(never) = kir_ir::sequence(&method.body, &mut planner) {
            match never {}
        }
        Self {
            hoists: planner.hoists(),
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, anchor: &Anchor) -> Option<&Hoist> {
        self.hoists.get(anchor)
    }

    pub(crate) fn take(&mut self, anchor: &Anchor) -> Option<Hoist> {
        self.hoists.remove(anchor)
    }
}

impl FunctionEmitter<'_> {
    /// Bind the planned shared values of `anchor` in the current scope.
    ///
    /// A value that depends on an effect or a phi inside the construct
    /// is pinned instead: its temporary is declared at the function top
    /// and stays visible after the construct closes.
    pub(crate) fn hoist(&mut self, anchor: &Anchor) -> Result<(), CodegenError> {
        let Some(hoist) = self.placement.take(anchor) else {
            return Ok(());
        };
        for id in hoist.nodes {
            if self.memo.contains_key(&id) {
                continue;
            }
            if self.available(id, &hoist.unstable)? {
                self.eval(id)?;
            } else {
                self.pinned.insert(id);
            }
        }
        Ok(())
    }

    /// Whether `id` renders here without running an effect early or
    /// reading a phi the construct reassigns.
    fn available(&self, id: NodeId, unstable: &FxHashSet<NodeId>) -> Result<bool, CodegenError> {
        let mut pending = vec![id];
        let mut seen = FxHashSet::default();
        while let Some(next) = pending.pop() {
            if !seen.insert(next) {
                continue;
            }
            if unstable.contains(&next) {
                return Ok(false);
            }
            if self.memo.contains_key(&next) {
                continue;
            }
            let node = self.node(next)?;
            if node.kind.has_side_effects(&node.ty) {
                return Ok(false);
            }
            pending.extend(self.evaluated_operands(node));
        }
        Ok(true)
    }
}

// ── Planning pass ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EdgeKind {
    Break,
    Continue,
    Fallthrough,
}

/// A jump or fallthrough; `target` is the span it lands in or leaves.
#[derive(Debug)]
struct Edge {
    from: NodeId,
    kind: EdgeKind,
    target: Option<usize>,
}

/// One evaluation point: a statement, or the header of an `if`/`switch`.
#[derive(Debug)]
struct Leaf {
    uses: SmallVec<[NodeId; 4]>,
    edge: Option<Edge>,
}

/// A construct, as ranges of leaf positions.
#[derive(Debug)]
struct Span {
    anchor: Anchor,
    parent: Option<usize>,
    label: Option<Label>,
    is_branch: bool,
    start: usize,
    end: usize,
    arms: Vec<Range<usize>>,
}

struct Planner<'a, F> {
    graph: &'a Graph,
    shared: F,
    leaves: Vec<Leaf>,
    spans: Vec<Span>,
    open: Vec<usize>,
}

impl<F: Fn(NodeId) -> bool> Planner<'_, F> {
    /// Shared nodes reached from `roots`, not looking through phis.
    fn uses(&self, roots: &[NodeId]) -> SmallVec<[NodeId; 4]> {
        let mut uses = SmallVec::new();
        let mut pending: Vec<NodeId> = roots.to_vec();
        let mut seen = FxHashSet::default();
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            if (self.shared)(id) {
                uses.push(id);
            }
            let Some(node) = self.graph.get(id) else {
                continue;
            };
            if !matches!(node.kind, NodeKind::Phi { .. }) {
                pending.extend(node.operands.iter().copied());
            }
        }
        uses
    }

    fn operands(&self, id: NodeId) -> SmallVec<[NodeId; 3]> {
        self.graph
            .get(id)
            .map(|node| node.operands.clone())
            .unwrap_or_default()
    }

    /// Values flowing into phis along the edge leaving `from`.
    fn phi_inputs(&self, from: NodeId) -> Vec<NodeId> {
        let mut inputs = Vec::new();
        for (_, node) in self.graph.phis() {
            let NodeKind::Phi { predecessors } = &node.kind else {
                continue;
            };
            for (slot, predecessor) in predecessors.iter().enumerate() {
                if *predecessor == from {
                    inputs.extend(node.operands.get(slot).copied());
                }
            }
        }
        inputs
    }

    fn leaf(&mut self, roots: &[NodeId], edge: Option<Edge>) {
        let uses = self.uses(roots);
        self.leaves.push(Leaf { uses, edge });
    }

    fn open_span(&mut self, anchor: Anchor, label: Option<Label>, with_arm: bool) {
        let start = self.leaves.len();
        let is_branch = matches!(anchor, Anchor::Branch(_));
        self.spans.push(Span {
            anchor,
            parent: self.open.last().copied(),
            label,
            is_branch,
            start,
            end: start,
            arms: if with_arm { vec![start..start] } else { Vec::new() },
        });
        self.open.push(self.spans.len() - 1);
    }

    fn start_arm(&mut self) {
        let start = self.leaves.len();
        if let Some(span) = self.open.last().and_then(|&i| self.spans.get_mut(i)) {
            span.arms.push(start..start);
        }
    }

    fn close_arm(&mut self) {
        let end = self.leaves.len();
        if let Some(arm) = self
            .open
            .last()
            .and_then(|&i| self.spans.get_mut(i))
            .and_then(|span| span.arms.last_mut())
        {
            arm.end = end;
        }
    }

    fn close_span(&mut self) {
        self.close_arm();
        let end = self.leaves.len();
        if let Some(span) = self.open.pop().and_then(|i| self.spans.get_mut(i)) {
            span.end = end;
        }
    }

    fn target_block(&self, label: &Label) -> Option<usize> {
        self.open
            .iter()
            .rev()
            .copied()
            .find(|&i| self.spans[i].label.as_ref() == Some(label))
    }

    fn edge(&mut self, from: NodeId, kind: EdgeKind, target: Option<usize>) {
        let inputs = self.phi_inputs(from);
        self.leaf(&inputs, Some(Edge { from, kind, target }));
    }

    /// `inner` lies strictly inside `outer`.
    fn is_within(&self, inner: usize, outer: usize) -> bool {
        let mut next = self.spans[inner].parent;
        while let Some(span) = next {
            if span == outer {
                return true;
            }
            next = self.spans[span].parent;
        }
        false
    }

    /// The edge lands somewhere inside span `c`, so phis it assigns can
    /// change while `c` runs.
    fn lands_inside(&self, edge: &Edge, c: usize) -> bool {
        match (edge.kind, edge.target) {
            (_, None) => true,
            (EdgeKind::Continue, Some(t)) => t == c || self.is_within(t, c),
            (EdgeKind::Break | EdgeKind::Fallthrough, Some(t)) => self.is_within(t, c),
        }
    }

    fn hoists(self) -> FxHashMap<Anchor, Hoist> {
        let mut hoists = FxHashMap::default();
        for (index, span) in self.spans.iter().enumerate() {
            let mut order = Vec::new();
            let mut arm_counts: FxHashMap<NodeId, usize> = FxHashMap::default();
            for arm in &span.arms {
                let mut in_arm = FxHashSet::default();
                for leaf in &self.leaves[arm.clone()] {
                    for &id in &leaf.uses {
                        if in_arm.insert(id) {
                            let count = arm_counts.entry(id).or_insert(0);
                            if *count == 0 {
                                order.push(id);
                            }
                            *count += 1;
                        }
                    }
                }
            }
            if order.is_empty() {
                continue;
            }

            let after: FxHashSet<NodeId> = self.leaves[span.end..]
                .iter()
                .flat_map(|leaf| leaf.uses.iter().copied())
                .collect();
            let nodes: Vec<NodeId> = order
                .into_iter()
                .filter(|id| after.contains(id) || arm_counts.get(id).is_some_and(|&n| n > 1))
                .collect();
            if nodes.is_empty() {
                continue;
            }

            let inner_edges: FxHashSet<NodeId> = self.leaves[span.start..span.end]
                .iter()
                .filter_map(|leaf| leaf.edge.as_ref())
                .filter(|edge| self.lands_inside(edge, index))
                .map(|edge| edge.from)
                .collect();
            let unstable = self
                .graph
                .phis()
                .filter(|(_, node)| match &node.kind {
                    NodeKind::Phi { predecessors } => {
                        predecessors.iter().any(|p| inner_edges.contains(p))
                    }
                    _ => false,
                })
                .map(|(id, _)| id)
                .collect();
            hoists.insert(span.anchor.clone(), Hoist { nodes, unstable });
        }
        hoists
    }
}

impl<F: Fn(NodeId) -> bool> StructuredSink for Planner<'_, F> {
    type Error = Infallible;

    fn start_block(&mut self, block: &Block) -> Result<(), Infallible> {
        self.open_span(
            Anchor::Block(block.label.clone()),
            Some(block.label.clone()),
            true,
        );
        Ok(())
    }

    fn finish_block(&mut self, _block: &Block) -> Result<(), Infallible> {
        self.close_span();
        Ok(())
    }

    fn write_effect(&mut self, node: NodeId) -> Result<(), Infallible> {
        self.leaf(&[node], None);
        Ok(())
    }

    fn write_return(&mut self, node: NodeId) -> Result<(), Infallible> {
        let operands = self.operands(node);
        self.leaf(&operands, None);
        Ok(())
    }

    fn start_if(&mut self, node: NodeId) -> Result<(), Infallible> {
        let operands = self.operands(node);
        self.leaf(&operands, None);
        self.open_span(Anchor::Branch(node), None, true);
        Ok(())
    }

    fn start_else(&mut self, _node: NodeId) -> Result<(), Infallible> {
        self.close_arm();
        self.start_arm();
        Ok(())
    }

    fn finish_if(&mut self, _node: NodeId) -> Result<(), Infallible> {
        self.close_span();
        Ok(())
    }

    fn start_switch(&mut self, node: NodeId) -> Result<(), Infallible> {
        let operands = self.operands(node);
        self.leaf(&operands, None);
        self.open_span(Anchor::Branch(node), None, false);
        Ok(())
    }

    fn start_case(&mut self, _node: NodeId, _key: Option<i32>) -> Result<(), Infallible> {
        self.start_arm();
        Ok(())
    }

    fn finish_case(&mut self, _node: NodeId) -> Result<(), Infallible> {
        self.close_arm();
        Ok(())
    }

    fn finish_switch(&mut self, _node: NodeId) -> Result<(), Infallible> {
        let end = self.leaves.len();
        if let Some(span) = self.open.pop().and_then(|i| self.spans.get_mut(i)) {
            span.end = end;
        }
        Ok(())
    }

    fn write_break_to(&mut self, from: NodeId, label: &Label) -> Result<(), Infallible> {
        let target = self.target_block(label);
        self.edge(from, EdgeKind::Break, target);
        Ok(())
    }

    fn write_continue_to(&mut self, from: NodeId, label: &Label) -> Result<(), Infallible> {
        let target = self.target_block(label);
        self.edge(from, EdgeKind::Continue, target);
        Ok(())
    }

    fn write_edge(&mut self, from: NodeId) -> Result<(), Infallible> {
        let target = self
            .open
            .iter()
            .rev()
            .copied()
            .find(|&i| self.spans[i].is_branch);
        self.edge(from, EdgeKind::Fallthrough, target);
        Ok(())
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
