//! Structured bodies produced by the upstream block sequencer.
//!
//! The sequencer has already turned the method's control-flow graph into
//! nested blocks that only use forward `break` and backward `continue`
//! edges. A body is a tree of [`Stmt`]s; [`sequence`] replays it into a
//! [`StructuredSink`] in source order.

use std::fmt;
use std::sync::Arc;

use crate::graph::NodeId;

/// Block label, unique within one method.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(Arc<str>);

impl Label {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({})", self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Straight-line region; `break` leaves it.
    Sequence,
    /// Loop body; `continue` restarts it, `break` leaves it.
    Loop,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub label: Label,
    pub kind: BlockKind,
}

impl Block {
    pub fn sequence(label: &str) -> Self {
        Self {
            label: Label::new(label),
            kind: BlockKind::Sequence,
        }
    }

    pub fn looping(label: &str) -> Self {
        Self {
            label: Label::new(label),
            kind: BlockKind::Loop,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchArm {
    pub key: i32,
    pub body: Vec<Stmt>,
}

/// One statement of a structured body.
///
/// `from` fields name the predecessor control node of the edge being
/// taken; phi nodes are keyed by it.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// A side-effecting node at its scheduled position.
    Effect(NodeId),
    Block {
        block: Block,
        body: Vec<Stmt>,
    },
    If {
        node: NodeId,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    Switch {
        node: NodeId,
        arms: Vec<SwitchArm>,
        default: Vec<Stmt>,
    },
    Break {
        from: NodeId,
        label: Label,
    },
    Continue {
        from: NodeId,
        label: Label,
    },
    /// Fallthrough into a merge point that needs phi assignments but no
    /// jump.
    Edge {
        from: NodeId,
    },
    Return(NodeId),
}

/// Callbacks driven by [`sequence`].
///
/// `start_*`/`finish_*` calls are always balanced and properly nested.
pub trait StructuredSink {
    type Error;

    fn start_block(&mut self, block: &Block) -> Result<(), Self::Error>;
    fn finish_block(&mut self, block: &Block) -> Result<(), Self::Error>;

    fn write_effect(&mut self, node: NodeId) -> Result<(), Self::Error>;
    fn write_return(&mut self, node: NodeId) -> Result<(), Self::Error>;

    fn start_if(&mut self, node: NodeId) -> Result<(), Self::Error>;
    fn start_else(&mut self, node: NodeId) -> Result<(), Self::Error>;
    fn finish_if(&mut self, node: NodeId) -> Result<(), Self::Error>;

    fn start_switch(&mut self, node: NodeId) -> Result<(), Self::Error>;
    /// `key` is `None` for the default arm.
    fn start_case(&mut self, node: NodeId, key: Option<i32>) -> Result<(), Self::Error>;
    fn finish_case(&mut self, node: NodeId) -> Result<(), Self::Error>;
    fn finish_switch(&mut self, node: NodeId) -> Result<(), Self::Error>;

    fn write_break_to(&mut self, from: NodeId, label: &Label) -> Result<(), Self::Error>;
    fn write_continue_to(&mut self, from: NodeId, label: &Label) -> Result<(), Self::Error>;
    fn write_edge(&mut self, from: NodeId) -> Result<(), Self::Error>;
}

enum Step<'a> {
    Visit(&'a Stmt),
    FinishBlock(&'a Block),
    StartElse(NodeId),
    FinishIf(NodeId),
    StartCase(NodeId, Option<i32>),
    FinishCase(NodeId),
    FinishSwitch(NodeId),
}

/// Replay `body` into `sink` in source order.
///
/// Iterative, so deeply nested bodies do not grow the call stack.
pub fn sequence<S: StructuredSink>(body: &[Stmt], sink: &mut S) -> Result<(), S::Error> {
    let mut steps: Vec<Step<'_>> = body.iter().rev().map(Step::Visit).collect();

    while let Some(step) = steps.pop() {
        match step {
            Step::Visit(stmt) => match stmt {
                Stmt::Effect(node) => sink.write_effect(*node)?,
                Stmt::Return(node) => sink.write_return(*node)?,
                Stmt::Break { from, label } => sink.write_break_to(*from, label)?,
                Stmt::Continue { from, label } => sink.write_continue_to(*from, label)?,
                Stmt::Edge { from } => sink.write_edge(*from)?,
                Stmt::Block { block, body } => {
                    sink.start_block(block)?;
                    steps.push(Step::FinishBlock(block));
                    steps.extend(body.iter().rev().map(Step::Visit));
                }
                Stmt::If {
                    node,
                    then_body,
                    else_body,
                } => {
                    sink.start_if(*node)?;
                    steps.push(Step::FinishIf(*node));
                    steps.extend(else_body.iter().rev().map(Step::Visit));
                    steps.push(Step::StartElse(*node));
                    steps.extend(then_body.iter().rev().map(Step::Visit));
                }
                Stmt::Switch {
                    node,
                    arms,
                    default,
                } => {
                    sink.start_switch(*node)?;
                    steps.push(Step::FinishSwitch(*node));
                    steps.push(Step::FinishCase(*node));
                    steps.extend(default.iter().rev().map(Step::Visit));
                    steps.push(Step::StartCase(*node, None));
                    for arm in arms.iter().rev() {
                        steps.push(Step::FinishCase(*node));
                        steps.extend(arm.body.iter().rev().map(Step::Visit));
                        steps.push(Step::StartCase(*node, Some(arm.key)));
                    }
                }
            },
            Step::FinishBlock(block) => sink.finish_block(block)?,
            Step::StartElse(node) => sink.start_else(node)?,
            Step::FinishIf(node) => sink.finish_if(node)?,
            Step::StartCase(node, key) => sink.start_case(node, key)?,
            Step::FinishCase(node) => sink.finish_case(node)?,
            Step::FinishSwitch(node) => sink.finish_switch(node)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
