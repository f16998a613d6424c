//! Statement and control-flow emission.
//!
//! `FunctionEmitter` is the [`StructuredSink`] driven by the block
//! sequencer:
//!
//! - sequence block `L` → `L: { ... }`
//! - loop block `L` → `L: while (true) { ... }`
//! - break to `L` → `goto L_exit;`, with `L_exit: ;` after the block only
//!   when something jumped there
//! - continue to `L` → `goto L;`
//!
//! Phi temporaries are assigned on every edge that leaves a predecessor,
//! just before the jump.

use kir_ir::{Block, BlockKind, Graph, Label, NodeId, NodeKind, StructuredSink};

use crate::error::CodegenError;
use crate::function::{Code, FunctionEmitter, Open};
use crate::placement::Anchor;
use crate::types::sanitize_identifier;

impl<'a> FunctionEmitter<'a> {
    /// The single operand of a control node of the expected kind.
    fn control_operand(
        &self,
        id: NodeId,
        expected: &str,
        is_expected: fn(&NodeKind) -> bool,
    ) -> Result<NodeId, CodegenError> {
        let node = self.node(id)?;
        if !is_expected(&node.kind) {
            return Err(CodegenError::invariant(format!(
                "node {} is not a {expected} node",
                id.raw()
            )));
        }
        match node.operands.as_slice() {
            [operand] => Ok(*operand),
            operands => Err(CodegenError::invariant(format!(
                "expected exactly 1 value for {expected} node {}, found {}",
                id.raw(),
                operands.len()
            ))),
        }
    }

    fn open_block_position(&self, label: &Label) -> Option<usize> {
        self.open
            .iter()
            .rposition(|open| matches!(open, Open::Block { block, .. } if block.label == *label))
    }

    /// Assign every phi fed by the edge leaving `from`.
    ///
    /// With more than one assignment the incoming values are staged
    /// first, since one phi's new value may read another phi's old one.
    fn assign_phis(&mut self, from: NodeId) -> Result<(), CodegenError> {
        let graph: &'a Graph = &self.method.graph;
        let mut moves = Vec::new();
        for (phi, node) in graph.phis() {
            let NodeKind::Phi { predecessors } = &node.kind else {
                continue;
            };
            for (slot, predecessor) in predecessors.iter().enumerate() {
                if *predecessor != from {
                    continue;
                }
                let value = node.operands.get(slot).copied().ok_or_else(|| {
                    CodegenError::invariant(format!(
                        "phi {} has no value for predecessor {}",
                        phi.raw(),
                        from.raw()
                    ))
                })?;
                if value != phi {
                    moves.push((phi, value));
                }
            }
        }

        let staged = moves.len() > 1;
        let mut assignments = Vec::with_capacity(moves.len());
        for (phi, value) in moves {
            let mut code = self.eval(value)?;
            if staged && !self.node(value)?.kind.is_constant() {
                let name = self.writer.fresh_temp("var");
                self.writer.writeln(&format!(
                    "{} = {};",
                    self.ctx.types.declare(&code.ty, &name),
                    code.text
                ));
                code = Code { ty: code.ty, text: name };
            }
            assignments.push((phi, code));
        }
        for (phi, code) in assignments {
            let target = self
                .memo
                .get(&phi)
                .map(|temp| temp.text.clone())
                .ok_or_else(|| {
                    CodegenError::invariant(format!("missing PHI temporary for node {}", phi.raw()))
                })?;
            self.writer.writeln(&format!("{target} = {};", code.text));
        }
        Ok(())
    }
}

impl StructuredSink for FunctionEmitter<'_> {
    type Error = CodegenError;

    fn start_block(&mut self, block: &Block) -> Result<(), CodegenError> {
        if !self.labels.insert(block.label.clone()) {
            return Err(CodegenError::invariant(format!(
                "duplicate block label {} in `{}`",
                block.label, self.method.name
            )));
        }
        self.hoist(&Anchor::Block(block.label.clone()))?;
        let label = sanitize_identifier(block.label.as_str());
        match block.kind {
            BlockKind::Sequence => self.writer.writeln(&format!("{label}: {{")),
            BlockKind::Loop => self.writer.writeln(&format!("{label}: while (true) {{")),
        }
        self.open_scope();
        self.open.push(Open::Block {
            block: block.clone(),
            exit_used: false,
        });
        Ok(())
    }

    fn finish_block(&mut self, block: &Block) -> Result<(), CodegenError> {
        match self.open.pop() {
            Some(Open::Block {
                block: open,
                exit_used,
            }) if open.label == block.label => {
                self.close_scope();
                self.writer.writeln("}");
                if exit_used {
                    let label = sanitize_identifier(block.label.as_str());
                    self.writer.writeln(&format!("{label}_exit: ;"));
                }
                Ok(())
            }
            other => Err(CodegenError::invariant(format!(
                "block {} closed while {} is open",
                block.label,
                Open::describe(other.as_ref())
            ))),
        }
    }

    fn write_effect(&mut self, node: NodeId) -> Result<(), CodegenError> {
        if self.memo.contains_key(&node) {
            return Ok(());
        }
        let code = self.eval(node)?;
        let info = self.node(node)?;
        if info.ty.is_void() {
            self.writer.writeln(&format!("{};", code.text));
        } else if !self.memo.contains_key(&node) {
            self.materialize(node, info, code, false);
        }
        Ok(())
    }

    fn write_return(&mut self, node: NodeId) -> Result<(), CodegenError> {
        let info = self.node(node)?;
        if info.kind != NodeKind::Return {
            return Err(CodegenError::invariant(format!(
                "node {} is not a return node",
                node.raw()
            )));
        }
        match info.operands.as_slice() {
            [] => self.writer.writeln("return;"),
            [value] => {
                let code = self.eval(*value)?;
                self.writer.writeln(&format!("return {};", code.text));
            }
            operands => {
                return Err(CodegenError::invariant(format!(
                    "expected at most 1 value for return node {}, found {}",
                    node.raw(),
                    operands.len()
                )))
            }
        }
        Ok(())
    }

    fn start_if(&mut self, node: NodeId) -> Result<(), CodegenError> {
        let condition = self.control_operand(node, "if", |kind| *kind == NodeKind::If)?;
        let code = self.eval(condition)?;
        self.hoist(&Anchor::Branch(node))?;
        self.writer.writeln(&format!("if ({}) {{", strip_outer_parens(&code.text)));
        self.open_scope();
        self.open.push(Open::If {
            node,
            in_else: false,
        });
        Ok(())
    }

    fn start_else(&mut self, node: NodeId) -> Result<(), CodegenError> {
        match self.open.last_mut() {
            Some(Open::If { node: open, in_else }) if *open == node && !*in_else => {
                *in_else = true;
            }
            other => {
                return Err(CodegenError::invariant(format!(
                    "else of if {} while {} is open",
                    node.raw(),
                    Open::describe(other.map(|open| &*open))
                )))
            }
        }
        self.close_scope();
        self.writer.writeln("} else {");
        self.open_scope();
        Ok(())
    }

    fn finish_if(&mut self, node: NodeId) -> Result<(), CodegenError> {
        match self.open.pop() {
            Some(Open::If { node: open, .. }) if open == node => {
                self.close_scope();
                self.writer.writeln("}");
                Ok(())
            }
            other => Err(CodegenError::invariant(format!(
                "if {} closed while {} is open",
                node.raw(),
                Open::describe(other.as_ref())
            ))),
        }
    }

    fn start_switch(&mut self, node: NodeId) -> Result<(), CodegenError> {
        let value = self.control_operand(node, "switch", |kind| {
            matches!(kind, NodeKind::Switch(_))
        })?;
        let code = self.eval(value)?;
        self.hoist(&Anchor::Branch(node))?;
        self.writer.writeln(&format!("switch ({}) {{", strip_outer_parens(&code.text)));
        self.writer.indent();
        self.open.push(Open::Switch {
            node,
            has_default: false,
        });
        Ok(())
    }

    fn start_case(&mut self, node: NodeId, key: Option<i32>) -> Result<(), CodegenError> {
        match self.open.last_mut() {
            Some(Open::Switch {
                node: open,
                has_default,
            }) if *open == node => {
                if key.is_none() {
                    *has_default = true;
                }
            }
            other => {
                return Err(CodegenError::invariant(format!(
                    "case of switch {} while {} is open",
                    node.raw(),
                    Open::describe(other.map(|open| &*open))
                )))
            }
        }
        match key {
            Some(key) => self
                .writer
                .writeln(&format!("case {}: {{", crate::expr::int_literal(key))),
            None => self.writer.writeln("default: {"),
        }
        self.open_scope();
        self.open.push(Open::Case { node });
        Ok(())
    }

    fn finish_case(&mut self, node: NodeId) -> Result<(), CodegenError> {
        match self.open.pop() {
            Some(Open::Case { node: open }) if open == node => {
                self.writer.writeln("break;");
                self.close_scope();
                self.writer.writeln("}");
                Ok(())
            }
            other => Err(CodegenError::invariant(format!(
                "case of switch {} closed while {} is open",
                node.raw(),
                Open::describe(other.as_ref())
            ))),
        }
    }

    fn finish_switch(&mut self, node: NodeId) -> Result<(), CodegenError> {
        match self.open.pop() {
            Some(Open::Switch {
                node: open,
                has_default,
            }) if open == node => {
                if !has_default {
                    self.writer.writeln("default: {");
                    self.writer.indent();
                    self.writer.writeln("break;");
                    self.writer.dedent();
                    self.writer.writeln("}");
                }
                self.writer.dedent();
                self.writer.writeln("}");
                Ok(())
            }
            other => Err(CodegenError::invariant(format!(
                "switch {} closed while {} is open",
                node.raw(),
                Open::describe(other.as_ref())
            ))),
        }
    }

    fn write_break_to(&mut self, from: NodeId, label: &Label) -> Result<(), CodegenError> {
        let position = self.open_block_position(label).ok_or_else(|| {
            CodegenError::invariant(format!("break to {label}, which is not an open block"))
        })?;
        if let Some(Open::Block { exit_used, .. }) = self.open.get_mut(position) {
            *exit_used = true;
        }
        self.assign_phis(from)?;
        self.writer.writeln(&format!(
            "goto {}_exit;",
            sanitize_identifier(label.as_str())
        ));
        Ok(())
    }

    fn write_continue_to(&mut self, from: NodeId, label: &Label) -> Result<(), CodegenError> {
        let position = self.open_block_position(label).ok_or_else(|| {
            CodegenError::invariant(format!("continue to {label}, which is not an open block"))
        })?;
        if let Some(Open::Block { block, .. }) = self.open.get(position) {
            if block.kind != BlockKind::Loop {
                return Err(CodegenError::invariant(format!(
                    "continue to {label}, which is not a loop"
                )));
            }
        }
        self.assign_phis(from)?;
        self.writer.writeln(&format!("goto {};", sanitize_identifier(label.as_str())));
        Ok(())
    }

    fn write_edge(&mut self, from: NodeId) -> Result<(), CodegenError> {
        self.assign_phis(from)
    }
}

/// `(a < b)` → `a < b`, leaving `(a) + (b)` untouched.
fn strip_outer_parens(text: &str) -> &str {
    let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) else {
        return text;
    };
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return text;
                }
            }
            _ => {}
        }
    }
    if depth == 0 {
        inner
    } else {
        text
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
mod tests;
