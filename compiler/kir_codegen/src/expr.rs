//! Expression evaluation.
//!
//! Evaluation uses two explicit stacks instead of recursion: `pending`
//! holds nodes still to visit, `results` holds rendered operands. A node
//! is entered, its operands are pushed in reverse so they are evaluated
//! in argument order, and on exit its operands are popped off `results`
//! in one slice, restoring left-to-right order.
//!
//! Side-effecting nodes and nodes with more than one consumer are
//! materialized into a temporary the first time they are rendered and
//! referenced by name afterwards.

use smallvec::SmallVec;

use kir_ir::{BinaryOp, Invocation, InvokeKind, KernelType, Node, NodeId, NodeKind, ThreeWayMode};

use crate::error::CodegenError;
use crate::function::{Code, FunctionEmitter};
use crate::types::sanitize_identifier;

enum Frame {
    Enter(NodeId),
    Exit(NodeId),
}

impl<'a> FunctionEmitter<'a> {
    /// Render `root`, emitting any temporaries it needs first.
    pub(crate) fn eval(&mut self, root: NodeId) -> Result<Code, CodegenError> {
        let mut pending = vec![Frame::Enter(root)];
        let mut results: Vec<Code> = Vec::new();

        while let Some(frame) = pending.pop() {
            match frame {
                Frame::Enter(id) => {
                    if let Some(code) = self.memo.get(&id) {
                        results.push(code.clone());
                        continue;
                    }
                    let node = self.node(id)?;
                    let operands = self.evaluated_operands(node);
                    if operands.is_empty() {
                        let code = self.render(id, node, Vec::new())?;
                        results.push(self.finish_value(id, node, code)?);
                    } else {
                        pending.push(Frame::Exit(id));
                        pending.extend(operands.iter().rev().map(|&op| Frame::Enter(op)));
                    }
                }
                Frame::Exit(id) => {
                    let node = self.node(id)?;
                    let arity = self.evaluated_operands(node).len();
                    if results.len() < arity {
                        return Err(CodegenError::invariant(format!(
                            "expected {arity} values on the stack for node {}, found {}",
                            id.raw(),
                            results.len()
                        )));
                    }
                    let args = results.split_off(results.len() - arity);
                    let code = self.render(id, node, args)?;
                    results.push(self.finish_value(id, node, code)?);
                }
            }
        }

        match (results.pop(), results.len()) {
            (Some(code), 0) => Ok(code),
            (_, rest) => Err(CodegenError::invariant(format!(
                "expected exactly 1 value after evaluating node {}, found {}",
                root.raw(),
                rest + 1
            ))),
        }
    }

    /// Operands rendered before `node`. The kernel receiver is never
    /// rendered; field accesses and calls on it resolve by name.
    pub(crate) fn evaluated_operands(&self, node: &Node) -> SmallVec<[NodeId; 3]> {
        let skip_receiver = match &node.kind {
            NodeKind::Phi { .. } => return SmallVec::new(),
            NodeKind::GetField(_) | NodeKind::PutField(_) => self.is_receiver(node),
            NodeKind::Invoke(call) => call.has_receiver() && self.is_receiver(node),
            _ => false,
        };
        if skip_receiver {
            node.operands.iter().skip(1).copied().collect()
        } else {
            node.operands.clone()
        }
    }

    /// Whether operand 0 of `node` is the kernel receiver.
    fn is_receiver(&self, node: &Node) -> bool {
        node.operands
            .first()
            .and_then(|&id| self.node(id).ok())
            .is_some_and(|operand| operand.kind == NodeKind::This)
    }

    pub(crate) fn is_trivial(&self, node: &Node) -> bool {
        match &node.kind {
            NodeKind::Param(_) | NodeKind::This => true,
            NodeKind::GetField(_) => self.is_receiver(node),
            kind => kind.is_constant(),
        }
    }

    /// Materialize `code` when the node is shared or side-effecting.
    fn finish_value(&mut self, id: NodeId, node: &Node, code: Code) -> Result<Code, CodegenError> {
        if let Some(existing) = self.memo.get(&id) {
            return Ok(existing.clone());
        }
        if node.ty.is_void() {
            return Ok(code);
        }
        let effect = node.kind.has_side_effects(&node.ty);
        let uses = self.use_counts.get(id.index()).copied().unwrap_or(0);
        if effect || (uses > 1 && !self.is_trivial(node)) {
            let keep = effect || self.pinned.contains(&id);
            Ok(self.materialize(id, node, code, keep))
        } else {
            Ok(code)
        }
    }

    /// Emit `code` into a fresh temporary and remember it.
    ///
    /// Kept temporaries outlive the scope they were created in, so inside
    /// a nested scope their declaration is hoisted to the function top.
    pub(crate) fn materialize(&mut self, id: NodeId, node: &Node, code: Code, keep: bool) -> Code {
        let name = self.writer.fresh_temp("var");
        let declaration = self.ctx.types.declare(&node.ty, &name);
        if keep && self.is_nested() {
            self.declarations.push(format!("{declaration};"));
            self.writer.writeln(&format!("{name} = {};", code.text));
        } else {
            self.writer.writeln(&format!("{declaration} = {};", code.text));
            if !keep {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.push(id);
                }
            }
        }
        let named = Code {
            ty: node.ty.clone(),
            text: name,
        };
        self.memo.insert(id, named.clone());
        named
    }

    fn render(&mut self, id: NodeId, node: &'a Node, args: Vec<Code>) -> Result<Code, CodegenError> {
        let ty = node.ty.clone();
        let text = match &node.kind {
            NodeKind::Int(value) => int_literal(*value),
            NodeKind::Long(value) => long_literal(*value),
            NodeKind::Float(value) => float_literal(*value),
            NodeKind::Double(value) => double_literal(*value),
            NodeKind::String(value) => string_literal(value),
            NodeKind::Null => return Err(CodegenError::unsupported("null reference")),
            NodeKind::ClassLiteral(class) => {
                return Err(CodegenError::unsupported(format!(
                    "class literal {class} used as a value"
                )))
            }

            NodeKind::Param(index) => {
                let param = usize::try_from(*index)
                    .ok()
                    .and_then(|i| self.method.params.get(i))
                    .ok_or_else(|| {
                        CodegenError::invariant(format!(
                            "parameter {index} out of range for `{}`",
                            self.method.name
                        ))
                    })?;
                sanitize_identifier(&param.name)
            }
            NodeKind::This => {
                return Err(CodegenError::unsupported("kernel receiver used as a value"))
            }

            NodeKind::Binary(op) => {
                let [lhs, rhs] = exactly(id, args)?;
                binary_text(*op, &ty, &lhs.text, &rhs.text)
            }
            NodeKind::Negate => {
                let [value] = exactly(id, args)?;
                format!("(-{})", value.text)
            }
            NodeKind::Compare(op) => {
                let [lhs, rhs] = exactly(id, args)?;
                format!("({} {} {})", lhs.text, op.symbol(), rhs.text)
            }
            NodeKind::ThreeWay(mode) => {
                let [lhs, rhs] = exactly(id, args)?;
                three_way_text(*mode, &lhs.text, &rhs.text)
            }
            NodeKind::ReferenceCompare(_) => {
                return Err(CodegenError::unsupported("reference identity comparison"))
            }
            NodeKind::Convert => {
                let [value] = exactly(id, args)?;
                format!("(({}){})", self.ctx.types.name(&ty), value.text)
            }

            NodeKind::GetField(field) => {
                if self.is_receiver(node) {
                    let [] = exactly(id, args)?;
                    self.kernel_field(field)?
                } else {
                    let [receiver] = exactly(id, args)?;
                    format!("{}.{}", receiver.text, sanitize_identifier(field))
                }
            }
            NodeKind::PutField(field) => {
                if self.is_receiver(node) {
                    let [value] = exactly(id, args)?;
                    format!("{} = {}", self.kernel_field(field)?, value.text)
                } else {
                    let [receiver, value] = exactly(id, args)?;
                    format!(
                        "{}.{} = {}",
                        receiver.text,
                        sanitize_identifier(field),
                        value.text
                    )
                }
            }
            NodeKind::GetStatic { owner, field } | NodeKind::PutStatic { owner, field } => {
                return Err(CodegenError::unsupported(format!(
                    "static field access {owner}.{field}"
                )))
            }
            NodeKind::ArrayLoad => {
                let [array, index] = exactly(id, args)?;
                format!("{}[{}]", array.text, index.text)
            }
            NodeKind::ArrayStore => {
                let [array, index, value] = exactly(id, args)?;
                format!("{}[{}] = {}", array.text, index.text, value.text)
            }
            NodeKind::ArrayLength => {
                return Err(CodegenError::unsupported("array length of a kernel buffer"))
            }
            NodeKind::InstanceOf(class) | NodeKind::CheckCast(class) => {
                return Err(CodegenError::unsupported(format!(
                    "runtime type test against {class}"
                )))
            }

            NodeKind::New(class) => {
                return Err(CodegenError::unsupported(format!(
                    "object allocation of {class}"
                )))
            }
            NodeKind::NewArray => return self.render_private_array(id, node),
            NodeKind::NewMultiArray => {
                return Err(CodegenError::NotYetImplemented {
                    construct: "multi-dimensional array allocation".to_owned(),
                })
            }

            NodeKind::Invoke(call) => self.render_invoke(id, node, call, args)?,

            NodeKind::Phi { .. } => {
                return Err(CodegenError::invariant(format!(
                    "missing PHI temporary for node {}",
                    id.raw()
                )))
            }
            NodeKind::MonitorEnter | NodeKind::MonitorExit => {
                return Err(CodegenError::unsupported("monitor operation"))
            }
            NodeKind::Throw | NodeKind::Catch => {
                return Err(CodegenError::unsupported("exception control flow"))
            }
            NodeKind::Start
            | NodeKind::Label
            | NodeKind::Merge
            | NodeKind::LoopHeader
            | NodeKind::Goto
            | NodeKind::If
            | NodeKind::Switch(_)
            | NodeKind::Return => {
                return Err(CodegenError::invariant(format!(
                    "control node {} used as a value",
                    id.raw()
                )))
            }
        };
        Ok(Code { ty, text })
    }

    fn kernel_field(&self, field: &str) -> Result<String, CodegenError> {
        self.ctx
            .argument(field)
            .map(|arg| sanitize_identifier(&arg.name))
            .ok_or_else(|| {
                CodegenError::configuration(format!(
                    "field `{field}` is not declared on kernel class {}",
                    self.ctx.class.name
                ))
            })
    }

    fn render_invoke(
        &self,
        id: NodeId,
        node: &Node,
        call: &Invocation,
        args: Vec<Code>,
    ) -> Result<String, CodegenError> {
        if call.kind == InvokeKind::Dynamic {
            return Err(CodegenError::unsupported(format!(
                "dynamically bound call site {}.{}",
                call.owner, call.method
            )));
        }
        let on_receiver = call.has_receiver() && self.is_receiver(node);

        if call.owner == self.ctx.class.name {
            if call.has_receiver() && !on_receiver {
                return Err(CodegenError::unsupported(format!(
                    "call to {} on another kernel instance",
                    call.method
                )));
            }
            let target = self.ctx.class.method(&call.method).ok_or_else(|| {
                CodegenError::configuration(format!(
                    "method `{}` is not declared on kernel class {}",
                    call.method, call.owner
                ))
            })?;
            let mut parts: Vec<String> = args.into_iter().map(|arg| arg.text).collect();
            parts.extend(self.ctx.forwarded_arguments());
            return Ok(format!(
                "{}({})",
                sanitize_identifier(&target.name),
                parts.join(", ")
            ));
        }

        match call.kind {
            InvokeKind::Virtual | InvokeKind::Interface => {
                return Err(CodegenError::unsupported(format!(
                    "virtual dispatch to {}.{}",
                    call.owner, call.method
                )))
            }
            InvokeKind::Special => {
                return Err(CodegenError::unsupported(format!(
                    "constructor or super call {}.{}",
                    call.owner, call.method
                )))
            }
            InvokeKind::Static | InvokeKind::Dynamic => {}
        }

        let helper = self
            .ctx
            .class
            .metadata
            .function(&call.owner, &call.method)
            .ok_or_else(|| {
                CodegenError::configuration(format!(
                    "no kernel-language function declared for {}.{} (node {})",
                    call.owner,
                    call.method,
                    id.raw()
                ))
            })?;
        let parts: Vec<String> = args.into_iter().map(|arg| arg.text).collect();
        if helper.literal {
            Ok(format!("({})({})", helper.name, parts.join(", ")))
        } else {
            Ok(format!("{}({})", helper.name, parts.join(", ")))
        }
    }

    /// Fixed-size allocation becomes a private array declared at the
    /// function top.
    fn render_private_array(&mut self, id: NodeId, node: &Node) -> Result<Code, CodegenError> {
        let element = match node.ty.element() {
            Some(element) if !element.is_array() => element,
            _ => {
                return Err(CodegenError::NotYetImplemented {
                    construct: "multi-dimensional array allocation".to_owned(),
                })
            }
        };
        let length = node
            .operands
            .first()
            .and_then(|&len| self.node(len).ok())
            .and_then(|len| match len.kind {
                NodeKind::Int(n) if n > 0 => Some(n),
                _ => None,
            })
            .ok_or_else(|| {
                CodegenError::unsupported("array allocation without a positive constant length")
            })?;

        let name = self.writer.fresh_temp("var");
        self.declarations.push(format!(
            "{} {name}[{length}];",
            self.ctx.types.name(element)
        ));
        let code = Code {
            ty: node.ty.clone(),
            text: name,
        };
        self.memo.insert(id, code.clone());
        Ok(code)
    }
}

/// Unpack exactly `N` rendered operands.
fn exactly<const N: usize>(id: NodeId, args: Vec<Code>) -> Result<[Code; N], CodegenError> {
    <[Code; N]>::try_from(args).map_err(|args| {
        CodegenError::invariant(format!(
            "expected exactly {N} values for node {}, found {}",
            id.raw(),
            args.len()
        ))
    })
}

fn binary_text(op: BinaryOp, ty: &KernelType, lhs: &str, rhs: &str) -> String {
    match (op, ty) {
        (BinaryOp::UShr, KernelType::Int) => format!("((int)((uint){lhs} >> {rhs}))"),
        (BinaryOp::UShr, KernelType::Long) => format!("((long)((ulong){lhs} >> {rhs}))"),
        _ => format!("({lhs} {} {rhs})", op.symbol()),
    }
}

fn three_way_text(mode: ThreeWayMode, lhs: &str, rhs: &str) -> String {
    match mode {
        ThreeWayMode::Integral => {
            format!("(({lhs} > {rhs}) ? 1 : (({lhs} < {rhs}) ? -1 : 0))")
        }
        ThreeWayMode::NanBelow => {
            format!("(({lhs} > {rhs}) ? 1 : (({lhs} == {rhs}) ? 0 : -1))")
        }
        ThreeWayMode::NanAbove => {
            format!("(({lhs} < {rhs}) ? -1 : (({lhs} == {rhs}) ? 0 : 1))")
        }
    }
}

// ── Literals ────────────────────────────────────────────────────────

pub(crate) fn int_literal(value: i32) -> String {
    if value == i32::MIN {
        "(-2147483647 - 1)".to_owned()
    } else {
        value.to_string()
    }
}

pub(crate) fn long_literal(value: i64) -> String {
    if value == i64::MIN {
        "(-9223372036854775807L - 1L)".to_owned()
    } else {
        format!("{value}L")
    }
}

/// Shortest text that round-trips to the same `f32`.
pub(crate) fn float_literal(value: f32) -> String {
    if value.is_nan() {
        "NAN".to_owned()
    } else if value == f32::INFINITY {
        "INFINITY".to_owned()
    } else if value == f32::NEG_INFINITY {
        "(-INFINITY)".to_owned()
    } else {
        format!("{value:?}f")
    }
}

pub(crate) fn double_literal(value: f64) -> String {
    if value.is_nan() {
        "((double)NAN)".to_owned()
    } else if value == f64::INFINITY {
        "((double)INFINITY)".to_owned()
    } else if value == f64::NEG_INFINITY {
        "((double)(-INFINITY))".to_owned()
    } else {
        format!("{value:?}")
    }
}

fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("\\x{byte:02x}"));
                }
            }
        }
    }
    out.push('"');
    out
}
