//! Per-method emission state and function signatures.

use rustc_hash::{FxHashMap, FxHashSet};

use kir_ir::{
    Block, Graph, KernelArgument, KernelClass, KernelType, Label, MethodGraph, Node, NodeId,
    NodeKind,
};

use crate::error::CodegenError;
use crate::placement::Placement;
use crate::types::{sanitize_identifier, TypeNamer};
use crate::writer::CodeWriter;

/// Shared state for every function of one compilation unit.
pub(crate) struct UnitContext<'a> {
    pub(crate) class: &'a KernelClass,
    pub(crate) arguments: Vec<KernelArgument>,
    pub(crate) types: TypeNamer<'a>,
}

impl<'a> UnitContext<'a> {
    pub(crate) fn new(class: &'a KernelClass) -> Self {
        Self {
            class,
            arguments: class.kernel_arguments(),
            types: TypeNamer::new(&class.metadata),
        }
    }

    pub(crate) fn argument(&self, field: &str) -> Option<&KernelArgument> {
        self.arguments.iter().find(|arg| arg.name == field)
    }

    /// Argument list appended to every call of a method on the kernel
    /// class.
    pub(crate) fn forwarded_arguments(&self) -> impl Iterator<Item = String> + '_ {
        self.arguments
            .iter()
            .map(|arg| sanitize_identifier(&arg.name))
    }

    fn argument_declarations(&self) -> impl Iterator<Item = String> + '_ {
        self.arguments
            .iter()
            .map(|arg| self.types.declare(&arg.ty, &sanitize_identifier(&arg.name)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MethodRole {
    Entry,
    Helper,
}

/// Function header without the trailing body or semicolon.
pub(crate) fn signature(
    ctx: &UnitContext<'_>,
    method: &MethodGraph,
    role: MethodRole,
) -> Result<String, CodegenError> {
    let name = sanitize_identifier(&method.name);
    let own = method
        .params
        .iter()
        .map(|param| ctx.types.declare(&param.ty, &sanitize_identifier(&param.name)));

    match role {
        MethodRole::Entry => {
            if !method.return_type.is_void() {
                return Err(CodegenError::configuration(format!(
                    "entry method `{}` must not return a value",
                    method.name
                )));
            }
            let params: Vec<String> = ctx.argument_declarations().chain(own).collect();
            Ok(format!("__kernel void {name}({})", join_params(&params)))
        }
        MethodRole::Helper => {
            let params: Vec<String> = own.chain(ctx.argument_declarations()).collect();
            Ok(format!(
                "{} {name}({})",
                ctx.types.name(&method.return_type),
                join_params(&params)
            ))
        }
    }
}

fn join_params(params: &[String]) -> String {
    if params.is_empty() {
        "void".to_owned()
    } else {
        params.join(", ")
    }
}

/// Emit one complete function definition into `out`.
pub(crate) fn emit_method(
    ctx: &UnitContext<'_>,
    method: &MethodGraph,
    role: MethodRole,
    out: &mut CodeWriter,
) -> Result<(), CodegenError> {
    let header = signature(ctx, method, role)?;
    tracing::debug!(
        method = %method.name,
        nodes = method.graph.len(),
        ?role,
        "emitting function"
    );

    let mut emitter = FunctionEmitter::new(ctx, method);
    kir_ir::sequence(&method.body, &mut emitter)?;
    let (declarations, body) = emitter.finish()?;

    out.writeln(&format!("{header} {{"));
    out.indent();
    for declaration in &declarations {
        out.writeln(declaration);
    }
    out.write_lines(&body);
    out.dedent();
    out.writeln("}");
    Ok(())
}

// ── Emitter state ───────────────────────────────────────────────────

/// A rendered expression: its type and kernel-language text.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Code {
    pub(crate) ty: KernelType,
    pub(crate) text: String,
}

/// A construct whose closing callback has not arrived yet.
#[derive(Debug)]
pub(crate) enum Open {
    Block { block: Block, exit_used: bool },
    If { node: NodeId, in_else: bool },
    Switch { node: NodeId, has_default: bool },
    Case { node: NodeId },
}

impl Open {
    pub(crate) fn describe(open: Option<&Open>) -> String {
        match open {
            Some(Open::Block { block, .. }) => format!("block {}", block.label),
            Some(Open::If { node, .. }) => format!("if {}", node.raw()),
            Some(Open::Switch { node, .. }) => format!("switch {}", node.raw()),
            Some(Open::Case { node }) => format!("case of switch {}", node.raw()),
            None => "nothing".to_owned(),
        }
    }
}

/// Emits the body of a single method.
///
/// Phi temporaries and hoisted temporaries are collected in
/// `declarations` and written at the top of the function; everything
/// else goes to `writer` in source order.
pub(crate) struct FunctionEmitter<'a> {
    pub(crate) ctx: &'a UnitContext<'a>,
    pub(crate) method: &'a MethodGraph,
    pub(crate) writer: CodeWriter,
    pub(crate) declarations: Vec<String>,
    pub(crate) use_counts: Vec<u32>,
    /// Node to the temporary (or name) that already holds its value.
    pub(crate) memo: FxHashMap<NodeId, Code>,
    /// Shared values to bind before each construct opens.
    pub(crate) placement: Placement,
    /// Shared values that could not move in front of their construct;
    /// their temporaries are kept like side-effecting ones.
    pub(crate) pinned: FxHashSet<NodeId>,
    /// Pure temporaries introduced per open scope; forgotten when the
    /// scope closes. The first entry is the function scope.
    pub(crate) scopes: Vec<Vec<NodeId>>,
    pub(crate) open: Vec<Open>,
    pub(crate) labels: FxHashSet<Label>,
}

impl<'a> FunctionEmitter<'a> {
    pub(crate) fn new(ctx: &'a UnitContext<'a>, method: &'a MethodGraph) -> Self {
        let mut emitter = Self {
            ctx,
            method,
            writer: CodeWriter::new(),
            declarations: Vec::new(),
            use_counts: method.graph.use_counts(),
            memo: FxHashMap::default(),
            placement: Placement::default(),
            pinned: FxHashSet::default(),
            scopes: vec![Vec::new()],
            open: Vec::new(),
            labels: FxHashSet::default(),
        };
        emitter.declare_phis();
        let placement = Placement::plan(method, |id| emitter.is_shared_value(id));
        emitter.placement = placement;
        emitter
    }

    /// A pure, non-trivial value with more than one consumer.
    pub(crate) fn is_shared_value(&self, id: NodeId) -> bool {
        let Ok(node) = self.node(id) else {
            return false;
        };
        let uses = self.use_counts.get(id.index()).copied().unwrap_or(0);
        uses > 1
            && !node.ty.is_void()
            && !node.kind.is_control_marker()
            && !matches!(node.kind, NodeKind::Phi { .. })
            && !node.kind.has_side_effects(&node.ty)
            && !self.is_trivial(node)
    }

    /// Every phi gets one temporary, declared before the body.
    fn declare_phis(&mut self) {
        let graph: &'a Graph = &self.method.graph;
        for (id, node) in graph.phis() {
            let name = self.writer.fresh_temp("phi");
            self.declarations.push(format!("{};", self.ctx.types.declare(&node.ty, &name)));
            self.memo.insert(
                id,
                Code {
                    ty: node.ty.clone(),
                    text: name,
                },
            );
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&'a Node, CodegenError> {
        let graph: &'a Graph = &self.method.graph;
        graph.get(id).ok_or_else(|| {
            CodegenError::invariant(format!(
                "node {} is outside the graph of `{}`",
                id.raw(),
                self.method.name
            ))
        })
    }

    /// Inside any block, branch, or case.
    pub(crate) fn is_nested(&self) -> bool {
        self.scopes.len() > 1
    }

    pub(crate) fn open_scope(&mut self) {
        self.writer.indent();
        self.scopes.push(Vec::new());
    }

    pub(crate) fn close_scope(&mut self) {
        if let Some(introduced) = self.scopes.pop() {
            for id in introduced {
                self.memo.remove(&id);
            }
        }
        self.writer.dedent();
    }

    /// Declarations and body text; fails if a construct is still open.
    pub(crate) fn finish(self) -> Result<(Vec<String>, String), CodegenError> {
        if !self.open.is_empty() {
            return Err(CodegenError::invariant(format!(
                "`{}` ended with {} still open",
                self.method.name,
                Open::describe(self.open.last())
            )));
        }
        let mut writer = self.writer;
        Ok((self.declarations, writer.take_output()))
    }
}

#[cfg(test)]
mod tests;
