//! Compilation-unit orchestration: one kernel class in, one source text out.

use kir_ir::{KernelArgument, KernelClass, KernelType, MethodGraph, ENTRY_METHOD};

use crate::error::CodegenError;
use crate::function::{emit_method, signature, MethodRole, UnitContext};
use crate::types::sanitize_identifier;
use crate::writer::CodeWriter;

/// Generated source for one kernel class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelSource {
    pub text: String,
    /// Name of the `__kernel` function in `text`.
    pub entry_point: String,
    /// Kernel parameters in the order the entry function declares them.
    pub arguments: Vec<KernelArgument>,
}

/// Generate the compilation unit for `class`.
///
/// Helper methods are emitted first (after forward prototypes), the
/// entry method last.
pub fn generate_kernel_source(class: &KernelClass) -> Result<KernelSource, CodegenError> {
    let entry = class.entry_method().ok_or_else(|| {
        CodegenError::configuration(format!(
            "kernel class {} declares no `{ENTRY_METHOD}` method",
            class.name
        ))
    })?;
    let ctx = UnitContext::new(class);
    let helpers: Vec<&MethodGraph> = class.helper_methods().collect();

    tracing::debug!(
        class = %class.name,
        helpers = helpers.len(),
        arguments = ctx.arguments.len(),
        "generating kernel source"
    );

    let mut out = CodeWriter::new();
    if uses_double(class) {
        out.writeln("#pragma OPENCL EXTENSION cl_khr_fp64 : enable");
        out.newline();
    }
    if !helpers.is_empty() {
        for helper in &helpers {
            out.writeln(&format!(
                "{};",
                signature(&ctx, helper, MethodRole::Helper)?
            ));
        }
        out.newline();
    }
    for helper in &helpers {
        emit_method(&ctx, helper, MethodRole::Helper, &mut out)?;
        out.newline();
    }
    emit_method(&ctx, entry, MethodRole::Entry, &mut out)?;

    let text = out.take_output();
    tracing::trace!(class = %class.name, source = %text, "generated kernel source");

    Ok(KernelSource {
        text,
        entry_point: sanitize_identifier(&entry.name),
        arguments: ctx.arguments,
    })
}

fn mentions_double(ty: &KernelType) -> bool {
    match ty {
        KernelType::Double => true,
        KernelType::Array(element) => mentions_double(element),
        _ => false,
    }
}

/// Whether any field, signature, or node uses `double`.
fn uses_double(class: &KernelClass) -> bool {
    class.fields.iter().any(|field| mentions_double(&field.ty))
        || class.methods.iter().any(|method| {
            mentions_double(&method.return_type)
                || method.params.iter().any(|param| mentions_double(&param.ty))
                || method.graph.iter().any(|(_, node)| mentions_double(&node.ty))
        })
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
