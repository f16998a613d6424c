//! Kernel-language type names.
//!
//! A type with [`TypeMetadata`](kir_ir::TypeMetadata) uses its declared
//! name; everything else gets a structural name. Arrays always live in
//! the global address space.

use kir_ir::{KernelType, Metadata};

/// Maps a name to a valid OpenCL C identifier.
///
/// Characters outside `[A-Za-z0-9_]` become `_`; a leading digit gets a
/// `_` prefix.
pub fn sanitize_identifier(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);
    if name.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        result.push('_');
    }
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            result.push(c);
        } else {
            result.push('_');
        }
    }
    result
}

/// Resolves [`KernelType`]s to kernel-language type text.
#[derive(Clone, Copy, Debug)]
pub struct TypeNamer<'a> {
    metadata: &'a Metadata,
}

impl<'a> TypeNamer<'a> {
    pub fn new(metadata: &'a Metadata) -> Self {
        Self { metadata }
    }

    /// Type text without address-space qualifiers.
    pub fn name(&self, ty: &KernelType) -> String {
        match ty {
            KernelType::Void => "void".to_owned(),
            KernelType::Bool => "bool".to_owned(),
            KernelType::Byte => "char".to_owned(),
            KernelType::Short => "short".to_owned(),
            KernelType::Char => "ushort".to_owned(),
            KernelType::Int => "int".to_owned(),
            KernelType::Long => "long".to_owned(),
            KernelType::Float => "float".to_owned(),
            KernelType::Double => "double".to_owned(),
            KernelType::Object(class) => match self.metadata.type_info(class) {
                Some(info) => info.name.clone(),
                None => sanitize_identifier(class.simple_name()),
            },
            KernelType::Array(element) => format!("{}*", self.name(element)),
        }
    }

    /// Declaration of `name` with type `ty`. Arrays get `__global`.
    pub fn declare(&self, ty: &KernelType, name: &str) -> String {
        if ty.is_array() {
            format!("__global {} {name}", self.name(ty))
        } else {
            format!("{} {name}", self.name(ty))
        }
    }

    /// Scalar lanes per element of a vector type, 1 for everything else.
    pub fn lanes(&self, ty: &KernelType) -> u32 {
        match ty {
            KernelType::Object(class) => self
                .metadata
                .type_info(class)
                .and_then(|info| info.element_count)
                .unwrap_or(1),
            _ => 1,
        }
    }
}
