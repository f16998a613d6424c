//! Kernel-language naming metadata for helper functions and helper types.
//!
//! The analyzer attaches this to a [`KernelClass`](crate::KernelClass).
//! A helper function without an entry here cannot be translated; a type
//! without an entry falls back to a structural name.

use rustc_hash::FxHashMap;

use crate::types::ClassName;

/// Class whose methods expose the current work-item identity.
pub const WORK_ITEM_CLASS: &str = "kir.WorkItem";

/// Kernel-language spelling of a helper function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelperFunction {
    pub name: String,
    /// Emit as a literal (`(float2)(a, b)`) rather than a call.
    pub literal: bool,
}

/// Kernel-language spelling of a helper type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeMetadata {
    pub name: String,
    /// Scalar lanes of a vector type, `None` for scalar helper types.
    pub element_count: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct Metadata {
    functions: FxHashMap<ClassName, FxHashMap<String, HelperFunction>>,
    types: FxHashMap<ClassName, TypeMetadata>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata preloaded with the work-item identity accessors.
    pub fn with_builtins() -> Self {
        let owner = ClassName::new(WORK_ITEM_CLASS);
        Self::new()
            .with_function(&owner, "global_id", "get_global_id", false)
            .with_function(&owner, "global_size", "get_global_size", false)
            .with_function(&owner, "local_id", "get_local_id", false)
            .with_function(&owner, "local_size", "get_local_size", false)
            .with_function(&owner, "group_id", "get_group_id", false)
    }

    #[must_use]
    pub fn with_function(
        mut self,
        owner: &ClassName,
        method: &str,
        name: &str,
        literal: bool,
    ) -> Self {
        self.functions.entry(owner.clone()).or_default().insert(
            method.to_owned(),
            HelperFunction {
                name: name.to_owned(),
                literal,
            },
        );
        self
    }

    #[must_use]
    pub fn with_type(mut self, class: &ClassName, name: &str, element_count: Option<u32>) -> Self {
        self.types.insert(
            class.clone(),
            TypeMetadata {
                name: name.to_owned(),
                element_count,
            },
        );
        self
    }

    pub fn function(&self, owner: &ClassName, method: &str) -> Option<&HelperFunction> {
        self.functions.get(owner)?.get(method)
    }

    pub fn type_info(&self, class: &ClassName) -> Option<&TypeMetadata> {
        self.types.get(class)
    }
}

#[cfg(test)]
mod tests;
