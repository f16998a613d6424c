//! Kernel classes: ordered state fields plus analyzed methods.

use crate::graph::Graph;
use crate::metadata::Metadata;
use crate::structure::Stmt;
use crate::types::{ClassName, KernelType};

/// Name of the method every kernel class must declare as its per-item
/// entry point.
pub const ENTRY_METHOD: &str = "process_work_item";

/// A state field declared on the kernel class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: KernelType,
}

/// A declared method parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: KernelType,
}

impl Param {
    pub fn new(name: &str, ty: KernelType) -> Self {
        Self {
            name: name.to_owned(),
            ty,
        }
    }
}

/// A kernel field lifted into an explicit parameter of every generated
/// function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelArgument {
    pub name: String,
    pub ty: KernelType,
}

/// One analyzed method: its signature, node graph, and structured body.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodGraph {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: KernelType,
    pub graph: Graph,
    pub body: Vec<Stmt>,
    pub is_constructor: bool,
}

impl MethodGraph {
    pub fn new(name: &str, params: Vec<Param>, return_type: KernelType) -> Self {
        Self {
            name: name.to_owned(),
            params,
            return_type,
            graph: Graph::new(),
            body: Vec::new(),
            is_constructor: false,
        }
    }

    #[must_use]
    pub fn with_body(mut self, graph: Graph, body: Vec<Stmt>) -> Self {
        self.graph = graph;
        self.body = body;
        self
    }
}

/// A resolved kernel class as handed over by the analyzer.
#[derive(Clone, Debug)]
pub struct KernelClass {
    pub name: ClassName,
    /// Declaration order is preserved; it fixes the kernel argument order.
    pub fields: Vec<Field>,
    pub methods: Vec<MethodGraph>,
    pub metadata: Metadata,
}

impl KernelClass {
    pub fn new(name: &str) -> Self {
        Self {
            name: ClassName::new(name),
            fields: Vec::new(),
            methods: Vec::new(),
            metadata: Metadata::with_builtins(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: &str, ty: KernelType) -> Self {
        self.fields.push(Field {
            name: name.to_owned(),
            ty,
        });
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: MethodGraph) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn method(&self, name: &str) -> Option<&MethodGraph> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn entry_method(&self) -> Option<&MethodGraph> {
        self.methods
            .iter()
            .find(|m| m.name == ENTRY_METHOD && !m.is_constructor)
    }

    /// Methods other than the entry point and constructors, in
    /// declaration order.
    pub fn helper_methods(&self) -> impl Iterator<Item = &MethodGraph> {
        self.methods
            .iter()
            .filter(|m| m.name != ENTRY_METHOD && !m.is_constructor)
    }

    /// One argument per declared field, in declaration order.
    pub fn kernel_arguments(&self) -> Vec<KernelArgument> {
        self.fields
            .iter()
            .map(|field| KernelArgument {
                name: field.name.clone(),
                ty: field.ty.clone(),
            })
            .collect()
    }
}
