//! Semantic types carried by graph nodes.

use std::fmt;
use std::sync::Arc;

/// Fully qualified name of a class known to the analyzer.
///
/// Cheap to clone; the analyzer hands out the same names for every node
/// that refers to a class.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName(Arc<str>);

impl ClassName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path segment (`demo.vec.Float2` → `Float2`).
    pub fn simple_name(&self) -> &str {
        self.0.rsplit(['.', '/', '$']).next().unwrap_or(&self.0)
    }
}

impl fmt::Debug for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassName({})", self.0)
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Semantic type of a node, field, or parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KernelType {
    Void,
    Bool,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    /// A class instance. Only classes with type metadata (vector types)
    /// have a kernel-language representation.
    Object(ClassName),
    Array(Box<KernelType>),
}

impl KernelType {
    pub fn array_of(element: KernelType) -> Self {
        KernelType::Array(Box::new(element))
    }

    pub fn object(name: &str) -> Self {
        KernelType::Object(ClassName::new(name))
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, KernelType::Void)
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, KernelType::Array(_))
    }

    /// Integral types, where division can trap.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            KernelType::Byte | KernelType::Short | KernelType::Char | KernelType::Int | KernelType::Long
        )
    }

    /// Element type of an array, `None` for everything else.
    pub fn element(&self) -> Option<&KernelType> {
        match self {
            KernelType::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Number of array dimensions (`int[][]` → 2).
    pub fn dimensions(&self) -> usize {
        let mut ty = self;
        let mut dims = 0;
        while let KernelType::Array(element) = ty {
            dims += 1;
            ty = element;
        }
        dims
    }
}
