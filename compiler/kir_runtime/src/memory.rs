//! Host memory shared between work-items and with devices.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Error;

/// Scalar types a [`SharedArray`] can hold.
pub trait Element: Copy + Send + Sync + 'static {
    /// Bytes per element in device buffers.
    const WIDTH: usize;
    const NAME: &'static str;

    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;
    fn write_ne(self, out: &mut Vec<u8>);
    fn read_ne(bytes: &[u8]) -> Self;
}

macro_rules! element {
    ($ty:ty, $name:literal, |$v:ident| $to:expr, |$b:ident| $from:expr) => {
        impl Element for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            const NAME: &'static str = $name;

            fn to_bits(self) -> u64 {
                let $v = self;
                $to
            }

            fn from_bits(bits: u64) -> Self {
                let $b = bits;
                $from
            }

            fn write_ne(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_ne_bytes());
            }

            fn read_ne(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&bytes[..Self::WIDTH]);
                <$ty>::from_ne_bytes(raw)
            }
        }
    };
}

// Elements narrower than 64 bits keep their bit pattern in the low half.
element!(i32, "int", |v| u64::from(u32::from_ne_bytes(v.to_ne_bytes())), |b| {
    i32::from_ne_bytes((b as u32).to_ne_bytes())
});
element!(i64, "long", |v| u64::from_ne_bytes(v.to_ne_bytes()), |b| {
    i64::from_ne_bytes(b.to_ne_bytes())
});
element!(f32, "float", |v| u64::from(v.to_bits()), |b| f32::from_bits(b as u32));
element!(f64, "double", |v| v.to_bits(), |b| f64::from_bits(b));

/// Fixed-length array that work-items read and write concurrently.
///
/// Clones share storage. Each element is stored in its own atomic cell,
/// so concurrent writes to one index are a race in the kernel, never
/// undefined behavior in the host. Accesses are relaxed; the end of a
/// `compute` call orders them with the caller.
pub struct SharedArray<T: Element> {
    cells: Arc<[AtomicU64]>,
    _element: PhantomData<T>,
}

impl<T: Element> SharedArray<T> {
    /// `len` zeroed elements.
    pub fn new(len: usize) -> Self {
        SharedArray {
            cells: (0..len).map(|_| AtomicU64::new(0)).collect(),
            _element: PhantomData,
        }
    }

    pub fn from_slice(values: &[T]) -> Self {
        SharedArray {
            cells: values
                .iter()
                .map(|value| AtomicU64::new(value.to_bits()))
                .collect(),
            _element: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// # Panics
    /// If `index` is out of bounds, like slice indexing.
    pub fn get(&self, index: usize) -> T {
        T::from_bits(self.cells[index].load(Ordering::Relaxed))
    }

    /// # Panics
    /// If `index` is out of bounds, like slice indexing.
    pub fn set(&self, index: usize, value: T) {
        self.cells[index].store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn to_vec(&self) -> Vec<T> {
        (0..self.len()).map(|index| self.get(index)).collect()
    }

    /// Whether `self` and `other` share storage.
    pub fn same_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cells, &other.cells)
    }

    /// Contents in native byte order, as a device buffer holds them.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * T::WIDTH);
        for index in 0..self.len() {
            self.get(index).write_ne(&mut out);
        }
        out
    }

    /// Overwrite every element from device-buffer bytes.
    pub fn copy_from_bytes(&self, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() != self.len() * T::WIDTH {
            return Err(Error::Internal {
                message: format!(
                    "buffer of {} bytes read back into {} {} elements",
                    bytes.len(),
                    self.len(),
                    T::NAME
                ),
            });
        }
        for (index, chunk) in bytes.chunks_exact(T::WIDTH).enumerate() {
            self.set(index, T::read_ne(chunk));
        }
        Ok(())
    }
}

impl<T: Element> Clone for SharedArray<T> {
    fn clone(&self) -> Self {
        SharedArray {
            cells: Arc::clone(&self.cells),
            _element: PhantomData,
        }
    }
}

impl<T: Element + fmt::Debug> fmt::Debug for SharedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

/// Value of one kernel field, bound to the matching generated parameter.
///
/// Arrays of vector types (`float2`, `float4`, ...) bind as flat
/// [`Binding::FloatArray`]s holding every lane.
#[derive(Clone, Debug)]
pub enum Binding {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    IntArray(SharedArray<i32>),
    LongArray(SharedArray<i64>),
    FloatArray(SharedArray<f32>),
    DoubleArray(SharedArray<f64>),
}

impl Binding {
    /// Kernel-language spelling of the bound type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Binding::Int(_) => "int",
            Binding::Long(_) => "long",
            Binding::Float(_) => "float",
            Binding::Double(_) => "double",
            Binding::IntArray(_) => "int[]",
            Binding::LongArray(_) => "long[]",
            Binding::FloatArray(_) => "float[]",
            Binding::DoubleArray(_) => "double[]",
        }
    }

    pub fn is_array(&self) -> bool {
        self.array_len().is_some()
    }

    /// Element count of an array binding.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Binding::IntArray(array) => Some(array.len()),
            Binding::LongArray(array) => Some(array.len()),
            Binding::FloatArray(array) => Some(array.len()),
            Binding::DoubleArray(array) => Some(array.len()),
            Binding::Int(_) | Binding::Long(_) | Binding::Float(_) | Binding::Double(_) => None,
        }
    }

    /// Native-order bytes of a scalar, or of an array's contents.
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Binding::Int(value) => value.write_ne(&mut out),
            Binding::Long(value) => value.write_ne(&mut out),
            Binding::Float(value) => value.write_ne(&mut out),
            Binding::Double(value) => value.write_ne(&mut out),
            Binding::IntArray(array) => out = array.to_bytes(),
            Binding::LongArray(array) => out = array.to_bytes(),
            Binding::FloatArray(array) => out = array.to_bytes(),
            Binding::DoubleArray(array) => out = array.to_bytes(),
        }
        out
    }

    /// Copy device-buffer bytes back into an array binding. Scalars are
    /// passed by value and have nothing to read back.
    pub(crate) fn read_back(&self, bytes: &[u8]) -> Result<(), Error> {
        match self {
            Binding::IntArray(array) => array.copy_from_bytes(bytes),
            Binding::LongArray(array) => array.copy_from_bytes(bytes),
            Binding::FloatArray(array) => array.copy_from_bytes(bytes),
            Binding::DoubleArray(array) => array.copy_from_bytes(bytes),
            Binding::Int(_) | Binding::Long(_) | Binding::Float(_) | Binding::Double(_) => Ok(()),
        }
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
