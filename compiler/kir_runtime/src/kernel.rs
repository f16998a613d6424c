//! Kernels and work-item identity.

use std::sync::Arc;

use kir_ir::KernelClass;

use crate::error::KernelFault;
use crate::memory::Binding;

/// Identity of one work-item: its id and the size of the launch.
///
/// Passed explicitly to every item; host threads keep no ambient
/// per-item state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkItem {
    id: usize,
    size: usize,
}

impl WorkItem {
    pub fn new(id: usize, size: usize) -> Self {
        debug_assert!(id < size, "work-item {id} outside launch of {size}");
        WorkItem { id, size }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Id in `dimension`. Launches are one-dimensional, so every other
    /// dimension reports 0.
    pub fn global_id(&self, dimension: u32) -> usize {
        if dimension == 0 {
            self.id
        } else {
            0
        }
    }

    /// Launch size in `dimension`; 1 beyond the first.
    pub fn global_size(&self, dimension: u32) -> usize {
        if dimension == 0 {
            self.size
        } else {
            1
        }
    }
}

/// A unit of data-parallel work.
///
/// Host contexts call [`process_work_item`](Kernel::process_work_item)
/// directly. The accelerator context compiles [`class`](Kernel::class)
/// instead and binds [`bindings`](Kernel::bindings) to the generated
/// kernel parameters, one per field in declaration order.
pub trait Kernel: Send + Sync {
    fn process_work_item(&self, item: &WorkItem) -> Result<(), KernelFault>;

    /// Analyzed form of this kernel, if it can run on a device.
    fn class(&self) -> Option<&KernelClass> {
        None
    }

    /// Current field values, in field declaration order.
    fn bindings(&self) -> Vec<Binding> {
        Vec::new()
    }
}

/// Identity of a kernel object.
///
/// Two handles to the same allocation are the same kernel; two equal
/// kernels in different allocations are not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelKey(usize);

impl KernelKey {
    pub fn of(kernel: &Arc<dyn Kernel>) -> Self {
        KernelKey(Arc::as_ptr(kernel).cast::<()>() as usize)
    }
}
