//! Execution contexts.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{ItemFault, KernelFault, Result};
use crate::kernel::{Kernel, WorkItem};

/// Runs kernels over `n` independent work-items.
///
/// `compute` is a barrier: it returns once every item has finished,
/// with `Ok` only if all of them succeeded. `close` releases what the
/// context owns and may be called more than once; `compute` after
/// `close` fails with [`Error::Closed`](crate::Error::Closed) on contexts
/// that own resources.
pub trait Context: Send + Sync {
    fn compute(&self, n: usize, kernel: &Arc<dyn Kernel>) -> Result<()>;

    fn close(&self) -> Result<()>;
}

/// Run one work-item on the current thread, turning a returned fault or a
/// panic into an [`ItemFault`].
pub(crate) fn run_item(kernel: &dyn Kernel, item: WorkItem) -> Option<ItemFault> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| kernel.process_work_item(&item)));
    let fault = match outcome {
        Ok(Ok(())) => return None,
        Ok(Err(fault)) => fault,
        Err(payload) => KernelFault::from_panic(payload.as_ref()),
    };
    tracing::debug!(work_item = item.id(), %fault, "work-item failed");
    Some(ItemFault {
        work_item: item.id(),
        fault,
    })
}
