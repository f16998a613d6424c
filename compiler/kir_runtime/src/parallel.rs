//! Host execution on the shared rayon pool.

use std::sync::Arc;

use rayon::prelude::*;

use crate::context::{run_item, Context};
use crate::error::{collect_faults, ItemFault, Result};
use crate::kernel::{Kernel, WorkItem};

/// Fans work-items out over rayon's global pool.
///
/// Owns nothing: `close` does nothing and the context stays usable.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelContext;

impl ParallelContext {
    pub fn new() -> Self {
        ParallelContext
    }
}

impl Context for ParallelContext {
    fn compute(&self, n: usize, kernel: &Arc<dyn Kernel>) -> Result<()> {
        tracing::trace!(work_items = n, "parallel compute");
        let kernel = kernel.as_ref();
        let faults: Vec<ItemFault> = (0..n)
            .into_par_iter()
            .filter_map(|id| run_item(kernel, WorkItem::new(id, n)))
            .collect();
        collect_faults(n, faults)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
