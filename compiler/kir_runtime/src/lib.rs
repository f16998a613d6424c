//! Running kir kernels.
//!
//! A [`Platform`] creates [`Context`]s; a context runs a [`Kernel`] over
//! `n` work-items and returns once all of them have finished.
//!
//! - [`ParallelContext`] fans items out over rayon's global pool.
//! - [`PoolContext`] owns a fixed set of named worker threads.
//! - [`DeviceContext`] compiles the kernel's analyzed class to OpenCL C,
//!   builds it on the selected device and enqueues one launch of `n`
//!   items, marshalling field [`Binding`]s to and from device buffers.
//!
//! Compiled programs are cached per kernel object in a [`KernelCache`].
//! [`PlatformFactory`] discovers an accelerator with the configured
//! [`Options`] and falls back to host threads when none is usable.

mod cache;
mod context;
mod device;
mod error;
mod kernel;
mod memory;
mod options;
mod parallel;
mod platform;
mod pool;
mod selection;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use cache::KernelCache;
pub use context::Context;
pub use device::DeviceContext;
pub use error::{Error, ExecutionFailure, ItemFault, KernelFault, Result};
pub use kernel::{Kernel, KernelKey, WorkItem};
pub use memory::{Binding, Element, SharedArray};
pub use options::{
    by_compute_units, CpuStrategy, DeviceComparator, Options, PlatformFilter,
    ENV_CPU_STRATEGY, ENV_CPU_THREADS, ENV_OPENCL_LIBRARY,
};
pub use parallel::ParallelContext;
pub use platform::{AcceleratorPlatform, CpuPlatform, Platform, PlatformFactory, CPU_DEVICE_NAME};
pub use pool::PoolContext;
pub use selection::{select_device, Selection};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set, and only the first call has
/// any effect.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
