//! Accelerator driver interface for kir.
//!
//! - **[`Driver`]**: the raw entry points kir needs from an OpenCL
//!   implementation, with opaque handle newtypes and numeric status codes.
//! - **[`OpenCl`]**: a [`Driver`] backed by the vendor library, loaded at
//!   run time. This is the only module that contains `unsafe` code.
//! - **Queries** ([`device_info`], [`platform_ids`], ...): the two-phase
//!   "ask for the size, allocate, fetch" protocol, written once and
//!   parameterized by property kind.
//! - **Snapshots** ([`PlatformProperties`], [`DeviceProperties`]):
//!   immutable views of what a platform and its devices report.
//!
//! With the `testing` feature, [`testing::ScriptedDriver`] provides an
//! in-memory driver for exercising callers without a device.

mod api;
mod error;
#[allow(
    unsafe_code,
    reason = "FFI boundary to the dynamically loaded OpenCL library"
)]
mod opencl;
mod properties;
mod query;
pub mod status;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{ContextId, DeviceId, Driver, KernelArg, KernelId, MemId, PlatformId, ProgramId, QueueId};
pub use error::{check, DriverError};
pub use opencl::{default_library_candidates, OpenCl};
pub use properties::{devices, platforms, DeviceProperties, PlatformProperties};
pub use query::{
    build_log, device_ids, device_info, platform_ids, platform_name, two_phase, DeviceName,
    DeviceProperty, MaxClockFrequency, MaxComputeUnits, MaxWorkGroupSize, MaxWorkItemDimensions,
    MaxWorkItemSizes, MemBaseAddrAlign,
};
