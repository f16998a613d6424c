//! The raw driver surface.

use std::fmt;

use crate::status::Status;

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// Wrap a raw driver handle.
            #[inline]
            pub fn new(raw: usize) -> Self {
                Self(raw)
            }

            /// Get the raw handle value.
            #[inline]
            pub fn raw(self) -> usize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }
    };
}

handle!(
    /// `cl_platform_id`
    PlatformId
);
handle!(
    /// `cl_device_id`
    DeviceId
);
handle!(
    /// `cl_context`
    ContextId
);
handle!(
    /// `cl_command_queue`
    QueueId
);
handle!(
    /// `cl_program`
    ProgramId
);
handle!(
    /// `cl_kernel`
    KernelId
);
handle!(
    /// `cl_mem`
    MemId
);

/// Value bound to one kernel parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelArg<'a> {
    /// Scalar passed by value, in native byte order.
    Bytes(&'a [u8]),
    Buffer(MemId),
}

/// Entry points of an OpenCL implementation.
///
/// Info and enumeration calls follow the native two-phase shape: with
/// `out == None` they only report the required size (or count); with a
/// buffer they fill it. Use the typed queries in this crate rather than
/// calling them directly.
pub trait Driver: Send + Sync {
    fn platform_ids(&self, out: Option<&mut [PlatformId]>, count: &mut u32) -> Status;
    fn platform_info(
        &self,
        platform: PlatformId,
        param: u32,
        out: Option<&mut [u8]>,
        size: &mut usize,
    ) -> Status;
    fn device_ids(
        &self,
        platform: PlatformId,
        device_type: u64,
        out: Option<&mut [DeviceId]>,
        count: &mut u32,
    ) -> Status;
    fn device_info(
        &self,
        device: DeviceId,
        param: u32,
        out: Option<&mut [u8]>,
        size: &mut usize,
    ) -> Status;

    fn create_context(&self, platform: PlatformId, device: DeviceId) -> Result<ContextId, Status>;
    fn create_queue(&self, context: ContextId, device: DeviceId) -> Result<QueueId, Status>;
    fn create_program(&self, context: ContextId, source: &str) -> Result<ProgramId, Status>;
    fn build_program(&self, program: ProgramId, device: DeviceId) -> Status;
    fn program_build_info(
        &self,
        program: ProgramId,
        device: DeviceId,
        param: u32,
        out: Option<&mut [u8]>,
        size: &mut usize,
    ) -> Status;
    fn create_kernel(&self, program: ProgramId, name: &str) -> Result<KernelId, Status>;
    fn set_kernel_arg(&self, kernel: KernelId, index: u32, arg: KernelArg<'_>) -> Status;
    /// Device buffer initialized with a copy of `host`.
    fn create_buffer(&self, context: ContextId, flags: u64, host: &[u8]) -> Result<MemId, Status>;
    /// One-dimensional launch over `global_size` work-items.
    fn enqueue_kernel(&self, queue: QueueId, kernel: KernelId, global_size: usize) -> Status;
    fn finish(&self, queue: QueueId) -> Status;
    /// Blocking read of the whole buffer into `out`.
    fn read_buffer(&self, queue: QueueId, mem: MemId, out: &mut [u8]) -> Status;

    fn release_mem(&self, mem: MemId) -> Status;
    fn release_kernel(&self, kernel: KernelId) -> Status;
    fn release_program(&self, program: ProgramId) -> Status;
    fn release_queue(&self, queue: QueueId) -> Status;
    fn release_context(&self, context: ContextId) -> Status;
}
