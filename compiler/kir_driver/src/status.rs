//! OpenCL status codes and query parameters used by kir.

/// Numeric status returned by every driver entry point.
pub type Status = i32;

pub const CL_SUCCESS: Status = 0;
pub const CL_DEVICE_NOT_FOUND: Status = -1;
pub const CL_DEVICE_NOT_AVAILABLE: Status = -2;
pub const CL_OUT_OF_RESOURCES: Status = -5;
pub const CL_OUT_OF_HOST_MEMORY: Status = -6;
pub const CL_BUILD_PROGRAM_FAILURE: Status = -11;
pub const CL_INVALID_VALUE: Status = -30;
pub const CL_INVALID_PLATFORM: Status = -32;
pub const CL_INVALID_DEVICE: Status = -33;
pub const CL_INVALID_CONTEXT: Status = -34;
pub const CL_INVALID_COMMAND_QUEUE: Status = -36;
pub const CL_INVALID_MEM_OBJECT: Status = -38;
pub const CL_INVALID_PROGRAM: Status = -44;
pub const CL_INVALID_KERNEL_NAME: Status = -46;
pub const CL_INVALID_KERNEL: Status = -48;
pub const CL_INVALID_ARG_INDEX: Status = -49;
pub const CL_INVALID_ARG_VALUE: Status = -50;
pub const CL_INVALID_ARG_SIZE: Status = -51;
pub const CL_INVALID_KERNEL_ARGS: Status = -52;
pub const CL_INVALID_WORK_DIMENSION: Status = -53;
pub const CL_INVALID_GLOBAL_WORK_SIZE: Status = -63;
pub const CL_PLATFORM_NOT_FOUND_KHR: Status = -1001;

// Platform queries
pub const CL_PLATFORM_NAME: u32 = 0x0902;

// Device queries
pub const CL_DEVICE_TYPE_ALL: u64 = 0xFFFF_FFFF;
pub const CL_DEVICE_MAX_COMPUTE_UNITS: u32 = 0x1002;
pub const CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS: u32 = 0x1003;
pub const CL_DEVICE_MAX_WORK_GROUP_SIZE: u32 = 0x1004;
pub const CL_DEVICE_MAX_WORK_ITEM_SIZES: u32 = 0x1005;
pub const CL_DEVICE_MAX_CLOCK_FREQUENCY: u32 = 0x100C;
pub const CL_DEVICE_MEM_BASE_ADDR_ALIGN: u32 = 0x1019;
pub const CL_DEVICE_NAME: u32 = 0x102B;

// Contexts, programs, buffers
pub const CL_CONTEXT_PLATFORM: isize = 0x1084;
pub const CL_PROGRAM_BUILD_LOG: u32 = 0x1183;
pub const CL_MEM_READ_WRITE: u64 = 1 << 0;
pub const CL_MEM_COPY_HOST_PTR: u64 = 1 << 5;
pub const CL_TRUE: u32 = 1;

/// Symbolic name of a status, for error messages.
pub fn status_name(status: Status) -> &'static str {
    match status {
        CL_SUCCESS => "CL_SUCCESS",
        CL_DEVICE_NOT_FOUND => "CL_DEVICE_NOT_FOUND",
        CL_DEVICE_NOT_AVAILABLE => "CL_DEVICE_NOT_AVAILABLE",
        CL_OUT_OF_RESOURCES => "CL_OUT_OF_RESOURCES",
        CL_OUT_OF_HOST_MEMORY => "CL_OUT_OF_HOST_MEMORY",
        CL_BUILD_PROGRAM_FAILURE => "CL_BUILD_PROGRAM_FAILURE",
        CL_INVALID_VALUE => "CL_INVALID_VALUE",
        CL_INVALID_PLATFORM => "CL_INVALID_PLATFORM",
        CL_INVALID_DEVICE => "CL_INVALID_DEVICE",
        CL_INVALID_CONTEXT => "CL_INVALID_CONTEXT",
        CL_INVALID_COMMAND_QUEUE => "CL_INVALID_COMMAND_QUEUE",
        CL_INVALID_MEM_OBJECT => "CL_INVALID_MEM_OBJECT",
        CL_INVALID_PROGRAM => "CL_INVALID_PROGRAM",
        CL_INVALID_KERNEL_NAME => "CL_INVALID_KERNEL_NAME",
        CL_INVALID_KERNEL => "CL_INVALID_KERNEL",
        CL_INVALID_ARG_INDEX => "CL_INVALID_ARG_INDEX",
        CL_INVALID_ARG_VALUE => "CL_INVALID_ARG_VALUE",
        CL_INVALID_ARG_SIZE => "CL_INVALID_ARG_SIZE",
        CL_INVALID_KERNEL_ARGS => "CL_INVALID_KERNEL_ARGS",
        CL_INVALID_WORK_DIMENSION => "CL_INVALID_WORK_DIMENSION",
        CL_INVALID_GLOBAL_WORK_SIZE => "CL_INVALID_GLOBAL_WORK_SIZE",
        CL_PLATFORM_NOT_FOUND_KHR => "CL_PLATFORM_NOT_FOUND_KHR",
        _ => "unknown status",
    }
}
