//! [`Driver`] over the vendor OpenCL library, resolved at run time.

use std::ffi::{c_char, c_void, CString};
use std::path::{Path, PathBuf};
use std::ptr;

use crate::api::{
    ContextId, DeviceId, Driver, KernelArg, KernelId, MemId, PlatformId, ProgramId, QueueId,
};
use crate::error::DriverError;
use crate::status::{Status, CL_CONTEXT_PLATFORM, CL_INVALID_VALUE, CL_SUCCESS, CL_TRUE};

type Handle = *mut c_void;
type Notify = Option<unsafe extern "system" fn()>;

type GetPlatformIds = unsafe extern "system" fn(u32, *mut Handle, *mut u32) -> Status;
type GetInfo = unsafe extern "system" fn(Handle, u32, usize, *mut c_void, *mut usize) -> Status;
type GetDeviceIds =
    unsafe extern "system" fn(Handle, u64, u32, *mut Handle, *mut u32) -> Status;
type CreateContext = unsafe extern "system" fn(
    *const isize,
    u32,
    *const Handle,
    Notify,
    *mut c_void,
    *mut Status,
) -> Handle;
type CreateQueue = unsafe extern "system" fn(Handle, Handle, u64, *mut Status) -> Handle;
type CreateProgram = unsafe extern "system" fn(
    Handle,
    u32,
    *const *const c_char,
    *const usize,
    *mut Status,
) -> Handle;
type BuildProgram = unsafe extern "system" fn(
    Handle,
    u32,
    *const Handle,
    *const c_char,
    Notify,
    *mut c_void,
) -> Status;
type GetBuildInfo =
    unsafe extern "system" fn(Handle, Handle, u32, usize, *mut c_void, *mut usize) -> Status;
type CreateKernel = unsafe extern "system" fn(Handle, *const c_char, *mut Status) -> Handle;
type SetKernelArg = unsafe extern "system" fn(Handle, u32, usize, *const c_void) -> Status;
type CreateBuffer =
    unsafe extern "system" fn(Handle, u64, usize, *mut c_void, *mut Status) -> Handle;
type EnqueueNdRange = unsafe extern "system" fn(
    Handle,
    Handle,
    u32,
    *const usize,
    *const usize,
    *const usize,
    u32,
    *const Handle,
    *mut Handle,
) -> Status;
type EnqueueRead = unsafe extern "system" fn(
    Handle,
    Handle,
    u32,
    usize,
    usize,
    *mut c_void,
    u32,
    *const Handle,
    *mut Handle,
) -> Status;
type Single = unsafe extern "system" fn(Handle) -> Status;

struct Functions {
    get_platform_ids: GetPlatformIds,
    get_platform_info: GetInfo,
    get_device_ids: GetDeviceIds,
    get_device_info: GetInfo,
    create_context: CreateContext,
    create_queue: CreateQueue,
    create_program: CreateProgram,
    build_program: BuildProgram,
    get_build_info: GetBuildInfo,
    create_kernel: CreateKernel,
    set_kernel_arg: SetKernelArg,
    create_buffer: CreateBuffer,
    enqueue_nd_range: EnqueueNdRange,
    finish: Single,
    enqueue_read: EnqueueRead,
    release_mem: Single,
    release_kernel: Single,
    release_program: Single,
    release_queue: Single,
    release_context: Single,
}

/// The loaded vendor library.
///
/// Function pointers stay valid for as long as `_library` is alive,
/// which is the lifetime of this value.
pub struct OpenCl {
    path: PathBuf,
    fns: Functions,
    _library: libloading::Library,
}

/// Library names tried, in order, when no explicit path is configured.
pub fn default_library_candidates() -> Vec<PathBuf> {
    let names: &[&str] = if cfg!(target_os = "windows") {
        &["OpenCL.dll"]
    } else if cfg!(target_os = "macos") {
        &["/System/Library/Frameworks/OpenCL.framework/OpenCL"]
    } else {
        &["libOpenCL.so.1", "libOpenCL.so"]
    };
    names.iter().map(PathBuf::from).collect()
}

macro_rules! resolve {
    ($library:expr, $path:expr, $symbol:literal: $ty:ty) => {{
        // SAFETY: the symbol is an OpenCL 1.2 entry point and `$ty` is its
        // C signature.
        let symbol = unsafe { $library.get::<$ty>(concat!($symbol, "\0").as_bytes()) }
            .map_err(|_| DriverError::MissingSymbol {
                library: $path.display().to_string(),
                symbol: $symbol,
            })?;
        *symbol
    }};
}

impl OpenCl {
    /// Load `path`, or the first loadable default candidate.
    pub fn load(path: Option<&Path>) -> Result<Self, DriverError> {
        let candidates = match path {
            Some(path) => vec![path.to_path_buf()],
            None => default_library_candidates(),
        };
        let mut tried = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            // SAFETY: loading runs the library's initializers; OpenCL ICD
            // loaders have no load-time preconditions.
            match unsafe { libloading::Library::new(&candidate) } {
                Ok(library) => return Self::bind(candidate, library),
                Err(err) => {
                    tracing::debug!(library = %candidate.display(), %err, "OpenCL library not loadable");
                    tried.push(candidate.display().to_string());
                }
            }
        }
        Err(DriverError::LibraryUnavailable { tried })
    }

    fn bind(path: PathBuf, library: libloading::Library) -> Result<Self, DriverError> {
        let fns = Functions {
            get_platform_ids: resolve!(library, path, "clGetPlatformIDs": GetPlatformIds),
            get_platform_info: resolve!(library, path, "clGetPlatformInfo": GetInfo),
            get_device_ids: resolve!(library, path, "clGetDeviceIDs": GetDeviceIds),
            get_device_info: resolve!(library, path, "clGetDeviceInfo": GetInfo),
            create_context: resolve!(library, path, "clCreateContext": CreateContext),
            create_queue: resolve!(library, path, "clCreateCommandQueue": CreateQueue),
            create_program: resolve!(library, path, "clCreateProgramWithSource": CreateProgram),
            build_program: resolve!(library, path, "clBuildProgram": BuildProgram),
            get_build_info: resolve!(library, path, "clGetProgramBuildInfo": GetBuildInfo),
            create_kernel: resolve!(library, path, "clCreateKernel": CreateKernel),
            set_kernel_arg: resolve!(library, path, "clSetKernelArg": SetKernelArg),
            create_buffer: resolve!(library, path, "clCreateBuffer": CreateBuffer),
            enqueue_nd_range: resolve!(library, path, "clEnqueueNDRangeKernel": EnqueueNdRange),
            finish: resolve!(library, path, "clFinish": Single),
            enqueue_read: resolve!(library, path, "clEnqueueReadBuffer": EnqueueRead),
            release_mem: resolve!(library, path, "clReleaseMemObject": Single),
            release_kernel: resolve!(library, path, "clReleaseKernel": Single),
            release_program: resolve!(library, path, "clReleaseProgram": Single),
            release_queue: resolve!(library, path, "clReleaseCommandQueue": Single),
            release_context: resolve!(library, path, "clReleaseContext": Single),
        };
        tracing::debug!(library = %path.display(), "loaded OpenCL library");
        Ok(OpenCl {
            path,
            fns,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for OpenCl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenCl").field("path", &self.path).finish_non_exhaustive()
    }
}

fn handle(raw: usize) -> Handle {
    raw as Handle
}

fn created(raw: Handle, status: Status) -> Result<usize, Status> {
    if status == CL_SUCCESS && !raw.is_null() {
        Ok(raw as usize)
    } else if status == CL_SUCCESS {
        Err(CL_INVALID_VALUE)
    } else {
        Err(status)
    }
}

/// Split an optional output slice into the (capacity, pointer) pair the
/// native calls take.
fn out_parts<T>(out: Option<&mut [T]>) -> (usize, *mut T) {
    match out {
        Some(out) => (out.len(), out.as_mut_ptr()),
        None => (0, ptr::null_mut()),
    }
}

fn entries(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

// SAFETY (whole impl): every handle passed in was produced by this library,
// and every pointer/length pair describes a live Rust slice for the
// duration of the call.
impl Driver for OpenCl {
    fn platform_ids(&self, out: Option<&mut [PlatformId]>, count: &mut u32) -> Status {
        // PlatformId is repr(transparent) over usize, the width of a handle.
        let (len, data) = out_parts(out);
        unsafe { (self.fns.get_platform_ids)(entries(len), data.cast::<Handle>(), count) }
    }

    fn platform_info(
        &self,
        platform: PlatformId,
        param: u32,
        out: Option<&mut [u8]>,
        size: &mut usize,
    ) -> Status {
        let (len, data) = out_parts(out);
        unsafe {
            (self.fns.get_platform_info)(handle(platform.raw()), param, len, data.cast(), size)
        }
    }

    fn device_ids(
        &self,
        platform: PlatformId,
        device_type: u64,
        out: Option<&mut [DeviceId]>,
        count: &mut u32,
    ) -> Status {
        let (len, data) = out_parts(out);
        unsafe {
            (self.fns.get_device_ids)(
                handle(platform.raw()),
                device_type,
                entries(len),
                data.cast::<Handle>(),
                count,
            )
        }
    }

    fn device_info(
        &self,
        device: DeviceId,
        param: u32,
        out: Option<&mut [u8]>,
        size: &mut usize,
    ) -> Status {
        let (len, data) = out_parts(out);
        unsafe { (self.fns.get_device_info)(handle(device.raw()), param, len, data.cast(), size) }
    }

    fn create_context(&self, platform: PlatformId, device: DeviceId) -> Result<ContextId, Status> {
        let properties = [CL_CONTEXT_PLATFORM, platform.raw() as isize, 0];
        let devices = [handle(device.raw())];
        let mut status = CL_SUCCESS;
        let raw = unsafe {
            (self.fns.create_context)(
                properties.as_ptr(),
                1,
                devices.as_ptr(),
                None,
                ptr::null_mut(),
                &mut status,
            )
        };
        created(raw, status).map(ContextId::new)
    }

    fn create_queue(&self, context: ContextId, device: DeviceId) -> Result<QueueId, Status> {
        let mut status = CL_SUCCESS;
        let raw = unsafe {
            (self.fns.create_queue)(handle(context.raw()), handle(device.raw()), 0, &mut status)
        };
        created(raw, status).map(QueueId::new)
    }

    fn create_program(&self, context: ContextId, source: &str) -> Result<ProgramId, Status> {
        let strings = [source.as_ptr().cast::<c_char>()];
        let lengths = [source.len()];
        let mut status = CL_SUCCESS;
        let raw = unsafe {
            (self.fns.create_program)(
                handle(context.raw()),
                1,
                strings.as_ptr(),
                lengths.as_ptr(),
                &mut status,
            )
        };
        created(raw, status).map(ProgramId::new)
    }

    fn build_program(&self, program: ProgramId, device: DeviceId) -> Status {
        let devices = [handle(device.raw())];
        unsafe {
            (self.fns.build_program)(
                handle(program.raw()),
                1,
                devices.as_ptr(),
                ptr::null(),
                None,
                ptr::null_mut(),
            )
        }
    }

    fn program_build_info(
        &self,
        program: ProgramId,
        device: DeviceId,
        param: u32,
        out: Option<&mut [u8]>,
        size: &mut usize,
    ) -> Status {
        let (len, data) = out_parts(out);
        unsafe {
            (self.fns.get_build_info)(
                handle(program.raw()),
                handle(device.raw()),
                param,
                len,
                data.cast(),
                size,
            )
        }
    }

    fn create_kernel(&self, program: ProgramId, name: &str) -> Result<KernelId, Status> {
        let name = CString::new(name).map_err(|_| CL_INVALID_VALUE)?;
        let mut status = CL_SUCCESS;
        let raw =
            unsafe { (self.fns.create_kernel)(handle(program.raw()), name.as_ptr(), &mut status) };
        created(raw, status).map(KernelId::new)
    }

    fn set_kernel_arg(&self, kernel: KernelId, index: u32, arg: KernelArg<'_>) -> Status {
        match arg {
            KernelArg::Bytes(bytes) => unsafe {
                (self.fns.set_kernel_arg)(
                    handle(kernel.raw()),
                    index,
                    bytes.len(),
                    bytes.as_ptr().cast(),
                )
            },
            KernelArg::Buffer(mem) => {
                let value = handle(mem.raw());
                unsafe {
                    (self.fns.set_kernel_arg)(
                        handle(kernel.raw()),
                        index,
                        std::mem::size_of::<Handle>(),
                        ptr::addr_of!(value).cast(),
                    )
                }
            }
        }
    }

    fn create_buffer(&self, context: ContextId, flags: u64, host: &[u8]) -> Result<MemId, Status> {
        let mut status = CL_SUCCESS;
        // COPY_HOST_PTR only reads through the pointer.
        let raw = unsafe {
            (self.fns.create_buffer)(
                handle(context.raw()),
                flags,
                host.len(),
                host.as_ptr().cast_mut().cast(),
                &mut status,
            )
        };
        created(raw, status).map(MemId::new)
    }

    fn enqueue_kernel(&self, queue: QueueId, kernel: KernelId, global_size: usize) -> Status {
        let global = [global_size];
        unsafe {
            (self.fns.enqueue_nd_range)(
                handle(queue.raw()),
                handle(kernel.raw()),
                1,
                ptr::null(),
                global.as_ptr(),
                ptr::null(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        }
    }

    fn finish(&self, queue: QueueId) -> Status {
        unsafe { (self.fns.finish)(handle(queue.raw())) }
    }

    fn read_buffer(&self, queue: QueueId, mem: MemId, out: &mut [u8]) -> Status {
        unsafe {
            (self.fns.enqueue_read)(
                handle(queue.raw()),
                handle(mem.raw()),
                CL_TRUE,
                0,
                out.len(),
                out.as_mut_ptr().cast(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        }
    }

    fn release_mem(&self, mem: MemId) -> Status {
        unsafe { (self.fns.release_mem)(handle(mem.raw())) }
    }

    fn release_kernel(&self, kernel: KernelId) -> Status {
        unsafe { (self.fns.release_kernel)(handle(kernel.raw())) }
    }

    fn release_program(&self, program: ProgramId) -> Status {
        unsafe { (self.fns.release_program)(handle(program.raw())) }
    }

    fn release_queue(&self, queue: QueueId) -> Status {
        unsafe { (self.fns.release_queue)(handle(queue.raw())) }
    }

    fn release_context(&self, context: ContextId) -> Status {
        unsafe { (self.fns.release_context)(handle(context.raw())) }
    }
}
