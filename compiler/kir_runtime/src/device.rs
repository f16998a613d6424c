//! Execution on an accelerator through the driver.

use std::sync::Arc;

use kir_codegen::{generate_kernel_source, KernelSource};
use kir_driver::status::{Status, CL_MEM_COPY_HOST_PTR, CL_MEM_READ_WRITE, CL_SUCCESS};
use kir_driver::{
    build_log, check, ContextId, DeviceProperties, Driver, KernelArg, KernelId, MemId,
    PlatformId, ProgramId, QueueId,
};
use kir_ir::{KernelArgument, KernelClass, KernelType, Metadata};
use parking_lot::{Mutex, RwLock};

use crate::cache::KernelCache;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::memory::Binding;

/// A kernel compiled for the device.
pub(crate) struct DeviceProgram {
    source: KernelSource,
    program: ProgramId,
    kernel: KernelId,
    /// Arguments are state on the device kernel object, so binding and
    /// enqueueing must not interleave between launches.
    launch: Mutex<()>,
}

#[derive(Clone, Copy)]
struct Live {
    context: ContextId,
    queue: QueueId,
}

/// Runs kernels as generated programs on one device.
///
/// Work-item identity comes from the kernel language's own
/// `get_global_id`/`get_global_size`. `close` releases kernels and
/// programs, then the queue, then the device context; it runs at most
/// once, and again on drop if never called. A `close` that overlaps a
/// running `compute` waits for it to finish.
pub struct DeviceContext {
    driver: Arc<dyn Driver>,
    device: DeviceProperties,
    /// Read-held for a whole compute; `close` takes it for writing.
    live: RwLock<Option<Live>>,
    cache: KernelCache<DeviceProgram>,
}

fn native<T>(call: &'static str, result: std::result::Result<T, Status>) -> Result<T> {
    result.map_err(|status| Error::NativeCall {
        call,
        status,
        log: None,
    })
}

/// Releases device buffers when dropped, on success and failure alike.
struct Buffers<'a> {
    driver: &'a dyn Driver,
    mems: Vec<MemId>,
}

impl Drop for Buffers<'_> {
    fn drop(&mut self) {
        for mem in self.mems.drain(..) {
            let status = self.driver.release_mem(mem);
            if status != CL_SUCCESS {
                tracing::warn!(?mem, status, "releasing device buffer failed");
            }
        }
    }
}

impl DeviceContext {
    pub fn new(
        driver: Arc<dyn Driver>,
        platform: PlatformId,
        device: DeviceProperties,
    ) -> Result<Self> {
        let context = native("clCreateContext", driver.create_context(platform, device.id))?;
        let queue = match driver.create_queue(context, device.id) {
            Ok(queue) => queue,
            Err(status) => {
                driver.release_context(context);
                return Err(Error::NativeCall {
                    call: "clCreateCommandQueue",
                    status,
                    log: None,
                });
            }
        };
        tracing::debug!(device = %device.name, "created device context");
        Ok(DeviceContext {
            driver,
            device,
            live: RwLock::new(Some(Live { context, queue })),
            cache: KernelCache::new(),
        })
    }

    pub fn device(&self) -> &DeviceProperties {
        &self.device
    }

    /// Generated source for `kernel`, compiling it if needed.
    pub fn source(&self, kernel: &Arc<dyn Kernel>) -> Result<String> {
        let guard = self.live.read();
        let live = (*guard).ok_or(Error::Closed)?;
        let class = device_class(kernel.as_ref())?;
        let program = self.cache.get_or_build(kernel, || self.build(live.context, class))?;
        Ok(program.source.text.clone())
    }

    fn build(&self, context: ContextId, class: &KernelClass) -> Result<DeviceProgram> {
        // Only kernel fields are bound as arguments.
        if let Some(entry) = class.entry_method() {
            if !entry.params.is_empty() {
                return Err(Error::configuration(format!(
                    "entry method `{}` of {} takes {} parameters; device kernels take none",
                    entry.name,
                    class.name,
                    entry.params.len()
                )));
            }
        }
        let source = generate_kernel_source(class)?;
        let driver = self.driver.as_ref();
        let device = self.device.id;

        let program = native(
            "clCreateProgramWithSource",
            driver.create_program(context, &source.text),
        )?;
        let status = driver.build_program(program, device);
        if status != CL_SUCCESS {
            let log = build_log(driver, program, device).ok();
            driver.release_program(program);
            return Err(Error::NativeCall {
                call: "clBuildProgram",
                status,
                log,
            });
        }
        let kernel = match driver.create_kernel(program, &source.entry_point) {
            Ok(kernel) => kernel,
            Err(status) => {
                driver.release_program(program);
                return Err(Error::NativeCall {
                    call: "clCreateKernel",
                    status,
                    log: None,
                });
            }
        };
        tracing::debug!(class = %class.name, entry = %source.entry_point, "built device program");
        Ok(DeviceProgram {
            source,
            program,
            kernel,
            launch: Mutex::new(()),
        })
    }

    fn launch(
        &self,
        live: Live,
        program: &DeviceProgram,
        bindings: &[Binding],
        n: usize,
    ) -> Result<()> {
        let driver = self.driver.as_ref();
        let _launch = program.launch.lock();
        let mut buffers = Buffers {
            driver,
            mems: Vec::new(),
        };
        // (binding index, buffer, byte length) for every array argument.
        let mut outputs = Vec::new();

        for (index, binding) in bindings.iter().enumerate() {
            let arg_index = u32::try_from(index).map_err(|_| {
                Error::configuration(format!("kernel argument {index} out of range"))
            })?;
            let bytes = binding.to_bytes();
            let status = if binding.is_array() {
                let mem = native(
                    "clCreateBuffer",
                    driver.create_buffer(
                        live.context,
                        CL_MEM_READ_WRITE | CL_MEM_COPY_HOST_PTR,
                        &bytes,
                    ),
                )?;
                buffers.mems.push(mem);
                outputs.push((index, mem, bytes.len()));
                driver.set_kernel_arg(program.kernel, arg_index, KernelArg::Buffer(mem))
            } else {
                driver.set_kernel_arg(program.kernel, arg_index, KernelArg::Bytes(&bytes))
            };
            check("clSetKernelArg", status)?;
        }

        check(
            "clEnqueueNDRangeKernel",
            driver.enqueue_kernel(live.queue, program.kernel, n),
        )?;
        check("clFinish", driver.finish(live.queue))?;

        for (index, mem, len) in outputs {
            let mut bytes = vec![0u8; len];
            check("clEnqueueReadBuffer", driver.read_buffer(live.queue, mem, &mut bytes))?;
            bindings[index].read_back(&bytes)?;
        }
        Ok(())
    }
}

fn device_class(kernel: &dyn Kernel) -> Result<&KernelClass> {
    kernel.class().ok_or_else(|| {
        Error::configuration("kernel has no analyzed class and cannot run on a device")
    })
}

/// Lanes per element when `element` is a vector type of floats.
fn vector_lanes(element: &KernelType, metadata: &Metadata) -> Option<u32> {
    match element {
        KernelType::Object(class) => metadata.type_info(class)?.element_count,
        _ => None,
    }
}

/// Check that `bindings` fit the generated kernel parameters.
fn check_bindings(
    arguments: &[KernelArgument],
    bindings: &[Binding],
    metadata: &Metadata,
) -> Result<()> {
    if arguments.len() != bindings.len() {
        return Err(Error::configuration(format!(
            "kernel declares {} fields but {} bindings were supplied",
            arguments.len(),
            bindings.len()
        )));
    }
    for (argument, binding) in arguments.iter().zip(bindings) {
        let fits = match (&argument.ty, binding) {
            (KernelType::Int, Binding::Int(_))
            | (KernelType::Long, Binding::Long(_))
            | (KernelType::Float, Binding::Float(_))
            | (KernelType::Double, Binding::Double(_)) => true,
            (KernelType::Array(element), Binding::IntArray(_)) => **element == KernelType::Int,
            (KernelType::Array(element), Binding::LongArray(_)) => **element == KernelType::Long,
            (KernelType::Array(element), Binding::DoubleArray(_)) => {
                **element == KernelType::Double
            }
            (KernelType::Array(element), Binding::FloatArray(array)) => {
                match vector_lanes(element, metadata) {
                    Some(lanes) if lanes > 0 => array.len() % lanes as usize == 0,
                    _ => **element == KernelType::Float,
                }
            }
            _ => false,
        };
        if !fits {
            return Err(Error::configuration(format!(
                "field `{}` of type {:?} cannot be bound to a {} value",
                argument.name,
                argument.ty,
                binding.type_name()
            )));
        }
        if binding.array_len() == Some(0) {
            return Err(Error::configuration(format!(
                "field `{}` is bound to an empty array",
                argument.name
            )));
        }
    }
    Ok(())
}

impl Context for DeviceContext {
    fn compute(&self, n: usize, kernel: &Arc<dyn Kernel>) -> Result<()> {
        let guard = self.live.read();
        let live = (*guard).ok_or(Error::Closed)?;
        let class = device_class(kernel.as_ref())?;
        let program = self.cache.get_or_build(kernel, || self.build(live.context, class))?;
        if n == 0 {
            return Ok(());
        }
        let bindings = kernel.bindings();
        check_bindings(&program.source.arguments, &bindings, &class.metadata)?;
        tracing::trace!(work_items = n, entry = %program.source.entry_point, "device compute");
        self.launch(live, &program, &bindings, n)
    }

    fn close(&self) -> Result<()> {
        let Some(live) = self.live.write().take() else {
            return Ok(());
        };
        let driver = self.driver.as_ref();
        let mut first = Ok(());
        let mut record = |call: &'static str, status: Status| {
            if status != CL_SUCCESS {
                tracing::warn!(call, status, "device release failed");
                if first.is_ok() {
                    first = check(call, status).map_err(Error::from);
                }
            }
        };
        let programs = self.cache.drain();
        for program in &programs {
            record("clReleaseKernel", driver.release_kernel(program.kernel));
            record("clReleaseProgram", driver.release_program(program.program));
        }
        record("clReleaseCommandQueue", driver.release_queue(live.queue));
        record("clReleaseContext", driver.release_context(live.context));
        tracing::debug!(
            device = %self.device.name,
            programs = programs.len(),
            "closed device context"
        );
        first
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(%err, "closing device context on drop failed");
        }
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
