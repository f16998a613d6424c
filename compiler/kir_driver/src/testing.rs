//! In-memory [`Driver`] for tests.
//!
//! [`ScriptedDriver`] reports the platforms and devices it is built with,
//! keeps buffers as byte vectors, and records every program source, build
//! and launch. A launch hook stands in for the device: it sees the bound
//! arguments and may rewrite buffer contents. Any entry point can be made
//! to fail by name with [`ScriptedDriver::fail`].

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::api::{
    ContextId, DeviceId, Driver, KernelArg, KernelId, MemId, PlatformId, ProgramId, QueueId,
};
use crate::status::{
    Status, CL_BUILD_PROGRAM_FAILURE, CL_DEVICE_MAX_CLOCK_FREQUENCY, CL_DEVICE_MAX_COMPUTE_UNITS,
    CL_DEVICE_MAX_WORK_GROUP_SIZE, CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS,
    CL_DEVICE_MAX_WORK_ITEM_SIZES, CL_DEVICE_MEM_BASE_ADDR_ALIGN, CL_DEVICE_NAME,
    CL_DEVICE_NOT_FOUND, CL_INVALID_COMMAND_QUEUE, CL_INVALID_CONTEXT,
    CL_INVALID_DEVICE, CL_INVALID_KERNEL, CL_INVALID_KERNEL_ARGS, CL_INVALID_KERNEL_NAME,
    CL_INVALID_MEM_OBJECT, CL_INVALID_PLATFORM, CL_INVALID_PROGRAM, CL_INVALID_VALUE,
    CL_PLATFORM_NAME, CL_PLATFORM_NOT_FOUND_KHR, CL_PROGRAM_BUILD_LOG, CL_SUCCESS,
};

/// A device as the scripted driver reports it.
#[derive(Clone, Debug)]
pub struct FakeDevice {
    pub name: String,
    pub compute_units: u32,
    pub max_work_item_dimensions: u32,
    pub max_work_item_sizes: Vec<usize>,
    pub max_work_group_size: usize,
    pub clock_frequency_mhz: u32,
    /// In bits, as the native query reports it.
    pub base_addr_align_bits: u32,
}

impl FakeDevice {
    pub fn new(name: &str) -> Self {
        FakeDevice {
            name: name.to_owned(),
            compute_units: 1,
            max_work_item_dimensions: 3,
            max_work_item_sizes: vec![1024, 1024, 64],
            max_work_group_size: 1024,
            clock_frequency_mhz: 1000,
            base_addr_align_bits: 1024,
        }
    }

    #[must_use]
    pub fn compute_units(mut self, units: u32) -> Self {
        self.compute_units = units;
        self
    }

    #[must_use]
    pub fn clock(mut self, mhz: u32) -> Self {
        self.clock_frequency_mhz = mhz;
        self
    }
}

#[derive(Clone, Debug)]
pub struct FakePlatform {
    pub name: String,
    pub devices: Vec<FakeDevice>,
}

impl FakePlatform {
    pub fn new(name: &str) -> Self {
        FakePlatform {
            name: name.to_owned(),
            devices: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_device(mut self, device: FakeDevice) -> Self {
        self.devices.push(device);
        self
    }
}

/// An argument as bound at launch time.
#[derive(Clone, Debug, PartialEq)]
pub enum LaunchArg {
    Bytes(Vec<u8>),
    /// Contents of the bound buffer. Changes made by the launch hook are
    /// written back to the buffer.
    Buffer(Vec<u8>),
}

impl LaunchArg {
    /// The bytes, whichever kind of argument this is.
    pub fn bytes(&self) -> &[u8] {
        match self {
            LaunchArg::Bytes(bytes) | LaunchArg::Buffer(bytes) => bytes,
        }
    }

    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        match self {
            LaunchArg::Bytes(bytes) | LaunchArg::Buffer(bytes) => bytes,
        }
    }
}

/// One recorded kernel launch, with arguments as they were before the hook ran.
#[derive(Clone, Debug, PartialEq)]
pub struct Launch {
    pub kernel: String,
    pub global_size: usize,
    pub args: Vec<LaunchArg>,
}

pub type LaunchHook = dyn Fn(&str, usize, &mut [LaunchArg]) + Send + Sync;

#[derive(Clone, Copy)]
enum Bound {
    Bytes(usize),
    Buffer(MemId),
}

struct ProgramState {
    source: String,
    built: bool,
}

struct KernelState {
    name: String,
    args: BTreeMap<u32, Bound>,
}

#[derive(Default)]
struct State {
    next_handle: usize,
    platforms: Vec<(PlatformId, String, Vec<DeviceId>)>,
    devices: FxHashMap<DeviceId, FakeDevice>,
    contexts: FxHashSet<ContextId>,
    queues: FxHashSet<QueueId>,
    programs: FxHashMap<ProgramId, ProgramState>,
    kernels: FxHashMap<KernelId, KernelState>,
    buffers: FxHashMap<MemId, Vec<u8>>,
    /// Scalar argument bytes, referenced by `Bound::Bytes`.
    scalars: Vec<Vec<u8>>,
    failures: FxHashMap<&'static str, Status>,
    build_log: Option<String>,
    hook: Option<Arc<LaunchHook>>,
    sources: Vec<String>,
    builds: usize,
    launches: Vec<Launch>,
    released: Vec<&'static str>,
}

impl State {
    fn fresh(&mut self) -> usize {
        self.next_handle += 1;
        0x1000 + self.next_handle
    }

    fn failure(&self, call: &'static str) -> Option<Status> {
        self.failures.get(call).copied()
    }
}

/// Scripted in-memory driver.
pub struct ScriptedDriver {
    state: Mutex<State>,
}

impl ScriptedDriver {
    pub fn new(platforms: Vec<FakePlatform>) -> Self {
        let mut state = State::default();
        for platform in platforms {
            let platform_id = PlatformId::new(state.fresh());
            let mut device_ids = Vec::with_capacity(platform.devices.len());
            for device in platform.devices {
                let id = DeviceId::new(state.fresh());
                state.devices.insert(id, device);
                device_ids.push(id);
            }
            state.platforms.push((platform_id, platform.name, device_ids));
        }
        ScriptedDriver {
            state: Mutex::new(state),
        }
    }

    /// One platform with one device.
    pub fn single(platform: &str, device: &str) -> Self {
        Self::new(vec![
            FakePlatform::new(platform).with_device(FakeDevice::new(device))
        ])
    }

    /// Make `call` (native entry point name, e.g. `"clCreateKernel"`)
    /// return `status` from now on.
    pub fn fail(&self, call: &'static str, status: Status) {
        self.state.lock().failures.insert(call, status);
    }

    /// Make every build fail with `log` as the build log.
    pub fn fail_build(&self, log: &str) {
        let mut state = self.state.lock();
        state.failures.insert("clBuildProgram", CL_BUILD_PROGRAM_FAILURE);
        state.build_log = Some(log.to_owned());
    }

    pub fn on_launch(&self, hook: impl Fn(&str, usize, &mut [LaunchArg]) + Send + Sync + 'static) {
        self.state.lock().hook = Some(Arc::new(hook));
    }

    pub fn sources(&self) -> Vec<String> {
        self.state.lock().sources.clone()
    }

    pub fn builds(&self) -> usize {
        self.state.lock().builds
    }

    pub fn launches(&self) -> Vec<Launch> {
        self.state.lock().launches.clone()
    }

    /// Kinds of released objects (`"mem"`, `"kernel"`, ...), in release order.
    pub fn released(&self) -> Vec<&'static str> {
        self.state.lock().released.clone()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Contexts, queues, programs, kernels and buffers not yet released.
    pub fn live_objects(&self) -> usize {
        let state = self.state.lock();
        state.contexts.len()
            + state.queues.len()
            + state.programs.len()
            + state.kernels.len()
            + state.buffers.len()
    }
}

/// Two-phase copy-out of `value`.
fn answer<T: Copy>(value: &[T], out: Option<&mut [T]>, size: &mut usize) -> Status {
    *size = value.len();
    match out {
        None => CL_SUCCESS,
        Some(out) if out.len() < value.len() => CL_INVALID_VALUE,
        Some(out) => {
            out[..value.len()].copy_from_slice(value);
            CL_SUCCESS
        }
    }
}

fn answer_counted<T: Copy>(value: &[T], out: Option<&mut [T]>, count: &mut u32) -> Status {
    let mut len = 0;
    let status = answer(value, out, &mut len);
    *count = u32::try_from(len).unwrap_or(u32::MAX);
    status
}

fn c_string(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

fn device_bytes(device: &FakeDevice, param: u32) -> Option<Vec<u8>> {
    let bytes = match param {
        CL_DEVICE_NAME => c_string(&device.name),
        CL_DEVICE_MAX_COMPUTE_UNITS => device.compute_units.to_ne_bytes().to_vec(),
        CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS => device.max_work_item_dimensions.to_ne_bytes().to_vec(),
        CL_DEVICE_MAX_WORK_ITEM_SIZES => device
            .max_work_item_sizes
            .iter()
            .flat_map(|size| size.to_ne_bytes())
            .collect(),
        CL_DEVICE_MAX_WORK_GROUP_SIZE => device.max_work_group_size.to_ne_bytes().to_vec(),
        CL_DEVICE_MAX_CLOCK_FREQUENCY => device.clock_frequency_mhz.to_ne_bytes().to_vec(),
        CL_DEVICE_MEM_BASE_ADDR_ALIGN => device.base_addr_align_bits.to_ne_bytes().to_vec(),
        _ => return None,
    };
    Some(bytes)
}

impl Driver for ScriptedDriver {
    fn platform_ids(&self, out: Option<&mut [PlatformId]>, count: &mut u32) -> Status {
        let state = self.state.lock();
        if let Some(status) = state.failure("clGetPlatformIDs") {
            return status;
        }
        if state.platforms.is_empty() {
            *count = 0;
            return CL_PLATFORM_NOT_FOUND_KHR;
        }
        let ids: Vec<PlatformId> = state.platforms.iter().map(|(id, _, _)| *id).collect();
        answer_counted(&ids, out, count)
    }

    fn platform_info(
        &self,
        platform: PlatformId,
        param: u32,
        out: Option<&mut [u8]>,
        size: &mut usize,
    ) -> Status {
        let state = self.state.lock();
        if let Some(status) = state.failure("clGetPlatformInfo") {
            return status;
        }
        let Some((_, name, _)) = state.platforms.iter().find(|(id, _, _)| *id == platform) else {
            return CL_INVALID_PLATFORM;
        };
        if param != CL_PLATFORM_NAME {
            return CL_INVALID_VALUE;
        }
        answer(&c_string(name), out, size)
    }

    fn device_ids(
        &self,
        platform: PlatformId,
        _device_type: u64,
        out: Option<&mut [DeviceId]>,
        count: &mut u32,
    ) -> Status {
        let state = self.state.lock();
        if let Some(status) = state.failure("clGetDeviceIDs") {
            return status;
        }
        let Some((_, _, devices)) = state.platforms.iter().find(|(id, _, _)| *id == platform)
        else {
            return CL_INVALID_PLATFORM;
        };
        if devices.is_empty() {
            *count = 0;
            return CL_DEVICE_NOT_FOUND;
        }
        answer_counted(devices, out, count)
    }

    fn device_info(
        &self,
        device: DeviceId,
        param: u32,
        out: Option<&mut [u8]>,
        size: &mut usize,
    ) -> Status {
        let state = self.state.lock();
        if let Some(status) = state.failure("clGetDeviceInfo") {
            return status;
        }
        let Some(device) = state.devices.get(&device) else {
            return CL_INVALID_DEVICE;
        };
        match device_bytes(device, param) {
            Some(bytes) => answer(&bytes, out, size),
            None => CL_INVALID_VALUE,
        }
    }

    fn create_context(&self, platform: PlatformId, device: DeviceId) -> Result<ContextId, Status> {
        let mut state = self.state.lock();
        if let Some(status) = state.failure("clCreateContext") {
            return Err(status);
        }
        let owned = state
            .platforms
            .iter()
            .any(|(id, _, devices)| *id == platform && devices.contains(&device));
        if !owned {
            return Err(CL_INVALID_DEVICE);
        }
        let id = ContextId::new(state.fresh());
        state.contexts.insert(id);
        Ok(id)
    }

    fn create_queue(&self, context: ContextId, device: DeviceId) -> Result<QueueId, Status> {
        let mut state = self.state.lock();
        if let Some(status) = state.failure("clCreateCommandQueue") {
            return Err(status);
        }
        if !state.contexts.contains(&context) {
            return Err(CL_INVALID_CONTEXT);
        }
        if !state.devices.contains_key(&device) {
            return Err(CL_INVALID_DEVICE);
        }
        let id = QueueId::new(state.fresh());
        state.queues.insert(id);
        Ok(id)
    }

    fn create_program(&self, context: ContextId, source: &str) -> Result<ProgramId, Status> {
        let mut state = self.state.lock();
        if let Some(status) = state.failure("clCreateProgramWithSource") {
            return Err(status);
        }
        if !state.contexts.contains(&context) {
            return Err(CL_INVALID_CONTEXT);
        }
        let id = ProgramId::new(state.fresh());
        state.sources.push(source.to_owned());
        state.programs.insert(
            id,
            ProgramState {
                source: source.to_owned(),
                built: false,
            },
        );
        Ok(id)
    }

    fn build_program(&self, program: ProgramId, _device: DeviceId) -> Status {
        let mut state = self.state.lock();
        state.builds += 1;
        if let Some(status) = state.failure("clBuildProgram") {
            return status;
        }
        match state.programs.get_mut(&program) {
            Some(program) => {
                program.built = true;
                CL_SUCCESS
            }
            None => CL_INVALID_PROGRAM,
        }
    }

    fn program_build_info(
        &self,
        program: ProgramId,
        _device: DeviceId,
        param: u32,
        out: Option<&mut [u8]>,
        size: &mut usize,
    ) -> Status {
        let state = self.state.lock();
        if let Some(status) = state.failure("clGetProgramBuildInfo") {
            return status;
        }
        if !state.programs.contains_key(&program) {
            return CL_INVALID_PROGRAM;
        }
        if param != CL_PROGRAM_BUILD_LOG {
            return CL_INVALID_VALUE;
        }
        let log = state.build_log.as_deref().unwrap_or("");
        answer(&c_string(log), out, size)
    }

    fn create_kernel(&self, program: ProgramId, name: &str) -> Result<KernelId, Status> {
        let mut state = self.state.lock();
        if let Some(status) = state.failure("clCreateKernel") {
            return Err(status);
        }
        let Some(program) = state.programs.get(&program) else {
            return Err(CL_INVALID_PROGRAM);
        };
        if !program.built {
            return Err(CL_INVALID_PROGRAM);
        }
        if !program.source.contains(&format!("__kernel void {name}(")) {
            return Err(CL_INVALID_KERNEL_NAME);
        }
        let id = KernelId::new(state.fresh());
        state.kernels.insert(
            id,
            KernelState {
                name: name.to_owned(),
                args: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    fn set_kernel_arg(&self, kernel: KernelId, index: u32, arg: KernelArg<'_>) -> Status {
        let mut state = self.state.lock();
        if let Some(status) = state.failure("clSetKernelArg") {
            return status;
        }
        let bound = match arg {
            KernelArg::Bytes(bytes) => {
                state.scalars.push(bytes.to_vec());
                Bound::Bytes(state.scalars.len() - 1)
            }
            KernelArg::Buffer(mem) => {
                if !state.buffers.contains_key(&mem) {
                    return CL_INVALID_MEM_OBJECT;
                }
                Bound::Buffer(mem)
            }
        };
        match state.kernels.get_mut(&kernel) {
            Some(kernel) => {
                kernel.args.insert(index, bound);
                CL_SUCCESS
            }
            None => CL_INVALID_KERNEL,
        }
    }

    fn create_buffer(&self, context: ContextId, _flags: u64, host: &[u8]) -> Result<MemId, Status> {
        let mut state = self.state.lock();
        if let Some(status) = state.failure("clCreateBuffer") {
            return Err(status);
        }
        if !state.contexts.contains(&context) {
            return Err(CL_INVALID_CONTEXT);
        }
        let id = MemId::new(state.fresh());
        state.buffers.insert(id, host.to_vec());
        Ok(id)
    }

    fn enqueue_kernel(&self, queue: QueueId, kernel: KernelId, global_size: usize) -> Status {
        let (name, bound, mut args, hook) = {
            let state = self.state.lock();
            if let Some(status) = state.failure("clEnqueueNDRangeKernel") {
                return status;
            }
            if !state.queues.contains(&queue) {
                return CL_INVALID_COMMAND_QUEUE;
            }
            let Some(kernel) = state.kernels.get(&kernel) else {
                return CL_INVALID_KERNEL;
            };
            // Arguments must be bound densely from index 0.
            let dense = kernel
                .args
                .keys()
                .enumerate()
                .all(|(position, index)| *index as usize == position);
            if !dense {
                return CL_INVALID_KERNEL_ARGS;
            }
            let bound: Vec<Bound> = kernel.args.values().copied().collect();
            let mut args = Vec::with_capacity(bound.len());
            for arg in &bound {
                args.push(match *arg {
                    Bound::Bytes(slot) => LaunchArg::Bytes(state.scalars[slot].clone()),
                    Bound::Buffer(mem) => match state.buffers.get(&mem) {
                        Some(bytes) => LaunchArg::Buffer(bytes.clone()),
                        None => return CL_INVALID_MEM_OBJECT,
                    },
                });
            }
            (kernel.name.clone(), bound, args, state.hook.clone())
        };

        let launch = Launch {
            kernel: name.clone(),
            global_size,
            args: args.clone(),
        };
        if let Some(hook) = hook {
            hook(&name, global_size, &mut args);
        }

        let mut state = self.state.lock();
        for (arg, value) in bound.iter().zip(args) {
            if let (Bound::Buffer(mem), LaunchArg::Buffer(bytes)) = (arg, value) {
                if let Some(buffer) = state.buffers.get_mut(mem) {
                    *buffer = bytes;
                }
            }
        }
        state.launches.push(launch);
        CL_SUCCESS
    }

    fn finish(&self, queue: QueueId) -> Status {
        let state = self.state.lock();
        if let Some(status) = state.failure("clFinish") {
            return status;
        }
        if state.queues.contains(&queue) {
            CL_SUCCESS
        } else {
            CL_INVALID_COMMAND_QUEUE
        }
    }

    fn read_buffer(&self, queue: QueueId, mem: MemId, out: &mut [u8]) -> Status {
        let state = self.state.lock();
        if let Some(status) = state.failure("clEnqueueReadBuffer") {
            return status;
        }
        if !state.queues.contains(&queue) {
            return CL_INVALID_COMMAND_QUEUE;
        }
        match state.buffers.get(&mem) {
            Some(bytes) if bytes.len() >= out.len() => {
                out.copy_from_slice(&bytes[..out.len()]);
                CL_SUCCESS
            }
            Some(_) => CL_INVALID_VALUE,
            None => CL_INVALID_MEM_OBJECT,
        }
    }

    fn release_mem(&self, mem: MemId) -> Status {
        let mut state = self.state.lock();
        if state.buffers.remove(&mem).is_none() {
            return CL_INVALID_MEM_OBJECT;
        }
        state.released.push("mem");
        CL_SUCCESS
    }

    fn release_kernel(&self, kernel: KernelId) -> Status {
        let mut state = self.state.lock();
        if state.kernels.remove(&kernel).is_none() {
            return CL_INVALID_KERNEL;
        }
        state.released.push("kernel");
        CL_SUCCESS
    }

    fn release_program(&self, program: ProgramId) -> Status {
        let mut state = self.state.lock();
        if state.programs.remove(&program).is_none() {
            return CL_INVALID_PROGRAM;
        }
        state.released.push("program");
        CL_SUCCESS
    }

    fn release_queue(&self, queue: QueueId) -> Status {
        let mut state = self.state.lock();
        if !state.queues.remove(&queue) {
            return CL_INVALID_COMMAND_QUEUE;
        }
        state.released.push("queue");
        CL_SUCCESS
    }

    fn release_context(&self, context: ContextId) -> Status {
        let mut state = self.state.lock();
        if !state.contexts.remove(&context) {
            return CL_INVALID_CONTEXT;
        }
        state.released.push("context");
        CL_SUCCESS
    }
}
