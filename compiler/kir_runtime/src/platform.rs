//! Platforms: where contexts come from.

use std::sync::Arc;

use kir_driver::{DeviceId, DeviceProperties, Driver, OpenCl, PlatformId, PlatformProperties};

use crate::context::Context;
use crate::device::DeviceContext;
use crate::error::Result;
use crate::options::{hardware_parallelism, CpuStrategy, Options};
use crate::parallel::ParallelContext;
use crate::pool::PoolContext;
use crate::selection::{select_device, Selection};

/// Name of the host device.
pub const CPU_DEVICE_NAME: &str = "System CPU";

pub trait Platform: Send + Sync {
    fn properties(&self) -> &PlatformProperties;

    /// The device contexts of this platform run on.
    fn device(&self) -> &DeviceProperties;

    fn create_context(&self) -> Result<Box<dyn Context>>;
}

/// Host threads, using the configured [`CpuStrategy`].
#[derive(Clone, Debug)]
pub struct CpuPlatform {
    properties: PlatformProperties,
    device: DeviceProperties,
    strategy: CpuStrategy,
    threads: usize,
}

impl CpuPlatform {
    pub fn new(options: &Options) -> Self {
        let threads = options.resolved_threads();
        let units = u32::try_from(hardware_parallelism()).unwrap_or(u32::MAX);
        CpuPlatform {
            properties: PlatformProperties {
                id: PlatformId::new(0),
                name: "Host".to_owned(),
            },
            device: DeviceProperties {
                id: DeviceId::new(0),
                name: CPU_DEVICE_NAME.to_owned(),
                compute_units: units,
                max_work_item_dimensions: 1,
                max_work_item_sizes: vec![usize::MAX],
                max_work_group_size: 1,
                clock_frequency_mhz: 0,
                memory_alignment: 8,
            },
            strategy: options.cpu_strategy,
            threads,
        }
    }

    pub fn strategy(&self) -> CpuStrategy {
        self.strategy
    }
}

impl Platform for CpuPlatform {
    fn properties(&self) -> &PlatformProperties {
        &self.properties
    }

    fn device(&self) -> &DeviceProperties {
        &self.device
    }

    fn create_context(&self) -> Result<Box<dyn Context>> {
        let context: Box<dyn Context> = match self.strategy {
            CpuStrategy::Parallel => Box::new(ParallelContext::new()),
            CpuStrategy::Pool => Box::new(PoolContext::new(self.threads)?),
        };
        Ok(context)
    }
}

/// One accelerator device chosen at discovery time.
pub struct AcceleratorPlatform {
    driver: Arc<dyn Driver>,
    selection: Selection,
}

impl AcceleratorPlatform {
    /// Select a platform and device through `driver`.
    pub fn discover(driver: Arc<dyn Driver>, options: &Options) -> Result<Self> {
        let selection = select_device(driver.as_ref(), options)?;
        Ok(AcceleratorPlatform { driver, selection })
    }

    /// Open a device context directly, without boxing.
    pub fn create_device_context(&self) -> Result<DeviceContext> {
        DeviceContext::new(
            Arc::clone(&self.driver),
            self.selection.platform.id,
            self.selection.device.clone(),
        )
    }
}

impl Platform for AcceleratorPlatform {
    fn properties(&self) -> &PlatformProperties {
        &self.selection.platform
    }

    fn device(&self) -> &DeviceProperties {
        &self.selection.device
    }

    fn create_context(&self) -> Result<Box<dyn Context>> {
        Ok(Box::new(self.create_device_context()?))
    }
}

/// Picks a platform from [`Options`].
#[derive(Clone, Debug, Default)]
pub struct PlatformFactory {
    options: Options,
}

impl PlatformFactory {
    pub fn new(options: Options) -> Self {
        PlatformFactory { options }
    }

    /// Factory configured from the `KIR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Options::from_env()?))
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Load the driver library and discover a device.
    pub fn accelerator(&self) -> Result<AcceleratorPlatform> {
        let driver = OpenCl::load(self.options.library_path.as_deref())?;
        AcceleratorPlatform::discover(Arc::new(driver), &self.options)
    }

    pub fn cpu(&self) -> CpuPlatform {
        CpuPlatform::new(&self.options)
    }

    /// The accelerator if one can be discovered, otherwise the host.
    pub fn create(&self) -> Box<dyn Platform> {
        self.fallback(self.accelerator())
    }

    /// Like [`create`](Self::create) with an already loaded driver.
    pub fn create_with_driver(&self, driver: Arc<dyn Driver>) -> Box<dyn Platform> {
        self.fallback(AcceleratorPlatform::discover(driver, &self.options))
    }

    fn fallback(&self, accelerator: Result<AcceleratorPlatform>) -> Box<dyn Platform> {
        match accelerator {
            Ok(platform) => Box::new(platform),
            Err(err) => {
                tracing::warn!(%err, "no accelerator available, falling back to host threads");
                Box::new(self.cpu())
            }
        }
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
