//! Platform and context configuration.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use kir_driver::{DeviceProperties, PlatformProperties};

use crate::error::{Error, Result};

/// Driver library path override.
pub const ENV_OPENCL_LIBRARY: &str = "KIR_OPENCL_LIBRARY";
/// `parallel` or `pool`.
pub const ENV_CPU_STRATEGY: &str = "KIR_CPU_STRATEGY";
/// Worker count for the pool strategy.
pub const ENV_CPU_THREADS: &str = "KIR_CPU_THREADS";

pub type PlatformFilter = Arc<dyn Fn(&PlatformProperties) -> bool + Send + Sync>;
pub type DeviceComparator =
    Arc<dyn Fn(&DeviceProperties, &DeviceProperties) -> Ordering + Send + Sync>;

/// How host contexts run work-items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CpuStrategy {
    /// rayon's global pool; no owned resources.
    #[default]
    Parallel,
    /// A dedicated pool of named worker threads.
    Pool,
}

impl CpuStrategy {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "parallel" => Some(CpuStrategy::Parallel),
            "pool" => Some(CpuStrategy::Pool),
            _ => None,
        }
    }
}

/// Rank devices by compute units.
pub fn by_compute_units(a: &DeviceProperties, b: &DeviceProperties) -> Ordering {
    a.compute_units.cmp(&b.compute_units)
}

#[derive(Clone)]
pub struct Options {
    pub(crate) platform_filter: PlatformFilter,
    pub(crate) device_comparator: DeviceComparator,
    pub(crate) cpu_strategy: CpuStrategy,
    pub(crate) library_path: Option<PathBuf>,
    pub(crate) threads: Option<usize>,
}

impl Options {
    /// Any platform, the device with the most compute units, the
    /// parallel host strategy.
    pub fn new() -> Self {
        Options {
            platform_filter: Arc::new(|_: &PlatformProperties| true),
            device_comparator: Arc::new(by_compute_units),
            cpu_strategy: CpuStrategy::default(),
            library_path: None,
            threads: None,
        }
    }

    /// Defaults overridden by the `KIR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Options::new();
        if let Some(path) = lookup(ENV_OPENCL_LIBRARY).filter(|path| !path.is_empty()) {
            options.library_path = Some(PathBuf::from(path));
        }
        if let Some(text) = lookup(ENV_CPU_STRATEGY) {
            options.cpu_strategy = CpuStrategy::parse(&text).ok_or_else(|| {
                Error::configuration(format!(
                    "{ENV_CPU_STRATEGY}={text:?}: expected `parallel` or `pool`"
                ))
            })?;
        }
        if let Some(text) = lookup(ENV_CPU_THREADS) {
            let threads = text
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|threads| *threads > 0)
                .ok_or_else(|| {
                    Error::configuration(format!(
                        "{ENV_CPU_THREADS}={text:?}: expected a positive integer"
                    ))
                })?;
            options.threads = Some(threads);
        }
        Ok(options)
    }

    #[must_use]
    pub fn platform_filter(
        mut self,
        filter: impl Fn(&PlatformProperties) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.platform_filter = Arc::new(filter);
        self
    }

    /// Ordering used to pick a device; the greatest wins, and among
    /// equals the first reported.
    #[must_use]
    pub fn device_comparator(
        mut self,
        comparator: impl Fn(&DeviceProperties, &DeviceProperties) -> Ordering
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.device_comparator = Arc::new(comparator);
        self
    }

    #[must_use]
    pub fn cpu_strategy(mut self, strategy: CpuStrategy) -> Self {
        self.cpu_strategy = strategy;
        self
    }

    #[must_use]
    pub fn library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// Worker count for [`CpuStrategy::Pool`]. Defaults to the hardware
    /// parallelism.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn strategy(&self) -> CpuStrategy {
        self.cpu_strategy
    }

    pub(crate) fn resolved_threads(&self) -> usize {
        self.threads.unwrap_or_else(hardware_parallelism)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("cpu_strategy", &self.cpu_strategy)
            .field("library_path", &self.library_path)
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

pub(crate) fn hardware_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
mod tests;
