//! Accelerator discovery.
//!
//! Only the first platform that passes the filter is considered; its
//! devices are ranked with the configured comparator.

use kir_driver::{devices, platforms, DeviceProperties, Driver, PlatformProperties};

use crate::error::{Error, Result};
use crate::options::Options;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub platform: PlatformProperties,
    pub device: DeviceProperties,
}

pub fn select_device(driver: &dyn Driver, options: &Options) -> Result<Selection> {
    let all = platforms(driver)?;
    let available = all.len();
    let platform = all
        .into_iter()
        .find(|platform| (options.platform_filter)(platform))
        .ok_or_else(|| {
            Error::configuration(format!(
                "no platform matches the platform filter ({available} available)"
            ))
        })?;

    let device = best(devices(driver, platform.id)?, |a, b| {
        (options.device_comparator)(a, b)
    })
    .ok_or_else(|| {
        Error::configuration(format!("platform `{}` has no devices", platform.name))
    })?;

    tracing::info!(
        platform = %platform.name,
        device = %device.name,
        compute_units = device.compute_units,
        "selected accelerator device"
    );
    Ok(Selection { platform, device })
}

/// Greatest element under `compare`; the earliest among equals.
fn best<T>(items: Vec<T>, compare: impl Fn(&T, &T) -> std::cmp::Ordering) -> Option<T> {
    let mut items = items.into_iter();
    let mut best = items.next()?;
    for item in items {
        if compare(&item, &best).is_gt() {
            best = item;
        }
    }
    Some(best)
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
