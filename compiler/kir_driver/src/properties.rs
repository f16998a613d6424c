//! Immutable snapshots of platforms and devices.

use crate::api::{DeviceId, Driver, PlatformId};
use crate::error::DriverError;
use crate::query::{
    device_ids, device_info, platform_ids, platform_name, DeviceName, MaxClockFrequency,
    MaxComputeUnits, MaxWorkGroupSize, MaxWorkItemDimensions, MaxWorkItemSizes,
    MemBaseAddrAlign,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformProperties {
    pub id: PlatformId,
    pub name: String,
}

impl PlatformProperties {
    pub fn query(driver: &dyn Driver, id: PlatformId) -> Result<Self, DriverError> {
        Ok(PlatformProperties {
            id,
            name: platform_name(driver, id)?,
        })
    }
}

/// What a device reports about itself, captured once at discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceProperties {
    pub id: DeviceId,
    pub name: String,
    pub compute_units: u32,
    pub max_work_item_dimensions: u32,
    pub max_work_item_sizes: Vec<usize>,
    pub max_work_group_size: usize,
    pub clock_frequency_mhz: u32,
    /// Base address alignment in bytes.
    pub memory_alignment: u32,
}

impl DeviceProperties {
    pub fn query(driver: &dyn Driver, id: DeviceId) -> Result<Self, DriverError> {
        Ok(DeviceProperties {
            id,
            name: device_info::<DeviceName>(driver, id)?,
            compute_units: device_info::<MaxComputeUnits>(driver, id)?,
            max_work_item_dimensions: device_info::<MaxWorkItemDimensions>(driver, id)?,
            max_work_item_sizes: device_info::<MaxWorkItemSizes>(driver, id)?,
            max_work_group_size: device_info::<MaxWorkGroupSize>(driver, id)?,
            clock_frequency_mhz: device_info::<MaxClockFrequency>(driver, id)?,
            memory_alignment: device_info::<MemBaseAddrAlign>(driver, id)? / 8,
        })
    }
}

/// Every platform the driver reports, in driver order.
pub fn platforms(driver: &dyn Driver) -> Result<Vec<PlatformProperties>, DriverError> {
    platform_ids(driver)?
        .into_iter()
        .map(|id| PlatformProperties::query(driver, id))
        .collect()
}

/// Every device of `platform`, in driver order.
pub fn devices(
    driver: &dyn Driver,
    platform: PlatformId,
) -> Result<Vec<DeviceProperties>, DriverError> {
    device_ids(driver, platform)?
        .into_iter()
        .map(|id| DeviceProperties::query(driver, id))
        .collect()
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
