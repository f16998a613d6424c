//! The two-phase query protocol.
//!
//! Every enumeration and info call is made twice: once with no output
//! buffer to learn the required size or count, then with a buffer of
//! exactly that size. [`two_phase`] is the only place that sequence is
//! written; typed queries decode its bytes per property kind.

use crate::api::{DeviceId, Driver, PlatformId, ProgramId};
use crate::error::{check, DriverError};
use crate::status::{
    CL_DEVICE_MAX_CLOCK_FREQUENCY, CL_DEVICE_MAX_COMPUTE_UNITS, CL_DEVICE_MAX_WORK_GROUP_SIZE,
    CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS, CL_DEVICE_MAX_WORK_ITEM_SIZES,
    CL_DEVICE_MEM_BASE_ADDR_ALIGN, CL_DEVICE_NAME, CL_DEVICE_NOT_FOUND, CL_DEVICE_TYPE_ALL,
    CL_PLATFORM_NAME, CL_PLATFORM_NOT_FOUND_KHR, CL_PROGRAM_BUILD_LOG, Status,
};

/// Size query, exact allocation, fill.
///
/// `fetch` receives `None` for the size query and the allocated buffer
/// for the fill; it reports the required length through its second
/// argument both times.
pub fn two_phase<T: Copy + Default>(
    call: &'static str,
    mut fetch: impl FnMut(Option<&mut [T]>, &mut usize) -> Status,
) -> Result<Vec<T>, DriverError> {
    let mut len = 0usize;
    check(call, fetch(None, &mut len))?;
    let mut out = vec![T::default(); len];
    if len > 0 {
        let mut filled = len;
        check(call, fetch(Some(out.as_mut_slice()), &mut filled))?;
        out.truncate(filled);
    }
    Ok(out)
}

/// Adapter for enumeration calls that count in `u32`.
fn counted<T: Copy + Default>(
    call: &'static str,
    mut fetch: impl FnMut(Option<&mut [T]>, &mut u32) -> Status,
) -> Result<Vec<T>, DriverError> {
    two_phase(call, |out, len| {
        let mut count = u32::try_from(*len).unwrap_or(u32::MAX);
        let status = fetch(out, &mut count);
        *len = count as usize;
        status
    })
}

/// All platform ids. An ICD loader with no platforms yields an empty list.
pub fn platform_ids(driver: &dyn Driver) -> Result<Vec<PlatformId>, DriverError> {
    none_found(
        counted("clGetPlatformIDs", |out, count| driver.platform_ids(out, count)),
        CL_PLATFORM_NOT_FOUND_KHR,
    )
}

/// All device ids of `platform`, of any device type.
pub fn device_ids(driver: &dyn Driver, platform: PlatformId) -> Result<Vec<DeviceId>, DriverError> {
    none_found(
        counted("clGetDeviceIDs", |out, count| {
            driver.device_ids(platform, CL_DEVICE_TYPE_ALL, out, count)
        }),
        CL_DEVICE_NOT_FOUND,
    )
}

fn none_found<T>(
    result: Result<Vec<T>, DriverError>,
    empty: Status,
) -> Result<Vec<T>, DriverError> {
    match result {
        Err(err) if err.status() == Some(empty) => Ok(Vec::new()),
        other => other,
    }
}

pub fn platform_name(driver: &dyn Driver, platform: PlatformId) -> Result<String, DriverError> {
    let bytes = two_phase("clGetPlatformInfo", |out, size| {
        driver.platform_info(platform, CL_PLATFORM_NAME, out, size)
    })?;
    Ok(decode_string(&bytes))
}

/// Build log of `program` for `device`, used to explain build failures.
pub fn build_log(
    driver: &dyn Driver,
    program: ProgramId,
    device: DeviceId,
) -> Result<String, DriverError> {
    let bytes = two_phase("clGetProgramBuildInfo", |out, size| {
        driver.program_build_info(program, device, CL_PROGRAM_BUILD_LOG, out, size)
    })?;
    Ok(decode_string(&bytes))
}

// ── Device properties ───────────────────────────────────────────────

/// A queryable device property and how to decode it.
pub trait DeviceProperty {
    type Value;
    const PARAM: u32;
    const NAME: &'static str;

    fn decode(bytes: &[u8]) -> Result<Self::Value, DriverError>;
}

/// Query one device property.
pub fn device_info<P: DeviceProperty>(
    driver: &dyn Driver,
    device: DeviceId,
) -> Result<P::Value, DriverError> {
    let bytes = two_phase("clGetDeviceInfo", |out, size| {
        driver.device_info(device, P::PARAM, out, size)
    })?;
    P::decode(&bytes)
}

macro_rules! scalar_property {
    ($(#[$doc:meta])* $name:ident, $param:expr, $ty:ty) => {
        $(#[$doc])*
        pub struct $name;

        impl DeviceProperty for $name {
            type Value = $ty;
            const PARAM: u32 = $param;
            const NAME: &'static str = stringify!($param);

            fn decode(bytes: &[u8]) -> Result<$ty, DriverError> {
                let raw: [u8; std::mem::size_of::<$ty>()] =
                    bytes.try_into().map_err(|_| DriverError::MalformedInfo {
                        query: Self::NAME,
                        expected: std::mem::size_of::<$ty>(),
                        actual: bytes.len(),
                    })?;
                Ok(<$ty>::from_ne_bytes(raw))
            }
        }
    };
}

scalar_property!(
    /// Parallel compute units (`cl_uint`).
    MaxComputeUnits,
    CL_DEVICE_MAX_COMPUTE_UNITS,
    u32
);
scalar_property!(MaxWorkItemDimensions, CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS, u32);
scalar_property!(MaxWorkGroupSize, CL_DEVICE_MAX_WORK_GROUP_SIZE, usize);
scalar_property!(
    /// Clock frequency in MHz.
    MaxClockFrequency,
    CL_DEVICE_MAX_CLOCK_FREQUENCY,
    u32
);
scalar_property!(
    /// Base address alignment in bits.
    MemBaseAddrAlign,
    CL_DEVICE_MEM_BASE_ADDR_ALIGN,
    u32
);

pub struct DeviceName;

impl DeviceProperty for DeviceName {
    type Value = String;
    const PARAM: u32 = CL_DEVICE_NAME;
    const NAME: &'static str = "CL_DEVICE_NAME";

    fn decode(bytes: &[u8]) -> Result<String, DriverError> {
        Ok(decode_string(bytes))
    }
}

/// Per-dimension work-item limits (`size_t[]`).
pub struct MaxWorkItemSizes;

impl DeviceProperty for MaxWorkItemSizes {
    type Value = Vec<usize>;
    const PARAM: u32 = CL_DEVICE_MAX_WORK_ITEM_SIZES;
    const NAME: &'static str = "CL_DEVICE_MAX_WORK_ITEM_SIZES";

    fn decode(bytes: &[u8]) -> Result<Vec<usize>, DriverError> {
        const WIDTH: usize = std::mem::size_of::<usize>();
        if bytes.len() % WIDTH != 0 {
            return Err(DriverError::MalformedInfo {
                query: Self::NAME,
                expected: bytes.len() - bytes.len() % WIDTH,
                actual: bytes.len(),
            });
        }
        Ok(bytes
            .chunks_exact(WIDTH)
            .map(|chunk| {
                let mut raw = [0u8; WIDTH];
                raw.copy_from_slice(chunk);
                usize::from_ne_bytes(raw)
            })
            .collect())
    }
}

/// C string bytes to `String`, dropping the terminator.
fn decode_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
