use std::collections::HashMap;

use kir_driver::{DeviceId, PlatformId};
use pretty_assertions::assert_eq;

use super::*;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

fn device(name: &str, compute_units: u32) -> DeviceProperties {
    DeviceProperties {
        id: DeviceId::new(1),
        name: name.to_owned(),
        compute_units,
        max_work_item_dimensions: 3,
        max_work_item_sizes: vec![64, 64, 64],
        max_work_group_size: 64,
        clock_frequency_mhz: 100,
        memory_alignment: 128,
    }
}

#[test]
fn defaults_accept_any_platform() {
    let options = Options::new();
    let platform = PlatformProperties {
        id: PlatformId::new(1),
        name: "anything".into(),
    };
    assert!((options.platform_filter)(&platform));
    assert_eq!(options.strategy(), CpuStrategy::Parallel);
    assert_eq!(options.library_path, None);
    assert!(options.resolved_threads() >= 1);
}

#[test]
fn default_comparator_ranks_by_compute_units() {
    let options = Options::default();
    let small = device("small", 4);
    let big = device("big", 32);
    assert_eq!((options.device_comparator)(&big, &small), Ordering::Greater);
    assert_eq!(by_compute_units(&small, &small), Ordering::Equal);
}

#[test]
fn environment_overrides() {
    let options = Options::from_lookup(lookup(&[
        (ENV_OPENCL_LIBRARY, "/opt/vendor/libOpenCL.so"),
        (ENV_CPU_STRATEGY, " Pool "),
        (ENV_CPU_THREADS, "6"),
    ]))
    .unwrap();
    assert_eq!(
        options.library_path,
        Some(PathBuf::from("/opt/vendor/libOpenCL.so"))
    );
    assert_eq!(options.strategy(), CpuStrategy::Pool);
    assert_eq!(options.resolved_threads(), 6);
}

#[test]
fn empty_environment_keeps_defaults() {
    let options = Options::from_lookup(lookup(&[(ENV_OPENCL_LIBRARY, "")])).unwrap();
    assert_eq!(options.library_path, None);
    assert_eq!(options.threads, None);
}

#[test]
fn invalid_environment_is_a_configuration_error() {
    let err = Options::from_lookup(lookup(&[(ENV_CPU_STRATEGY, "gpu")])).unwrap_err();
    assert!(matches!(err, Error::Configuration(ref message) if message.contains("KIR_CPU_STRATEGY")));

    let err = Options::from_lookup(lookup(&[(ENV_CPU_THREADS, "0")])).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn builder_sets_every_field() {
    let options = Options::new()
        .platform_filter(|platform| platform.name.contains("NVIDIA"))
        .device_comparator(|a, b| a.clock_frequency_mhz.cmp(&b.clock_frequency_mhz))
        .cpu_strategy(CpuStrategy::Pool)
        .library_path("/tmp/libOpenCL.so")
        .threads(3);
    let nvidia = PlatformProperties {
        id: PlatformId::new(1),
        name: "NVIDIA CUDA".into(),
    };
    assert!((options.platform_filter)(&nvidia));
    assert_eq!(options.strategy(), CpuStrategy::Pool);
    assert_eq!(options.resolved_threads(), 3);
    assert_eq!(CpuStrategy::parse("parallel"), Some(CpuStrategy::Parallel));
    assert_eq!(CpuStrategy::parse("serial"), None);
}
