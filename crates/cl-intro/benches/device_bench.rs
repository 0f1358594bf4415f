// Full host-vs-device runs on the first GPU. Does nothing without one.

use criterion::{Criterion, criterion_group, criterion_main};
use cl_intro::config::{DeviceSelector, IndexFillConfig, ScaleConfig};
use cl_intro::platform;
use cl_intro::run;
use opencl3::device::CL_DEVICE_TYPE_GPU;

use std::time::Duration;

fn bench_device(c: &mut Criterion) {
    let selected = match platform::select(&DeviceSelector::default(), CL_DEVICE_TYPE_GPU) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("no OpenCL GPU, skipping device benches: {err}");
            return;
        }
    };
    let selector = DeviceSelector::named(&selected.platform.name, &selected.info.name);

    let scale = ScaleConfig {
        selector: selector.clone(),
        array_size: 1 << 20,
        seed: Some(0),
        ..ScaleConfig::default()
    };
    c.bench_function("scale_1Mi", |b| {
        b.iter(|| run::run_scale(&scale).unwrap());
    });

    let fill = IndexFillConfig {
        selector,
        ..IndexFillConfig::default()
    };
    c.bench_function("index_fill_1600x1600", |b| {
        b.iter(|| run::run_index_fill(&fill).unwrap());
    });
}

fn criterion_config() -> Criterion {
    Criterion::default()
        // warm up the GPU clocks and the driver's program cache
        .warm_up_time(Duration::from_secs(3))
        .measurement_time(Duration::from_secs(10))
        .sample_size(20)
        .configure_from_args()
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_device
}
criterion_main!(benches);
