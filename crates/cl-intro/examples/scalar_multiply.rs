// Doubles a list of random integers on the host and on the GPU and compares
// the times. Reads ./kernel.cl when present.

use cl_intro::{ClError, ScaleConfig, run};

#[cfg(feature = "metrics")]
use cl_intro::metrics::print_summary;

fn main() -> Result<(), ClError> {
    let cfg = ScaleConfig::default();
    println!("Create input and output arrays with the size of: {}", cfg.array_size);
    println!(
        "Fill the array with random values between {} and {}",
        cl_intro::host::RANDOM_MIN,
        cl_intro::host::RANDOM_MAX
    );

    let report = run::run_scale(&cfg)?;
    println!("{report}");

    #[cfg(feature = "metrics")]
    print_summary();

    report.into_result().map(|_| ())
}
