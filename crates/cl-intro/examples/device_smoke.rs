// Runs `output[i] = i` on every available OpenCL device.

use cl_intro::{ClError, SmokeConfig, SmokeOutcome, run};

fn main() -> Result<(), ClError> {
    let cfg = SmokeConfig::default();
    let mut failed = 0;

    for smoke in run::smoke_all(&cfg)? {
        println!("{}", smoke.platform);
        failed += smoke.platform.unreadable.len();
        for (device, result) in smoke.platform.devices.iter().zip(smoke.results) {
            match result {
                Ok(SmokeOutcome::Unavailable) => {
                    println!("\t\tDevice {} is not available", device.name);
                }
                Ok(SmokeOutcome::Ran(v)) if v.is_ok() => {
                    println!("\t\t{}: {} work items OK", device.name, v.checked);
                }
                Ok(SmokeOutcome::Ran(v)) => {
                    failed += 1;
                    println!("\t\t{}: error in kernel execution\n{v}", device.name);
                }
                Err(err) => {
                    failed += 1;
                    println!("\t\t{}: error running the kernel: {err}", device.name);
                }
            }
        }
    }

    if failed > 0 {
        return Err(ClError::Mismatch { errors: failed });
    }
    Ok(())
}
