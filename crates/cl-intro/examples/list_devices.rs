// Lists every OpenCL platform with its CPU and GPU devices.

use cl_intro::{ClError, platform};

fn main() -> Result<(), ClError> {
    println!("Hello World!");

    let platforms = platform::enumerate()?;
    println!("{} platform(s) found", platforms.len());

    println!("All OpenCL platforms:");
    for (info, _devices) in &platforms {
        println!("{info}");
    }
    Ok(())
}
