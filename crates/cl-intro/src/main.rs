use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use tracing::info;

use cl_intro::config::{
    DEFAULT_DEVICE, DEFAULT_PLATFORM, DeviceSelector, IndexFillConfig, MAX_WORK_GROUP_SIZE_INTEL,
    ScaleConfig, SmokeConfig,
};
use cl_intro::run::{self, RunReport, SmokeOutcome};
use cl_intro::platform;

/// OpenCL hello-world programs: list devices, smoke-test them, and time
/// trivial kernels against the host.
#[derive(Parser, Debug)]
#[command(name = "cl-intro")]
#[command(version)]
struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every OpenCL platform with its CPU and GPU devices
    List,
    /// List devices and run the index kernel on each available one
    Smoke {
        /// Number of work items per device
        #[arg(long, default_value_t = SmokeConfig::default().size)]
        size: usize,
    },
    /// Time `output[i] = i + n!` over a 2D range, host vs device
    IndexFill {
        #[command(flatten)]
        target: Target,
        /// Work-group width
        #[arg(long, default_value_t = MAX_WORK_GROUP_SIZE_INTEL)]
        wg_x: usize,
        /// Work-group height
        #[arg(long, default_value_t = MAX_WORK_GROUP_SIZE_INTEL)]
        wg_y: usize,
        /// Work-groups along x
        #[arg(long, default_value_t = 100)]
        groups_x: usize,
        /// Work-groups along y
        #[arg(long, default_value_t = 100)]
        groups_y: usize,
        /// n in `i + n!`
        #[arg(long, default_value_t = 100)]
        factorial: u32,
    },
    /// Time `output[i] = input[i] * 2` over random input, host vs device
    Scale {
        #[command(flatten)]
        target: Target,
        /// Number of elements
        #[arg(long, default_value_t = ScaleConfig::default().array_size)]
        size: usize,
        /// Work-group size; the runtime chooses when omitted
        #[arg(long)]
        local: Option<usize>,
        /// RNG seed for reproducible input
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct Target {
    /// Platform name to run on
    #[arg(long, env = "CL_INTRO_PLATFORM", default_value = DEFAULT_PLATFORM)]
    platform: String,

    /// GPU device name to run on
    #[arg(long, env = "CL_INTRO_DEVICE", default_value = DEFAULT_DEVICE)]
    device: String,

    /// Kernel source file; defaults to ./kernel.cl, then the built-in kernel
    #[arg(long, env = "CL_INTRO_KERNEL")]
    kernel: Option<PathBuf>,
}

impl Target {
    fn selector(&self) -> DeviceSelector {
        DeviceSelector::named(&self.platform, &self.device)
    }
}

fn setup_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    let ok = match cli.command {
        Command::List => list()?,
        Command::Smoke { size } => smoke(&SmokeConfig { size })?,
        Command::IndexFill { target, wg_x, wg_y, groups_x, groups_y, factorial } => {
            let cfg = IndexFillConfig {
                selector: target.selector(),
                wg_size_x: wg_x,
                wg_size_y: wg_y,
                groups_x,
                groups_y,
                factorial,
                kernel_path: target.kernel,
            };
            let count = cfg.count().context("invalid index-fill size")?;
            println!("Create output arrays with the size of: {count}");
            report(run::run_index_fill(&cfg).context("index-fill run failed")?)
        }
        Command::Scale { target, size, local, seed } => {
            let cfg = ScaleConfig {
                selector: target.selector(),
                array_size: size,
                local_size: local,
                seed,
                kernel_path: target.kernel,
            };
            println!("Create input and output arrays with the size of: {}", cfg.array_size);
            report(run::run_scale(&cfg).context("scale run failed")?)
        }
    };

    #[cfg(feature = "metrics")]
    cl_intro::metrics::print_summary();

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn list() -> Result<bool> {
    let platforms = platform::enumerate().context("failed to enumerate OpenCL platforms")?;
    println!("{} platform(s) found", platforms.len());
    println!("{}", style("All OpenCL platforms:").blue().bold());
    for (info, _) in &platforms {
        println!("{info}");
    }
    Ok(platforms.iter().all(|(info, _)| info.unreadable.is_empty()))
}

fn smoke(cfg: &SmokeConfig) -> Result<bool> {
    let platforms = run::smoke_all(cfg).context("failed to enumerate OpenCL platforms")?;
    println!("{} platform(s) found", platforms.len());
    println!("{}", style("All OpenCL platforms:").blue().bold());

    let ok = platforms.iter().all(|smoke| smoke.is_ok());
    for smoke in &platforms {
        println!("{}", smoke.platform);
        for (device, result) in smoke.platform.devices.iter().zip(&smoke.results) {
            print!("\t\t>> Run example kernel on OpenCL device \"{}\": ", device.name);
            match result {
                Ok(SmokeOutcome::Unavailable) => println!("device is not available"),
                Ok(SmokeOutcome::Ran(v)) if v.is_ok() => println!("{}", style("OK").green()),
                Ok(SmokeOutcome::Ran(v)) => {
                    println!("{}", style("Error in kernel execution!").red().bold());
                    for line in v.to_string().lines() {
                        println!("\t\t{line}");
                    }
                }
                Err(err) => {
                    println!("{}", style("Error running the kernel!").red().bold());
                    println!("\t\t{err}");
                }
            }
        }
    }
    Ok(ok)
}

fn report(report: RunReport) -> bool {
    info!(device = %report.device.name, ok = report.is_ok(), "run finished");
    println!("{report}");
    report.is_ok()
}
