// Fills a 1600x1600 array with `i + 100!` on the host and on the GPU and
// compares the times. Reads ./kernel.cl when present.

use cl_intro::{ClError, IndexFillConfig, run};

fn main() -> Result<(), ClError> {
    /* ---------- 1. Parameters ---------------------------------- */
    let cfg = IndexFillConfig::default();
    println!("Create input and output arrays with the size of: {}", cfg.count()?);

    /* ---------- 2. Host run, device run, verification ---------- */
    let report = run::run_index_fill(&cfg)?;

    /* ---------- 3. Output ---------------------------------------- */
    println!("{report}");
    report.into_result().map(|_| ())
}
