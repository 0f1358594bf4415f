#![cfg(feature = "metrics")]

use once_cell::sync::Lazy;
use std::{collections::BTreeMap, sync::Mutex};

/* ───────────── raw stage latencies ──────────────────── */

static TIMES: Lazy<Mutex<Vec<(&'static str, u64)>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Called by the run procedures, e.g. `record("kernel", ns)`.
pub fn record(stage: &'static str, ns: u64) {
    if let Ok(mut times) = TIMES.lock() {
        times.push((stage, ns));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: &'static str,
    pub count: usize,
    pub mean_ns: u64,
    pub p95_ns: u64,
}

/// Drains the recorded latencies and groups them per stage.
pub fn summary() -> Vec<StageSummary> {
    let mut map: BTreeMap<&'static str, Vec<u64>> = BTreeMap::new();
    if let Ok(mut times) = TIMES.lock() {
        for (stage, ns) in times.drain(..) {
            map.entry(stage).or_default().push(ns);
        }
    }

    map.into_iter()
        .map(|(stage, mut v)| {
            v.sort_unstable();
            let mean_ns = v.iter().sum::<u64>() / v.len() as u64;
            let p95_ns = v[((v.len() * 95) / 100).saturating_sub(1)];
            StageSummary { stage, count: v.len(), mean_ns, p95_ns }
        })
        .collect()
}

/* ───────────── print summary ───────────────────────── */

/// Call once at the end of `main()`.
pub fn print_summary() {
    println!("── metrics summary ──");
    for s in summary() {
        println!(
            "{:<8} n={:<3} mean={:>10} ns   p95={:>10} ns",
            s.stage, s.count, s.mean_ns, s.p95_ns
        );
    }
}
