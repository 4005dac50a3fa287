//! Opt-in wall-clock timing of pipeline stages.
//!
//! Stages wrap their work in [`timed`]; nothing is recorded unless timing was
//! enabled with [`set_timing_enabled`] (the CLI does this for `--timing` or
//! `TWBG_TIMING=1`). Samples are thread-local, matching the single-threaded
//! load pipeline.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

thread_local! {
    static SAMPLES: RefCell<Vec<(String, Duration)>> = const { RefCell::new(Vec::new()) };
}

static TIMING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Per-stage totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub count: usize,
    pub total_us: u128,
    pub max_us: u128,
}

/// Returns true when `TWBG_TIMING` is `1`, `true`, `yes` or `on`.
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("TWBG_TIMING").ok().is_some_and(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

pub fn set_timing_enabled(enabled: bool) {
    TIMING_ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear_timings();
    }
}

#[must_use]
pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::Relaxed)
}

pub fn clear_timings() {
    SAMPLES.with(|samples| samples.borrow_mut().clear());
}

/// Run `f`, recording its duration under `stage` when timing is enabled.
pub fn timed<R>(stage: &str, f: impl FnOnce() -> R) -> R {
    if !is_timing_enabled() {
        return f();
    }

    let started = Instant::now();
    let result = f();
    let elapsed = started.elapsed();
    SAMPLES.with(|samples| samples.borrow_mut().push((stage.to_string(), elapsed)));
    result
}

/// Drain this thread's samples into per-stage totals, sorted by stage name.
#[must_use]
pub fn collect_report() -> Vec<StageTiming> {
    let samples = SAMPLES.with(|samples| std::mem::take(&mut *samples.borrow_mut()));

    let mut grouped: BTreeMap<String, Vec<Duration>> = BTreeMap::new();
    for (stage, elapsed) in samples {
        grouped.entry(stage).or_default().push(elapsed);
    }

    grouped
        .into_iter()
        .map(|(stage, values)| StageTiming {
            stage,
            count: values.len(),
            total_us: values.iter().map(Duration::as_micros).sum(),
            max_us: values.iter().map(Duration::as_micros).max().unwrap_or(0),
        })
        .collect()
}

/// Render a report as a fixed-width table.
#[must_use]
pub fn display_table(report: &[StageTiming]) -> String {
    if report.is_empty() {
        return "No timing samples recorded.".to_string();
    }

    let mut out = String::new();
    out.push_str("stage                     count    total_us      max_us\n");
    out.push_str("-------------------------------------------------------\n");
    for row in report {
        let _ = writeln!(
            out,
            "{:<24} {:>6} {:>11} {:>11}",
            row.stage, row.count, row.total_us, row.max_us
        );
    }
    out
}
