use std::fmt::Write;

use wfstress_core::RoundStats;

/// Plain-text summary of one round, one line per figure.
pub fn round_summary(stats: &RoundStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "batch size: {}", stats.batch_size);
    let _ = writeln!(out, "avg wait duration: {} ms", stats.mean_wait_ms);
    let _ = writeln!(out, "avg run duration: {} ms", stats.mean_run_ms);
    let _ = write!(
        out,
        "poll passes: {}, deleted: {}, elapsed: {}s",
        stats.passes,
        stats.deleted,
        stats.elapsed.as_secs()
    );
    if stats.delete_failures > 0 {
        let _ = write!(out, "\ndelete failures: {}", stats.delete_failures);
    }
    out
}
