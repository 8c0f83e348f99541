//! Exit-code policy for CI gating

use crate::models::{Finding, Severity};

pub const EXIT_OK: i32 = 0;
pub const EXIT_THRESHOLD_EXCEEDED: i32 = 1;

/// Map findings against a `--fail-on` severity and count threshold.
///
/// An empty `fail_on` disables gating entirely. Otherwise findings at or
/// above the named severity are counted; reaching `threshold` yields the
/// non-zero exit code. Unknown severity names rank as `low`.
pub fn compute_exit_code(findings: &[Finding], fail_on: &str, threshold: usize) -> i32 {
    if fail_on.is_empty() {
        return EXIT_OK;
    }

    let min_rank = Severity::parse_lenient(fail_on).rank();
    let count = findings
        .iter()
        .filter(|f| f.severity.rank() >= min_rank)
        .count();

    if count >= threshold {
        EXIT_THRESHOLD_EXCEEDED
    } else {
        EXIT_OK
    }
}

/// Count findings at or above a severity, for threshold reporting.
pub fn count_at_or_above(findings: &[Finding], fail_on: &str) -> usize {
    let min_rank = Severity::parse_lenient(fail_on).rank();
    findings
        .iter()
        .filter(|f| f.severity.rank() >= min_rank)
        .count()
}
