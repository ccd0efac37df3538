//! Modification marker comparison.
//!
//! Markers are opaque, time-ordered strings stamped by the remote service
//! (ISO-8601 timestamps in practice). They are only ever compared for
//! recency, lexically.

/// Returns whether `candidate` is strictly newer than `baseline`.
///
/// Both markers must be present; a missing one on either side is never newer.
pub fn is_newer(candidate: Option<&str>, baseline: Option<&str>) -> bool {
    match (candidate, baseline) {
        (Some(candidate), Some(baseline)) => candidate > baseline,
        _ => false,
    }
}
