//! Segment sequencing: which segment is current, how far into it we are,
//! and when a transition is due.

use std::time::Duration;

use super::program::Segment;

/// Slack applied when mapping remaining script time onto a line slot, so a
/// float that lands a hair above a boundary does not flip the line back.
const SCRIPT_LINE_EPSILON: f64 = 1e-6;

/// Result of one [`advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub index: usize,
    pub elapsed: Duration,
    /// The sequence returned to index 0 during this call.
    pub wrapped: bool,
    /// At least one transition happened during this call.
    pub transitioned: bool,
    /// Time not yet applied because the call stopped at a wrap.
    pub leftover: Duration,
}

/// Fraction of a segment completed, clamped to `[0, 1]`.
/// An instant segment counts as complete.
pub fn progress_ratio(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
}

/// Applies `delta` to the segment at `index`.
///
/// A segment completes once `elapsed + delta >= duration - epsilon`; the
/// surplus carries into the next segment, and instant segments are passed
/// over in the same call. The call stops at the first wrap back to index 0
/// and hands back whatever time it did not consume, so callers observe one
/// wrap at a time.
pub fn advance(
    segments: &[Segment],
    index: usize,
    elapsed: Duration,
    delta: Duration,
    epsilon: Duration,
) -> Advance {
    debug_assert!(!segments.is_empty());

    let mut index = index % segments.len();
    let mut pending = elapsed.saturating_add(delta);
    let mut transitioned = false;

    loop {
        let duration = segments[index].duration();
        if pending.saturating_add(epsilon) < duration {
            return Advance {
                index,
                elapsed: pending,
                wrapped: false,
                transitioned,
                leftover: Duration::ZERO,
            };
        }

        pending = pending.saturating_sub(duration);
        index = (index + 1) % segments.len();
        transitioned = true;

        if index == 0 {
            return Advance {
                index,
                elapsed: Duration::ZERO,
                wrapped: true,
                transitioned,
                leftover: pending,
            };
        }
    }
}

/// Line shown by a script player with `remaining` time left.
///
/// `line_count - ceil(remaining / line_duration)`, clamped to a valid line.
/// As `remaining` shrinks the result never decreases.
pub fn script_line(line_count: usize, line_duration: Duration, remaining: Duration) -> usize {
    if line_count == 0 {
        return 0;
    }
    let last = line_count - 1;
    if line_duration.is_zero() {
        return last;
    }

    let slots = remaining.as_secs_f64() / line_duration.as_secs_f64();
    let slots_left = (slots - SCRIPT_LINE_EPSILON).ceil().max(0.0) as usize;
    line_count.saturating_sub(slots_left).min(last)
}
