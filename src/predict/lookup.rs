//! Date-to-segment lookup.

use crate::core::SegmentRecord;
use crate::error::{Result, YatsmError};

/// Resolution of several segments matching in the same category.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Fail with `AmbiguousSegment`.
    #[default]
    Error,
    /// Segment closest in time to the query date (earliest on equal distance).
    Nearest,
    /// Segment with the earliest start.
    Earliest,
    /// Segment with the latest start.
    Latest,
}

/// Which segments may answer a date query.
///
/// Segments intersecting the date are preferred. Otherwise, when enabled,
/// segments starting after the date are considered, then undisturbed
/// segments that ended before it. When several segments of the chosen
/// category match, `tie_break` decides; the default [`TieBreak::Error`]
/// reports them as ambiguous, so `after` usually pairs with
/// [`TieBreak::Nearest`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookupPolicy {
    /// Allow segments with `end <= date` and no break.
    pub before: bool,
    /// Allow segments with `start >= date`.
    pub after: bool,
    pub tie_break: TieBreak,
}

impl LookupPolicy {
    pub fn before(mut self, enabled: bool) -> Self {
        self.before = enabled;
        self
    }

    pub fn after(mut self, enabled: bool) -> Self {
        self.after = enabled;
        self
    }

    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }
}

fn distance(record: &SegmentRecord, date: i64) -> i64 {
    if date < record.start {
        record.start - date
    } else if date > record.end {
        date - record.end
    } else {
        0
    }
}

fn resolve<'a>(
    candidates: Vec<&'a SegmentRecord>,
    date: i64,
    tie_break: TieBreak,
) -> Result<Option<&'a SegmentRecord>> {
    if candidates.len() <= 1 {
        return Ok(candidates.into_iter().next());
    }
    let chosen = match tie_break {
        TieBreak::Error => {
            return Err(YatsmError::AmbiguousSegment {
                date,
                matches: candidates.len(),
            })
        }
        TieBreak::Nearest => candidates
            .into_iter()
            .min_by_key(|r| (distance(r, date), r.start)),
        TieBreak::Earliest => candidates.into_iter().min_by_key(|r| r.start),
        TieBreak::Latest => candidates.into_iter().max_by_key(|r| r.start),
    };
    Ok(chosen)
}

/// Find the segment answering a query date.
///
/// Returns `Ok(None)` when no segment is eligible.
pub fn find_segment<'a>(
    records: &'a [SegmentRecord],
    date: i64,
    policy: &LookupPolicy,
) -> Result<Option<&'a SegmentRecord>> {
    let intersecting: Vec<&SegmentRecord> = records.iter().filter(|r| r.contains(date)).collect();
    if !intersecting.is_empty() {
        return resolve(intersecting, date, policy.tie_break);
    }

    if policy.after {
        let after: Vec<&SegmentRecord> = records.iter().filter(|r| r.start >= date).collect();
        if !after.is_empty() {
            return resolve(after, date, policy.tie_break);
        }
    }

    if policy.before {
        let before: Vec<&SegmentRecord> = records
            .iter()
            .filter(|r| r.end <= date && !r.has_break())
            .collect();
        return resolve(before, date, policy.tie_break);
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CoefficientMatrix;

    fn record(start: i64, end: i64, break_date: i64) -> SegmentRecord {
        SegmentRecord {
            start,
            end,
            break_date,
            coef: CoefficientMatrix::zeros(2, 1),
            rmse: vec![1.0],
            magnitude: vec![0.0],
            nobs: 12,
            px: 0,
            py: 0,
        }
    }

    fn history() -> Vec<SegmentRecord> {
        vec![
            record(100, 200, 230),
            record(230, 400, 450),
            record(450, 600, 0),
        ]
    }

    #[test]
    fn intersecting_segment_is_found() {
        let records = history();
        let found = find_segment(&records, 300, &LookupPolicy::default()).unwrap();
        assert_eq!(found.map(|r| r.start), Some(230));
    }

    #[test]
    fn gap_without_policy_finds_nothing() {
        let records = history();
        assert!(find_segment(&records, 210, &LookupPolicy::default())
            .unwrap()
            .is_none());
        assert!(find_segment(&records, 50, &LookupPolicy::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn after_policy_uses_following_segment() {
        let records = history();
        let policy = LookupPolicy::default().after(true).tie_break(TieBreak::Nearest);
        let found = find_segment(&records, 210, &policy).unwrap();
        assert_eq!(found.map(|r| r.start), Some(230));
    }

    #[test]
    fn after_policy_is_ambiguous_by_default() {
        let records = history();
        let policy = LookupPolicy::default().after(true);
        assert_eq!(
            find_segment(&records, 210, &policy).unwrap_err(),
            YatsmError::AmbiguousSegment {
                date: 210,
                matches: 2
            }
        );
    }

    #[test]
    fn before_policy_only_uses_undisturbed_segments() {
        let records = history();
        let policy = LookupPolicy::default().before(true);
        assert_eq!(
            find_segment(&records, 700, &policy).unwrap().map(|r| r.start),
            Some(450)
        );
        // Segment ending at 200 was disturbed
        assert!(find_segment(&records, 210, &policy).unwrap().is_none());
    }

    #[test]
    fn after_takes_precedence_over_before() {
        let records = vec![record(100, 200, 0), record(300, 400, 0)];
        let policy = LookupPolicy::default()
            .before(true)
            .after(true)
            .tie_break(TieBreak::Nearest);
        let found = find_segment(&records, 250, &policy).unwrap();
        assert_eq!(found.map(|r| r.start), Some(300));
    }

    #[test]
    fn shared_boundary_uses_tie_break() {
        let records = vec![record(100, 200, 200), record(200, 300, 0)];
        assert!(find_segment(&records, 200, &LookupPolicy::default()).is_err());

        let earliest = LookupPolicy::default().tie_break(TieBreak::Earliest);
        assert_eq!(
            find_segment(&records, 200, &earliest).unwrap().map(|r| r.start),
            Some(100)
        );
        let latest = LookupPolicy::default().tie_break(TieBreak::Latest);
        assert_eq!(
            find_segment(&records, 200, &latest).unwrap().map(|r| r.start),
            Some(200)
        );
    }
}
