//! Ranker — stable ordering of classified records by overall_fit.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::screening::aggregator::{AggregatedCandidateRecord, Aggregation};
use crate::screening::classifier::{classify, Tier, TierThresholds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// 1-based position in the ranked list.
    pub rank: usize,
    pub tier: Tier,
    pub record: AggregatedCandidateRecord,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub shortlisted: usize,
    pub waitlisted: usize,
    pub rejected: usize,
    pub not_evaluated: usize,
}

impl TierCounts {
    pub fn tally(ranked: &[RankedCandidate]) -> Self {
        ranked.iter().fold(Self::default(), |mut counts, entry| {
            match entry.tier {
                Tier::Shortlisted => counts.shortlisted += 1,
                Tier::Waitlisted => counts.waitlisted += 1,
                Tier::Rejected => counts.rejected += 1,
                Tier::NotEvaluated => counts.not_evaluated += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.shortlisted + self.waitlisted + self.rejected + self.not_evaluated
    }
}

/// Sorts by overall_fit descending. `sort_by` is stable, so equal scores keep
/// the aggregator's discovery order.
pub fn rank(aggregation: Aggregation, thresholds: &TierThresholds) -> Vec<RankedCandidate> {
    let mut records = aggregation.into_records();
    records.sort_by(|a, b| {
        b.overall_fit
            .partial_cmp(&a.overall_fit)
            .unwrap_or(Ordering::Equal)
    });

    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| RankedCandidate {
            rank: i + 1,
            tier: classify(&record, thresholds),
            record,
        })
        .collect()
}
