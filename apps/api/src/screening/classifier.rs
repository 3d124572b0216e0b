//! Classifier — maps an aggregated record to a decision tier.
//!
//! Policy, in order:
//! 1. no score data and no explicit shortlist → `NotEvaluated`
//! 2. explicit shortlist, or overall_fit ≥ `shortlist` → `Shortlisted`
//! 3. overall_fit ≥ `waitlist` → `Waitlisted`
//! 4. otherwise → `Rejected`
//!
//! The boundaries come from configuration; 7.0 and 6.5 unless overridden.

use serde::{Deserialize, Serialize};

use crate::screening::aggregator::AggregatedCandidateRecord;

pub const DEFAULT_SHORTLIST_THRESHOLD: f64 = 7.0;
pub const DEFAULT_WAITLIST_THRESHOLD: f64 = 6.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Shortlisted,
    Waitlisted,
    Rejected,
    NotEvaluated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub shortlist: f64,
    pub waitlist: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            shortlist: DEFAULT_SHORTLIST_THRESHOLD,
            waitlist: DEFAULT_WAITLIST_THRESHOLD,
        }
    }
}

impl TierThresholds {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

pub fn classify(record: &AggregatedCandidateRecord, thresholds: &TierThresholds) -> Tier {
    let event = &record.event;
    if !event.has_scores() && event.shortlisted != Some(true) {
        return Tier::NotEvaluated;
    }

    let fit = record.overall_fit;
    if event.shortlisted == Some(true) || fit >= thresholds.shortlist {
        Tier::Shortlisted
    } else if fit >= thresholds.waitlist {
        Tier::Waitlisted
    } else {
        Tier::Rejected
    }
}
