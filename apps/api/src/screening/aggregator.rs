//! Aggregator — folds raw score events into one best record per candidate.
//!
//! A record is replaced only when a later event has a strictly greater
//! overall_fit, so on ties the first-discovered event is kept. Missing or
//! non-finite overall_fit counts as 0; malformed events are never rejected.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::score::ScoreEvent;
use crate::screening::identity::{resolve, CandidateIdentity};

/// The best event seen for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCandidateRecord {
    pub identity: CandidateIdentity,
    pub event: ScoreEvent,
    /// overall_fit after coercion; this is what ranking and tiers read.
    pub overall_fit: f64,
    /// Number of events folded into this identity, the kept one included.
    pub events_seen: usize,
}

/// Records in the order their identities were first discovered.
#[derive(Debug, Default, Clone)]
pub struct Aggregation {
    records: Vec<AggregatedCandidateRecord>,
    index: HashMap<CandidateIdentity, usize>,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: ScoreEvent) {
        let identity = resolve(&event.candidate());
        let overall_fit = event.effective_overall_fit();

        match self.index.get(&identity) {
            Some(&slot) => {
                let existing = &mut self.records[slot];
                existing.events_seen += 1;
                if overall_fit > existing.overall_fit {
                    existing.event = event;
                    existing.overall_fit = overall_fit;
                }
            }
            None => {
                self.index.insert(identity.clone(), self.records.len());
                self.records.push(AggregatedCandidateRecord {
                    identity,
                    event,
                    overall_fit,
                    events_seen: 1,
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AggregatedCandidateRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<AggregatedCandidateRecord> {
        self.records
    }
}

/// Single pass over `events`.
pub fn fold<I>(events: I) -> Aggregation
where
    I: IntoIterator<Item = ScoreEvent>,
{
    let mut aggregation = Aggregation::new();
    for event in events {
        aggregation.push(event);
    }
    aggregation
}
