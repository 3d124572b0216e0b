//! Fixtures shared by the screening tests.

use chrono::{DateTime, Utc};

use crate::models::candidate::CandidateRecord;
use crate::models::score::{ScoreEvent, ScoreSource, SeniorityLevel};

pub fn event(id: &str, overall_fit: Option<f64>) -> ScoreEvent {
    ScoreEvent {
        score_id: None,
        internal_id: Some(id.to_string()),
        display_name: None,
        email: None,
        filename: None,
        skills_match: None,
        experience_relevance: None,
        education_fit: None,
        overall_fit,
        seniority_level: SeniorityLevel::Unknown,
        job_title: None,
        justification: None,
        jd_id: None,
        jd_filename: None,
        timestamp: DateTime::<Utc>::default(),
        shortlisted: None,
        source: ScoreSource::HistoryPoll,
    }
}

pub fn flagged(id: &str, overall_fit: Option<f64>, shortlisted: Option<bool>) -> ScoreEvent {
    ScoreEvent {
        shortlisted,
        ..event(id, overall_fit)
    }
}

pub fn candidate(id: &str) -> CandidateRecord {
    CandidateRecord {
        id: id.to_string(),
        display_name: Some(format!("Candidate {id}")),
        email: None,
        filename: Some(format!("{id}.pdf")),
        uploaded_at: DateTime::<Utc>::default(),
    }
}
