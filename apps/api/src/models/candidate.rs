use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::score::{lenient_timestamp, CandidateRef};

/// One entry of the backend's candidate (resume) collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, alias = "timestamp", deserialize_with = "lenient_timestamp")]
    pub uploaded_at: DateTime<Utc>,
}

impl CandidateRecord {
    pub fn identity_ref(&self) -> CandidateRef {
        CandidateRef {
            internal_id: Some(self.id.clone()),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            filename: self.filename.clone(),
        }
    }
}
