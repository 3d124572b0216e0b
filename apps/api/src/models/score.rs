use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Identifying attributes of a candidate as carried on a score event.
/// Every field is optional; identity resolution picks the first usable one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateRef {
    pub internal_id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub filename: Option<String>,
}

impl CandidateRef {
    /// Fills any missing attribute from `other`, keeping the ones already set.
    pub fn or_from(mut self, other: &CandidateRef) -> Self {
        fn fill(slot: &mut Option<String>, from: &Option<String>) {
            let blank = slot.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true);
            if blank && from.is_some() {
                *slot = from.clone();
            }
        }
        fill(&mut self.internal_id, &other.internal_id);
        fill(&mut self.display_name, &other.display_name);
        fill(&mut self.email, &other.email);
        fill(&mut self.filename, &other.filename);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeniorityLevel {
    Junior,
    Mid,
    Senior,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Where a score event came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    BatchUpload,
    #[default]
    HistoryPoll,
}

/// One evaluation outcome for a resume against a job description.
///
/// Scores are `None` when the backend omitted them. A score that was sent
/// but could not be read as a number is kept as `Some(NaN)` so that the
/// record still counts as scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    /// Backend id of this score document, when it has been persisted.
    #[serde(default, alias = "_id")]
    pub score_id: Option<String>,
    #[serde(default, alias = "resume_id")]
    pub internal_id: Option<String>,
    #[serde(default, alias = "candidate_name", alias = "name")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "resume_filename", alias = "resumeName")]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "lenient_score", serialize_with = "write_score")]
    pub skills_match: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score", serialize_with = "write_score")]
    pub experience_relevance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score", serialize_with = "write_score")]
    pub education_fit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score", serialize_with = "write_score")]
    pub overall_fit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_seniority")]
    pub seniority_level: SeniorityLevel,
    #[serde(default)]
    pub job_title: Option<String>,
    /// The evaluator's explanation of the scores, shown to the recruiter.
    #[serde(default)]
    pub justification: Option<String>,
    /// Job description this resume was scored against.
    #[serde(default)]
    pub jd_id: Option<String>,
    #[serde(default)]
    pub jd_filename: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// `None` means nobody has decided yet; `Some(false)` is an explicit no.
    #[serde(default, alias = "is_shortlisted", deserialize_with = "lenient_flag")]
    pub shortlisted: Option<bool>,
    #[serde(default)]
    pub source: ScoreSource,
}

impl ScoreEvent {
    pub fn candidate(&self) -> CandidateRef {
        CandidateRef {
            internal_id: self.internal_id.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            filename: self.filename.clone(),
        }
    }

    /// Fills missing identifying attributes from the candidate record the
    /// event was fetched for.
    pub fn with_candidate_defaults(mut self, candidate: &CandidateRef) -> Self {
        let merged = self.candidate().or_from(candidate);
        self.internal_id = merged.internal_id;
        self.display_name = merged.display_name;
        self.email = merged.email;
        self.filename = merged.filename;
        self
    }

    /// True when at least one of the four scores was sent.
    pub fn has_scores(&self) -> bool {
        [
            self.skills_match,
            self.experience_relevance,
            self.education_fit,
            self.overall_fit,
        ]
        .iter()
        .any(Option::is_some)
    }

    /// overall_fit with missing and non-finite values read as 0.
    pub fn effective_overall_fit(&self) -> f64 {
        coerce_score(self.overall_fit)
    }

    pub fn with_source(mut self, source: ScoreSource) -> Self {
        self.source = source;
        self
    }
}

pub fn coerce_score(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        Some(v) => {
            tracing::debug!("Coercing non-finite score {v} to 0");
            0.0
        }
        None => 0.0,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient field readers. Backend records are produced by an LLM pipeline and
// are not trusted to be well-typed, so these never reject a record.
// ────────────────────────────────────────────────────────────────────────────

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(n.as_f64().unwrap_or(f64::NAN)),
        Some(Value::String(s)) => Some(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
        Some(_) => Some(f64::NAN),
    })
}

// JSON has no NaN; non-finite values are written as a string so that the
// lenient reader brings them back as present-but-malformed.
fn write_score<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(v) if v.is_finite() => serializer.serialize_f64(*v),
        Some(_) => serializer.serialize_str("NaN"),
        None => serializer.serialize_none(),
    }
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn lenient_seniority<'de, D>(deserializer: D) -> Result<SeniorityLevel, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "junior" => SeniorityLevel::Junior,
            "mid" | "mid-level" | "mid_level" => SeniorityLevel::Mid,
            "senior" => SeniorityLevel::Senior,
            _ => SeniorityLevel::Unknown,
        },
        _ => SeniorityLevel::Unknown,
    })
}

pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_timestamp(&s).unwrap_or_default(),
        _ => DateTime::<Utc>::default(),
    })
}

/// Accepts RFC 3339 and offset-less ISO-8601 (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
