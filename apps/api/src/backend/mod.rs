/// Scoring backend client — the single point of contact with the service that
/// stores resumes and runs the AI evaluation.
///
/// The screening pipeline only sees the `ScoringBackend` trait; `HttpBackend`
/// is the reqwest implementation used in deployment.
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::candidate::CandidateRecord;
use crate::models::score::{ScoreEvent, ScoreSource};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Scoring rejected: {0}")]
    Rejected(String),
}

/// One uploaded document forwarded to the batch scoring call.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[async_trait]
pub trait ScoringBackend: Send + Sync {
    async fn fetch_candidates(&self) -> Result<Vec<CandidateRecord>, FetchError>;

    async fn fetch_score_history(&self, candidate_id: &str) -> Result<Vec<ScoreEvent>, FetchError>;

    /// Scores one resume against one job description.
    async fn score_batch(
        &self,
        resume: UploadFile,
        job_description: UploadFile,
    ) -> Result<ScoreEvent, FetchError>;

    /// Removes a candidate and, on the backend side, all of its score events.
    async fn delete_candidate(&self, candidate_id: &str) -> Result<(), FetchError>;

    async fn delete_score(&self, score_id: &str) -> Result<(), FetchError>;

    async fn clear_all(&self) -> Result<(), FetchError>;
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let response = check_status(self.client.get(self.url(path)).send().await?).await?;
        let text = response.text().await?;
        let envelope: DataEnvelope<T> = serde_json::from_str(&text)?;
        Ok(envelope.data)
    }
}

/// Turns a non-2xx response into `FetchError::Backend`, using the FastAPI
/// `detail` field when there is one.
async fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.detail)
        .unwrap_or(body);
    Err(FetchError::Backend {
        status: status.as_u16(),
        message,
    })
}

fn file_part(file: UploadFile) -> Result<Part, FetchError> {
    let part = Part::bytes(file.bytes.to_vec()).file_name(file.filename);
    match file.content_type {
        Some(mime) => Ok(part.mime_str(&mime)?),
        None => Ok(part),
    }
}

#[async_trait]
impl ScoringBackend for HttpBackend {
    async fn fetch_candidates(&self) -> Result<Vec<CandidateRecord>, FetchError> {
        let candidates: Vec<CandidateRecord> = self.get_data("/api/resumes").await?;
        debug!("Fetched {} candidates", candidates.len());
        Ok(candidates)
    }

    async fn fetch_score_history(&self, candidate_id: &str) -> Result<Vec<ScoreEvent>, FetchError> {
        let events: Vec<ScoreEvent> = self
            .get_data(&format!("/api/resumes/{candidate_id}/scores"))
            .await?;
        Ok(events
            .into_iter()
            .map(|e| e.with_source(ScoreSource::HistoryPoll))
            .collect())
    }

    async fn score_batch(
        &self,
        resume: UploadFile,
        job_description: UploadFile,
    ) -> Result<ScoreEvent, FetchError> {
        let resume_name = resume.filename.clone();
        let jd_name = job_description.filename.clone();
        let form = Form::new()
            .part("resume", file_part(resume)?)
            .part("jd", file_part(job_description)?);

        let response = check_status(
            self.client
                .post(self.url("/api/score_files"))
                .multipart(form)
                .send()
                .await?,
        )
        .await?;
        let body: BatchResponse = serde_json::from_str(&response.text().await?)?;

        if let Some(status) = body.status.as_deref() {
            if status != "success" {
                return Err(FetchError::Rejected(format!(
                    "scoring {resume_name} returned status '{status}'"
                )));
            }
        }

        let mut event: ScoreEvent = serde_json::from_value(serde_json::Value::Object(body.rest))?;
        if event.filename.is_none() {
            event.filename = Some(resume_name);
        }
        if event.jd_filename.is_none() {
            event.jd_filename = Some(jd_name);
        }
        Ok(event.with_source(ScoreSource::BatchUpload))
    }

    async fn delete_candidate(&self, candidate_id: &str) -> Result<(), FetchError> {
        check_status(
            self.client
                .delete(self.url(&format!("/api/resumes/{candidate_id}")))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn delete_score(&self, score_id: &str) -> Result<(), FetchError> {
        check_status(
            self.client
                .delete(self.url(&format!("/api/scores/{score_id}")))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), FetchError> {
        check_status(
            self.client
                .post(self.url("/api/clear_database"))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_envelope_unwraps_candidates() {
        let body = json!({ "status": "success", "data": [
            { "_id": "r1", "filename": "a.pdf", "name": "A" },
            { "_id": "r2", "filename": "b.pdf" }
        ]});
        let envelope: DataEnvelope<Vec<CandidateRecord>> =
            serde_json::from_value(body).unwrap();
        assert_eq!(envelope.data.len(), 2);
        assert_eq!(envelope.data[1].id, "r2");
    }

    #[test]
    fn test_batch_response_splits_status_from_event() {
        let body: BatchResponse = serde_json::from_value(json!({
            "status": "success",
            "resume_id": "r9",
            "name": "Jane",
            "overall_fit": 7.8,
            "is_shortlisted": true
        }))
        .unwrap();
        assert_eq!(body.status.as_deref(), Some("success"));

        let event: ScoreEvent =
            serde_json::from_value(serde_json::Value::Object(body.rest)).unwrap();
        assert_eq!(event.internal_id.as_deref(), Some("r9"));
        assert_eq!(event.display_name.as_deref(), Some("Jane"));
        assert_eq!(event.overall_fit, Some(7.8));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let backend =
            HttpBackend::new("http://localhost:8000/", std::time::Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("/api/resumes"), "http://localhost:8000/api/resumes");
    }
}
