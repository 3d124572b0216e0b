pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::screening::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Screening read side
        .route("/api/v1/results", get(handlers::handle_get_results))
        .route("/api/v1/view", put(handlers::handle_set_view))
        // Triggers
        .route("/api/v1/refresh", post(handlers::handle_refresh))
        .route("/api/v1/score", post(handlers::handle_score))
        .route(
            "/api/v1/candidates/:id",
            delete(handlers::handle_delete_candidate),
        )
        .route("/api/v1/scores/:id", delete(handlers::handle_delete_score))
        .route("/api/v1/clear", post(handlers::handle_clear))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::backend::{FetchError, ScoringBackend, UploadFile};
    use crate::models::candidate::CandidateRecord;
    use crate::models::score::ScoreEvent;
    use crate::screening::cache::ResultCache;
    use crate::screening::scheduler::{SchedulerSettings, ScreeningContext};
    use crate::store::MemoryStore;

    /// Backend with an empty collection. Scores every resume 7.5 except files
    /// named `unreadable*`, which it rejects.
    struct EmptyBackend;

    #[async_trait]
    impl ScoringBackend for EmptyBackend {
        async fn fetch_candidates(&self) -> Result<Vec<CandidateRecord>, FetchError> {
            Ok(Vec::new())
        }

        async fn fetch_score_history(&self, _: &str) -> Result<Vec<ScoreEvent>, FetchError> {
            Ok(Vec::new())
        }

        async fn score_batch(
            &self,
            resume: UploadFile,
            job_description: UploadFile,
        ) -> Result<ScoreEvent, FetchError> {
            if resume.filename.starts_with("unreadable") {
                return Err(FetchError::Rejected("no text could be extracted".to_string()));
            }
            Ok(serde_json::from_value(json!({
                "resume_filename": resume.filename,
                "jd_filename": job_description.filename,
                "overall_fit": 7.5
            }))?)
        }

        async fn delete_candidate(&self, id: &str) -> Result<(), FetchError> {
            Err(FetchError::Backend {
                status: 404,
                message: format!("Resume {id} not found"),
            })
        }

        async fn delete_score(&self, _: &str) -> Result<(), FetchError> {
            Ok(())
        }

        async fn clear_all(&self) -> Result<(), FetchError> {
            Ok(())
        }
    }

    async fn app() -> Router {
        let cache = ResultCache::new(Arc::new(MemoryStore::new()));
        let screening =
            ScreeningContext::activate(Arc::new(EmptyBackend), cache, SchedulerSettings::default())
                .await;
        build_router(AppState { screening })
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multipart(parts: &[(&str, &str, &str)]) -> Request<Body> {
        let boundary = "screener-test-boundary";
        let mut body = String::new();
        for (field, filename, content) in parts {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));

        Request::post("/api/v1/score")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_results_exposes_screen_view() {
        let response = app()
            .await
            .oneshot(Request::get("/api/v1/results").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["results"].as_array().unwrap().is_empty());
        assert_eq!(body["view_mode"], "table");
        assert_eq!(body["counts"]["shortlisted"], 0);
    }

    #[tokio::test]
    async fn test_refresh_is_accepted() {
        let response = app()
            .await
            .oneshot(Request::post("/api/v1/refresh").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert!(body["sequence"].as_u64().unwrap() >= 2);
    }

    #[tokio::test]
    async fn test_score_requires_job_description() {
        let response = app()
            .await
            .oneshot(multipart(&[("resume", "jane.pdf", "%PDF-1.4 jane")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_rejected_scoring_maps_to_unprocessable() {
        let response = app()
            .await
            .oneshot(multipart(&[
                ("resume", "unreadable.pdf", "%PDF-1.4 ???"),
                ("job_description", "role.pdf", "%PDF-1.4 role"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["error"]["code"], "SCORING_REJECTED");
    }

    #[tokio::test]
    async fn test_every_resume_is_scored_against_the_job_description() {
        let response = app()
            .await
            .oneshot(multipart(&[
                ("resume", "alice.pdf", "%PDF-1.4 alice"),
                ("resume", "bob.pdf", "%PDF-1.4 bob"),
                ("jd", "role.pdf", "%PDF-1.4 role"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let scored = body.as_array().unwrap();
        let files: Vec<_> = scored
            .iter()
            .map(|s| s["event"]["filename"].as_str().unwrap())
            .collect();
        assert_eq!(files, vec!["alice.pdf", "bob.pdf"]);
        assert!(scored
            .iter()
            .all(|s| s["event"]["jd_filename"] == "role.pdf" && s["tier"] == "shortlisted"));
    }

    #[tokio::test]
    async fn test_second_job_description_is_rejected() {
        let response = app()
            .await
            .oneshot(multipart(&[
                ("resume", "alice.pdf", "%PDF-1.4 alice"),
                ("job_description", "role.pdf", "%PDF-1.4 role"),
                ("jd", "other.pdf", "%PDF-1.4 other"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_unknown_candidate_is_not_found() {
        let response = app()
            .await
            .oneshot(
                Request::delete("/api/v1/candidates/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_set_view_mode() {
        let response = app()
            .await
            .oneshot(
                Request::put("/api/v1/view")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"mode":"card","active":false}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["view_mode"], "card");
        assert_eq!(body["view_active"], false);
    }

    #[tokio::test]
    async fn test_set_view_rejects_unknown_mode() {
        let response = app()
            .await
            .oneshot(
                Request::put("/api/v1/view")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"mode":"grid"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
