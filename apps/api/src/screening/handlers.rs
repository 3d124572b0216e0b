use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::backend::UploadFile;
use crate::errors::AppError;
use crate::screening::cache::ViewMode;
use crate::screening::scheduler::{Dispatch, ScoredUpload, ScreenView};
use crate::state::AppState;

const RESUME_FIELD: &str = "resume";
const JOB_DESCRIPTION_FIELDS: [&str; 2] = ["job_description", "jd"];

#[derive(Debug, Deserialize)]
pub struct ViewUpdate {
    pub active: Option<bool>,
    pub mode: Option<ViewMode>,
}

fn accepted(dispatch: Dispatch) -> Result<(StatusCode, Json<Dispatch>), AppError> {
    if dispatch.sequence().is_none() {
        return Err(AppError::Unavailable(
            "Screening is shutting down".to_string(),
        ));
    }
    Ok((StatusCode::ACCEPTED, Json(dispatch)))
}

/// GET /api/v1/results
pub async fn handle_get_results(State(state): State<AppState>) -> Json<ScreenView> {
    Json(ScreenView::clone(&state.screening.current()))
}

/// POST /api/v1/refresh
pub async fn handle_refresh(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Dispatch>), AppError> {
    accepted(state.screening.refresh())
}

/// POST /api/v1/score
/// Multipart form with one or more `resume` files and one `job_description`
/// file. Every resume is scored against the same job description.
pub async fn handle_score(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<ScoredUpload>>, AppError> {
    let mut resumes = Vec::new();
    let mut job_description = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let is_resume = name == RESUME_FIELD;
        if !is_resume && !JOB_DESCRIPTION_FIELDS.contains(&name.as_str()) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{name}.pdf"));
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read '{name}': {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::Validation(format!("'{filename}' is empty")));
        }

        let file = UploadFile {
            filename,
            content_type,
            bytes,
        };
        if is_resume {
            resumes.push(file);
        } else if job_description.replace(file).is_some() {
            return Err(AppError::Validation(
                "Only one job description may be uploaded".to_string(),
            ));
        }
    }

    if resumes.is_empty() {
        return Err(AppError::Validation("Missing 'resume' file".to_string()));
    }
    let job_description = job_description
        .ok_or_else(|| AppError::Validation("Missing 'job_description' file".to_string()))?;

    let mut scored = Vec::with_capacity(resumes.len());
    for resume in resumes {
        scored.push(
            state
                .screening
                .score_upload(resume, job_description.clone())
                .await?,
        );
    }
    Ok(Json(scored))
}

/// DELETE /api/v1/candidates/:id
pub async fn handle_delete_candidate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Dispatch>), AppError> {
    accepted(state.screening.delete_candidate(&id).await?)
}

/// DELETE /api/v1/scores/:id
pub async fn handle_delete_score(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Dispatch>), AppError> {
    accepted(state.screening.delete_score(&id).await?)
}

/// POST /api/v1/clear
pub async fn handle_clear(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Dispatch>), AppError> {
    accepted(state.screening.clear_all().await?)
}

/// PUT /api/v1/view
pub async fn handle_set_view(
    State(state): State<AppState>,
    Json(update): Json<ViewUpdate>,
) -> Result<Json<ScreenView>, AppError> {
    let view = state.screening.set_view(update.active, update.mode).await?;
    Ok(Json(ScreenView::clone(&view)))
}
