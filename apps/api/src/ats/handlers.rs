use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::info;

use crate::ats::scoring::AtsReport;
use crate::chat::models::UploadedPart;
use crate::documents::loader::load_document;
use crate::errors::AppError;
use crate::state::AppState;

/// POST /ats_score
///
/// Multipart form: `job_description` (text) and `file` (the resume).
pub async fn handle_ats_score(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AtsReport>, AppError> {
    let mut job_description = None;
    let mut resume = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "job_description" => job_description = Some(field.text().await?),
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                if !file_name.is_empty() {
                    resume = Some(UploadedPart { file_name, bytes });
                }
            }
            _ => {}
        }
    }

    let job_description = job_description
        .filter(|jd| !jd.trim().is_empty())
        .ok_or_else(|| AppError::Validation("No job description provided".to_string()))?;
    let resume = resume.ok_or_else(|| AppError::Validation("No resume file provided".to_string()))?;

    let stored = state.uploads.save(&resume.file_name, &resume.bytes).await?;
    let resume_text = load_document(&stored)
        .await?
        .into_iter()
        .map(|d| d.text)
        .collect::<Vec<_>>()
        .join("\n\n");
    if resume_text.is_empty() {
        return Err(AppError::Validation(format!(
            "No text could be extracted from {}",
            stored.display_name
        )));
    }

    let report = state.ats_scorer.score(&resume_text, &job_description).await?;
    info!(
        "ATS score for {}: {:?} ({})",
        stored.display_name, report.score, report.scorer_backend
    );

    Ok(Json(report))
}
