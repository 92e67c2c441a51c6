use crate::models::{AnalysisReport, AnalysisRequest};
use crate::services::metrics;
use crate::startup::AppState;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use service_core::error::AppError;

/// Multipart field carrying the photo.
pub const IMAGE_FIELD: &str = "image";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

pub async fn detect_hairstyle(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisReport>, AppError> {
    let request = match multipart {
        Ok(mut multipart) => read_image(&mut multipart).await?,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Request is not a multipart upload");
            None
        }
    };

    let Some(request) = request else {
        metrics::record_request("no_image");
        return Err(AppError::BadRequest(anyhow::anyhow!("No image uploaded")));
    };

    match state.analyzer.analyze(request).await {
        Ok(report) => {
            metrics::record_request("success");
            Ok(Json(report))
        }
        Err(e) => {
            metrics::record_request(e.outcome());
            Err(e.into())
        }
    }
}

/// Pull the first non-empty `image` field out of the form, ignoring others.
async fn read_image(multipart: &mut Multipart) -> Result<Option<AnalysisRequest>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        metrics::record_request("bad_request");
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("unnamed").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        let data = field.bytes().await.map_err(|e| {
            metrics::record_request("bad_request");
            AppError::BadRequest(anyhow::anyhow!("Failed to read image upload: {}", e))
        })?;

        if data.is_empty() {
            continue;
        }

        tracing::info!(
            file_name = %file_name,
            mime_type = %mime_type,
            size = data.len(),
            "Image received"
        );

        return Ok(Some(AnalysisRequest::new(data.to_vec(), mime_type)));
    }

    Ok(None)
}
