use super::AppState;
use crate::error::ApiError;
use ai::{generate_caption, CaptionOutput, FinishReason};
use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use std::path::Path;

pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionResponse {
    pub caption: String,
    /// `caption` as the page shows it.
    pub display_caption: String,
    pub finish_reason: FinishReason,
    pub token_count: usize,
    pub width: u32,
    pub height: u32,
    pub processing_time_ms: u64,
}

impl From<CaptionOutput> for CaptionResponse {
    fn from(output: CaptionOutput) -> Self {
        Self {
            display_caption: capitalize(&output.caption.text),
            caption: output.caption.text,
            finish_reason: output.caption.finish_reason,
            token_count: output.caption.token_count,
            width: output.image.width(),
            height: output.image.height(),
            processing_time_ms: output.processing_time_ms,
        }
    }
}

/// Upper case the first character and lower case the rest.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn is_accepted_file_name(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(Upload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::BadRequest(
        "Upload an image to get started.".to_string(),
    ))
}

/// POST /api/caption, multipart form with one `file` field.
pub async fn caption_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CaptionResponse>, ApiError> {
    let upload = read_upload(&mut multipart).await?;

    if !is_accepted_file_name(&upload.file_name) {
        return Err(ApiError::BadRequest(format!(
            "'{}' is not supported, choose a .jpg, .jpeg or .png file",
            upload.file_name
        )));
    }
    tracing::debug!(
        "received {} ({} bytes)",
        upload.file_name,
        upload.bytes.len()
    );

    // generation blocks for seconds, keep it off the async workers
    let captioner = state.captioner.clone();
    let output = tokio::task::spawn_blocking(move || {
        generate_caption(&upload.bytes, captioner.as_ref())
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(output.into()))
}
