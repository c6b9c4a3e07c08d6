//! Multipart form helpers

use axum::extract::Multipart;
use shared::error::{AppError, AppResult, ErrorCode};

use crate::services::storage::UploadedFile;

/// Read the file sent under `field`, skipping any other parts
///
/// Returns `None` when the form has no such part.
pub async fn read_file_field(multipart: &mut Multipart, field: &str) -> AppResult<Option<UploadedFile>> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart request: {e}")))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let filename = part
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation(format!("Field '{field}' must be a file")))?;
        let data = part.bytes().await.map_err(|e| {
            AppError::with_message(ErrorCode::FileTooLarge, format!("Could not read upload: {e}"))
        })?;
        return Ok(Some(UploadedFile {
            filename,
            data: data.to_vec(),
        }));
    }
    Ok(None)
}

/// Like [`read_file_field`], failing with `NoFileProvided` when absent
pub async fn require_file_field(multipart: &mut Multipart, field: &str) -> AppResult<UploadedFile> {
    read_file_field(multipart, field).await?.ok_or_else(|| {
        AppError::with_message(
            ErrorCode::NoFileProvided,
            format!("No file uploaded. Field name must be '{field}'"),
        )
    })
}
