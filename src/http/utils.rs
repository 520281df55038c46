use axum::extract::Multipart;
use tracing::debug;

use crate::backend::Backend;
use crate::http::AppStateRef;
use crate::http::error::{HttpError, HttpResult};
use crate::upload::SelectedFile;

/// Id of the signed in user, or 401
pub fn require_user(state: AppStateRef) -> HttpResult<String> {
    state
        .backend
        .sessions()
        .current_user_id()
        .ok_or(HttpError::Unauthorized)
}

/// Reads the first multipart field into memory.
pub async fn read_first_field(mut payload: Multipart) -> HttpResult<SelectedFile> {
    let mut field = payload
        .next_field()
        .await?
        .ok_or_else(|| HttpError::BadRequest("Multipart is empty".to_string()))?;

    let name = field
        .file_name()
        .or(field.name())
        .ok_or_else(|| HttpError::BadRequest("Multipart has no name".to_string()))?
        .to_string();
    let content_type = field.content_type().map(str::to_string);

    let mut content = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        content.extend_from_slice(&chunk);
    }
    debug!("Received `{name}` ({} bytes)", content.len());

    Ok(SelectedFile::new(name, content_type, content))
}
