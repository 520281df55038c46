use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::backend::{Backend, BackendError};
use crate::model::photo::{PHOTOS_BUCKET, Photo, PhotoBody};
use crate::repo::PhotosRepository;
use crate::utils::exif::read_photo_exif;

pub const NO_GPS_WARNING: &str = "No GPS data found in photo EXIF";

/// What to do with a photo that carries no GPS position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GpsPolicy {
    /// Keep the photo and report a warning
    #[default]
    Warn,
    Require,
}

impl FromStr for GpsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "require" => Ok(Self::Require),
            other => Err(format!("unknown GPS policy `{other}`, expected warn or require")),
        }
    }
}

impl fmt::Display for GpsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GpsPolicy::Warn => "warn",
            GpsPolicy::Require => "require",
        })
    }
}

#[derive(Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    /// As declared by the client, if it declared one
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.content.len())
            .finish()
    }
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: Option<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.filter(|content_type| !content_type.is_empty()),
            content,
        }
    }

    pub fn content_type(&self) -> String {
        self.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        })
    }

    pub fn is_image(&self) -> bool {
        self.content_type().starts_with("image/")
    }

    /// Text after the last `.`, or the whole name when there is none
    pub fn extension(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadState {
    #[default]
    Idle,
    Uploading,
    Success,
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Please select an image file")]
    NotAnImage,
    #[error("No file selected")]
    NoFileSelected,
    #[error("You must be signed in to upload photos")]
    NotSignedIn,
    #[error("No GPS data found in photo EXIF")]
    MissingLocation,
    #[error("Metadata extraction failed: {0}")]
    Extraction(#[from] JoinError),
    #[error("Upload failed: {0}")]
    Storage(#[source] BackendError),
    #[error("Saving photo failed: {0}")]
    Insert(#[source] BackendError),
}

impl UploadError {
    /// Rejected before anything was attempted. A missing location under
    /// [`GpsPolicy::Require`] is found while uploading, so it counts as a
    /// failed upload instead.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UploadError::NotAnImage | UploadError::NoFileSelected | UploadError::NotSignedIn
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub photo: Photo,
    /// Non-fatal problem worth showing to the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Drives one file from selection to a stored photo row.
pub struct UploadWorkflow<'a, B> {
    backend: &'a B,
    gps_policy: GpsPolicy,
    state: UploadState,
    selected: Option<SelectedFile>,
}

impl<'a, B: Backend> UploadWorkflow<'a, B> {
    pub fn new(backend: &'a B, gps_policy: GpsPolicy) -> Self {
        Self {
            backend,
            gps_policy,
            state: UploadState::Idle,
            selected: None,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    /// Non-image files are rejected and leave the previous selection alone.
    pub fn select(&mut self, file: SelectedFile) -> Result<(), UploadError> {
        if !file.is_image() {
            return Err(UploadError::NotAnImage);
        }

        self.selected = Some(file);
        self.state = UploadState::Idle;
        Ok(())
    }

    /// Uploads the selected file. Validation failures keep the workflow idle,
    /// anything failing later moves it to [`UploadState::Failed`].
    pub async fn upload(
        &mut self,
        on_success: impl FnOnce(),
    ) -> Result<UploadOutcome, UploadError> {
        let Some(file) = self.selected.clone() else {
            return Err(UploadError::NoFileSelected);
        };
        let Some(user_id) = self.backend.sessions().current_user_id() else {
            return Err(UploadError::NotSignedIn);
        };

        self.state = UploadState::Uploading;

        match self.store(&user_id, file).await {
            Ok(outcome) => {
                info!("Uploaded photo `{}`", outcome.photo.id);
                self.state = UploadState::Success;
                self.selected = None;
                on_success();
                Ok(outcome)
            }
            Err(e) => {
                warn!("Upload failed: {e}");
                self.state = UploadState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn store(
        &self,
        user_id: &str,
        file: SelectedFile,
    ) -> Result<UploadOutcome, UploadError> {
        let content_type = file.content_type();
        let path = format!(
            "{user_id}/{}.{}",
            OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000,
            file.extension()
        );

        let SelectedFile { content, .. } = file;
        let (content, exif) = tokio::task::spawn_blocking(move || {
            let exif = read_photo_exif(&content);
            (content, exif)
        })
        .await?;

        let warning = if exif.has_gps() {
            None
        } else {
            match self.gps_policy {
                GpsPolicy::Warn => {
                    warn!("{NO_GPS_WARNING}: {path}");
                    Some(NO_GPS_WARNING.to_string())
                }
                GpsPolicy::Require => return Err(UploadError::MissingLocation),
            }
        };

        let stored_path = self
            .backend
            .upload(PHOTOS_BUCKET, &path, &content, &content_type)
            .await
            .map_err(UploadError::Storage)?;
        let image_url = self
            .backend
            .public_url(PHOTOS_BUCKET, &stored_path)
            .await
            .map_err(UploadError::Storage)?;

        let photo = PhotosRepository::new(self.backend)
            .insert_photo(PhotoBody::new(user_id.to_string(), image_url, exif))
            .await
            .map_err(UploadError::Insert)?;

        Ok(UploadOutcome { photo, warning })
    }
}
