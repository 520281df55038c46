use tracing::warn;

use crate::backend::query::Query;
use crate::backend::{Backend, BackendError};
use crate::model::photo::{PHOTOS_TABLE, Photo, PhotoBody};
use crate::repo::Row;

/// Typed access to the photos table through whichever backend is active.
pub struct PhotosRepository<'a, B> {
    backend: &'a B,
}

impl<'a, B: Backend> PhotosRepository<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Newest first
    pub async fn get_photos_by_user(&self, user_id: &str) -> Result<Vec<Photo>, BackendError> {
        let rows = self
            .backend
            .execute(
                &Query::from(PHOTOS_TABLE)
                    .select("*")
                    .eq("user_id", user_id)
                    .order("created_at", false),
            )
            .await?
            .into_rows();

        Ok(decode_photos(rows))
    }

    pub async fn get_photo(&self, photo_id: &str) -> Result<Option<Photo>, BackendError> {
        let rows = self
            .backend
            .execute(
                &Query::from(PHOTOS_TABLE)
                    .select("*")
                    .eq("id", photo_id)
                    .single(),
            )
            .await?
            .into_rows();

        Ok(decode_photos(rows).into_iter().next())
    }

    pub async fn insert_photo(&self, photo: PhotoBody) -> Result<Photo, BackendError> {
        let row = self
            .backend
            .execute(&Query::from(PHOTOS_TABLE).insert(photo.into_row()?))
            .await?
            .into_rows()
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NothingInserted(PHOTOS_TABLE.to_string()))?;

        Ok(Photo::from_row(row)?)
    }

    pub async fn delete_photo(&self, photo_id: &str) -> Result<(), BackendError> {
        self.backend
            .execute(&Query::from(PHOTOS_TABLE).delete().eq("id", photo_id))
            .await
            .map(|_| ())
    }
}

fn decode_photos(rows: Vec<Row>) -> Vec<Photo> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").cloned();
            Photo::from_row(row)
                .inspect_err(|e| warn!("Skipping malformed photo row {id:?}: {e}"))
                .ok()
        })
        .collect()
}
