use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::model::photo_exif::PhotoExif;
use crate::repo::Row;

pub const PHOTOS_TABLE: &str = "photos";
pub const PHOTOS_BUCKET: &str = "photos";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub user_id: String,
    pub image_url: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub taken_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub metadata: PhotoMetadata,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Photo {
    pub fn from_row(row: Row) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::Value::Object(row))
    }

    /// `(latitude, longitude)` when both are set
    pub fn location(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "hasGPS", default)]
    pub has_gps: bool,
}

impl PhotoMetadata {
    pub fn camera(&self) -> Option<String> {
        match (&self.make, &self.model) {
            (Some(make), Some(model)) => Some(format!("{make} {model}")),
            _ => None,
        }
    }
}

/// A photo row before the backend assigns its id and creation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoBody {
    pub user_id: String,
    pub image_url: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub taken_at: Option<OffsetDateTime>,
    pub metadata: PhotoMetadata,
}

impl PhotoBody {
    pub fn new(user_id: String, image_url: String, exif: PhotoExif) -> Self {
        let (latitude, longitude) = exif.location().unzip();

        Self {
            user_id,
            image_url,
            latitude,
            longitude,
            taken_at: exif.taken_at,
            metadata: PhotoMetadata {
                has_gps: exif.has_gps(),
                make: exif.make,
                model: exif.model,
            },
        }
    }

    pub fn into_row(self) -> serde_json::Result<Row> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(row) => Ok(row),
            _ => unreachable!("PhotoBody always serializes to an object"),
        }
    }
}
