//! Grid and map renditions of a photo listing, computed as plain data for
//! whichever front-end draws them.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::model::photo::Photo;

pub const NO_LOCATION: &str = "No location data";
pub const EMPTY_GALLERY: &str = "No photos yet. Upload your first photo to get started!";
pub const EMPTY_MAP: &str =
    "No photos with location data yet. Upload photos with GPS information to see them on the map!";

pub const DEFAULT_CENTER: (f64, f64) = (20.0, 0.0);
pub const DEFAULT_ZOOM: u8 = 2;
pub const PHOTOS_ZOOM: u8 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    Map,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCard {
    pub id: String,
    pub image_url: String,
    /// Rounded coordinates, or [`NO_LOCATION`]
    pub location: String,
    pub has_location: bool,
    pub taken_on: Option<String>,
    pub camera: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridView {
    pub cards: Vec<GridCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub photo_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
    pub image_url: String,
    pub taken_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center: (f64, f64),
    pub zoom: u8,
    pub markers: Vec<MapMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<&'static str>,
}

pub fn format_location(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.4}, {longitude:.4}")
}

fn format_date(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

impl GridCard {
    pub fn from_photo(photo: &Photo) -> Self {
        let location = photo.location();

        Self {
            id: photo.id.clone(),
            image_url: photo.image_url.clone(),
            location: location
                .map(|(latitude, longitude)| format_location(latitude, longitude))
                .unwrap_or_else(|| NO_LOCATION.to_string()),
            has_location: location.is_some(),
            taken_on: photo.taken_at.map(format_date),
            camera: photo.metadata.camera(),
        }
    }
}

impl GridView {
    pub fn new(photos: &[Photo]) -> Self {
        Self {
            cards: photos.iter().map(GridCard::from_photo).collect(),
            empty_message: photos.is_empty().then_some(EMPTY_GALLERY),
        }
    }
}

impl MapView {
    /// Centers on the mean of the geotagged photos, or shows the world when
    /// there are none.
    pub fn new(photos: &[Photo]) -> Self {
        let markers: Vec<MapMarker> = photos
            .iter()
            .filter_map(|photo| {
                let (latitude, longitude) = photo.location()?;
                Some(MapMarker {
                    photo_id: photo.id.clone(),
                    latitude,
                    longitude,
                    label: format_location(latitude, longitude),
                    image_url: photo.image_url.clone(),
                    taken_on: photo.taken_at.map(format_date),
                })
            })
            .collect();

        if markers.is_empty() {
            return Self {
                center: DEFAULT_CENTER,
                zoom: DEFAULT_ZOOM,
                markers,
                overlay: Some(EMPTY_MAP),
            };
        }

        let count = markers.len() as f64;
        let latitude = markers.iter().map(|m| m.latitude).sum::<f64>() / count;
        let longitude = markers.iter().map(|m| m.longitude).sum::<f64>() / count;

        Self {
            center: (latitude, longitude),
            zoom: PHOTOS_ZOOM,
            markers,
            overlay: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PhotoView {
    Grid(GridView),
    Map(MapView),
}

impl PhotoView {
    pub fn new(mode: ViewMode, photos: &[Photo]) -> Self {
        match mode {
            ViewMode::Grid => PhotoView::Grid(GridView::new(photos)),
            ViewMode::Map => PhotoView::Map(MapView::new(photos)),
        }
    }
}
