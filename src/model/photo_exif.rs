use time::OffsetDateTime;

/// The subset of embedded metadata GeoPhoto keeps. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoExif {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub taken_at: Option<OffsetDateTime>,
    pub make: Option<String>,
    pub model: Option<String>,
}

impl PhotoExif {
    pub fn location(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn has_gps(&self) -> bool {
        self.location().is_some()
    }
}
