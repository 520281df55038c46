pub mod photo;
pub mod photo_exif;
pub mod user;
