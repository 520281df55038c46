#![allow(dead_code)]

use std::io::Cursor;

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use geophoto::backend::{AnyBackend, MockBackend};
use geophoto::http::{AppState, AppStateRef};
use geophoto::repo::{KeyValueRepository, TableStore, connect_in_memory};
use geophoto::session::SessionManager;
use geophoto::upload::GpsPolicy;

pub async fn mock_backend() -> MockBackend {
    let pool = connect_in_memory().await.unwrap();
    MockBackend::new(TableStore::new(KeyValueRepository::new(pool)), SessionManager::new())
        .await
        .unwrap()
}

pub async fn app_state() -> AppStateRef {
    let state = AppState::new(AnyBackend::Mock(mock_backend().await), GpsPolicy::Warn);
    Box::leak(Box::new(state))
}

fn ascii(tag: Tag, text: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![text.as_bytes().to_vec()]),
    }
}

/// Decimal degrees written as `degrees/10000` with zero minutes and seconds
fn degrees(tag: Tag, ten_thousandths: u32) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Rational(vec![
            Rational::from((ten_thousandths, 10000)),
            Rational::from((0, 1)),
            Rational::from((0, 1)),
        ]),
    }
}

fn jpeg(fields: &[Field]) -> Vec<u8> {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend(((2 + 6 + tiff.len()) as u16).to_be_bytes());
    jpeg.extend(b"Exif\0\0");
    jpeg.extend(tiff);
    jpeg.extend([0xFF, 0xD9]);
    jpeg
}

/// A JPEG tagged at (1.2345, 2.3456) taken with a Pixel 8
pub fn geotagged_jpeg() -> Vec<u8> {
    jpeg(&[
        ascii(Tag::Make, "Google"),
        ascii(Tag::Model, "Pixel 8"),
        ascii(Tag::DateTimeOriginal, "2024:03:04 05:06:07"),
        ascii(Tag::GPSLatitudeRef, "N"),
        degrees(Tag::GPSLatitude, 12345),
        ascii(Tag::GPSLongitudeRef, "E"),
        degrees(Tag::GPSLongitude, 23456),
    ])
}

pub fn untagged_jpeg() -> Vec<u8> {
    jpeg(&[ascii(Tag::Make, "Google")])
}
