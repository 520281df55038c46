use std::io::Cursor;

use exif::{DateTime, Exif, In, Reader, Tag, Value};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use tracing::debug;

use crate::model::photo_exif::PhotoExif;

/// Best-effort read of the fields GeoPhoto keeps. Anything missing or
/// malformed is left as `None`; this never fails.
pub fn read_photo_exif(content: &[u8]) -> PhotoExif {
    let mut cursor = Cursor::new(content);
    let exif = match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No readable EXIF: {e}");
            return PhotoExif::default();
        }
    };

    PhotoExif {
        latitude: read_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S'),
        longitude: read_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W'),
        taken_at: read_taken_at(&exif),
        make: read_ascii(&exif, Tag::Make),
        model: read_ascii(&exif, Tag::Model),
    }
}

fn first_ascii(exif: &Exif, tag: Tag) -> Option<&[u8]> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(values) => values.first().map(Vec::as_slice),
        _ => None,
    }
}

fn read_ascii(exif: &Exif, tag: Tag) -> Option<String> {
    let value = String::from_utf8_lossy(first_ascii(exif, tag)?)
        .trim_end_matches('\0')
        .trim()
        .to_string();

    (!value.is_empty()).then_some(value)
}

/// Degrees/minutes/seconds to signed decimal degrees
fn read_coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
    let parts: Vec<f64> = match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(values) => values.iter().map(|r| r.to_f64()).collect(),
        Value::SRational(values) => values.iter().map(|r| r.to_f64()).collect(),
        Value::Double(values) => values.clone(),
        _ => return None,
    };

    let degrees = *parts.first()?
        + parts.get(1).copied().unwrap_or(0.0) / 60.0
        + parts.get(2).copied().unwrap_or(0.0) / 3600.0;
    if !degrees.is_finite() {
        return None;
    }

    let negative = first_ascii(exif, ref_tag)
        .and_then(|reference| reference.first())
        .is_some_and(|reference| reference.eq_ignore_ascii_case(&negative_ref));

    Some(if negative { -degrees } else { degrees })
}

/// `DateTimeOriginal`, shifted by `OffsetTimeOriginal` when present and taken
/// as UTC otherwise.
fn read_taken_at(exif: &Exif) -> Option<OffsetDateTime> {
    let mut datetime = DateTime::from_ascii(first_ascii(exif, Tag::DateTimeOriginal)?).ok()?;
    if let Some(offset) = first_ascii(exif, Tag::OffsetTimeOriginal) {
        let _ = datetime.parse_offset(offset);
    }

    let date = Date::from_calendar_date(
        i32::from(datetime.year),
        Month::try_from(datetime.month).ok()?,
        datetime.day,
    )
    .ok()?;
    let time = Time::from_hms_nano(
        datetime.hour,
        datetime.minute,
        datetime.second,
        datetime.nanosecond.unwrap_or(0),
    )
    .ok()?;
    let offset = datetime
        .offset
        .and_then(|minutes| UtcOffset::from_whole_seconds(i32::from(minutes) * 60).ok())
        .unwrap_or(UtcOffset::UTC);

    Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::experimental::Writer;
    use exif::{Field, Rational};
    use time::macros::datetime;

    fn ascii(tag: Tag, text: &str) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![text.as_bytes().to_vec()]),
        }
    }

    fn dms(tag: Tag, degrees: u32, minutes: u32, seconds_hundredths: u32) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![
                Rational::from((degrees, 1)),
                Rational::from((minutes, 1)),
                Rational::from((seconds_hundredths, 100)),
            ]),
        }
    }

    /// JPEG made of nothing but an APP1 EXIF segment
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

    #[test]
    fn reads_all_kept_fields() {
        let content = jpeg(&[
            ascii(Tag::Make, "Canon"),
            ascii(Tag::Model, "EOS R5"),
            ascii(Tag::DateTimeOriginal, "2024:05:06 07:08:09"),
            ascii(Tag::OffsetTimeOriginal, "+02:00"),
            ascii(Tag::GPSLatitudeRef, "S"),
            dms(Tag::GPSLatitude, 33, 51, 3600),
            ascii(Tag::GPSLongitudeRef, "E"),
            dms(Tag::GPSLongitude, 151, 12, 0),
        ]);

        let exif = read_photo_exif(&content);

        assert_eq!(exif.make.as_deref(), Some("Canon"));
        assert_eq!(exif.model.as_deref(), Some("EOS R5"));
        assert_eq!(exif.taken_at, Some(datetime!(2024-05-06 07:08:09 +02:00)));

        let (latitude, longitude) = exif.location().unwrap();
        assert!((latitude - -(33.0 + 51.0 / 60.0 + 36.0 / 3600.0)).abs() < 1e-9);
        assert!((longitude - 151.2).abs() < 1e-9);
        assert!(exif.has_gps());
    }

    #[test]
    fn missing_fields_are_absent() {
        let exif = read_photo_exif(&jpeg(&[ascii(Tag::Make, "Canon")]));

        assert_eq!(exif.make.as_deref(), Some("Canon"));
        assert_eq!(exif.model, None);
        assert_eq!(exif.taken_at, None);
        assert!(!exif.has_gps());
    }

    #[test]
    fn west_longitude_is_negative_and_missing_offset_is_utc() {
        let exif = read_photo_exif(&jpeg(&[
            ascii(Tag::DateTimeOriginal, "2020:01:02 03:04:05"),
            dms(Tag::GPSLatitude, 10, 0, 0),
            ascii(Tag::GPSLongitudeRef, "W"),
            dms(Tag::GPSLongitude, 20, 30, 0),
        ]));

        assert_eq!(exif.location(), Some((10.0, -20.5)));
        assert_eq!(exif.taken_at, Some(datetime!(2020-01-02 03:04:05 UTC)));
    }

    #[test]
    fn garbage_yields_empty_result() {
        assert_eq!(read_photo_exif(b"definitely not an image"), PhotoExif::default());
        assert_eq!(read_photo_exif(&[]), PhotoExif::default());
    }
}
