//! Capture time from EXIF metadata

use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// Date tags in priority order: taken, digitized, last modified
const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// Layouts seen in the wild; the first one is the EXIF standard
const DATE_FORMATS: [&str; 5] = [
    "%Y:%m:%d %H:%M:%S",
    "%Y:%m:%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

/// Capture time of the image at `path`
pub fn extract_exif_time(path: &Path) -> Result<NaiveDateTime> {
    let exif = read_exif(path)?;

    DATE_TAGS
        .into_iter()
        .find_map(|tag| {
            let time = exif.get_field(tag, In::PRIMARY).and_then(field_datetime)?;
            trace!(?path, %tag, %time, "Found EXIF date");
            Some(time)
        })
        .ok_or_else(|| Error::ExifRead {
            path: path.to_path_buf(),
            message: "no usable date tag".into(),
        })
}

fn read_exif(path: &Path) -> Result<Exif> {
    let mut reader = BufReader::new(File::open(path)?);
    Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::ExifRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Date fields are ASCII; anything else is ignored
fn field_datetime(field: &Field) -> Option<NaiveDateTime> {
    let Value::Ascii(ref parts) = field.value else {
        return None;
    };
    parts
        .iter()
        .filter_map(|bytes| std::str::from_utf8(bytes).ok())
        .find_map(parse_exif_datetime)
}

/// Parse a date value, with or without surrounding quotes
fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim().trim_matches('"').trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Build a minimal JPEG whose EXIF block carries the given date tags.
///
/// `original` goes into DateTimeOriginal (Exif sub-IFD), `modified` into
/// DateTime (IFD0). Values use the EXIF "YYYY:MM:DD HH:MM:SS" form.
#[cfg(test)]
pub(crate) fn jpeg_with_exif(original: Option<&str>, modified: Option<&str>) -> Vec<u8> {
    fn entry(out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32) {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }

    const ASCII: u16 = 2;
    const LONG: u16 = 4;

    let ascii = |s: &str| {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        bytes
    };
    let original = original.map(ascii);
    let modified = modified.map(ascii);

    let ifd0_entries = usize::from(original.is_some()) + usize::from(modified.is_some());
    let ifd0_len = 2 + 12 * ifd0_entries + 4;
    let exif_ifd_offset = 8 + ifd0_len;
    let exif_ifd_len = if original.is_some() { 2 + 12 + 4 } else { 0 };
    let mut data_offset = exif_ifd_offset + exif_ifd_len;

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II*\0");
    tiff.extend_from_slice(&8u32.to_le_bytes());

    // IFD0
    let mut data = Vec::new();
    tiff.extend_from_slice(&(ifd0_entries as u16).to_le_bytes());
    if let Some(ref value) = modified {
        entry(&mut tiff, 0x0132, ASCII, value.len() as u32, data_offset as u32);
        data.extend_from_slice(value);
        data_offset += value.len();
    }
    if original.is_some() {
        entry(&mut tiff, 0x8769, LONG, 1, exif_ifd_offset as u32);
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());

    // Exif sub-IFD
    if let Some(ref value) = original {
        tiff.extend_from_slice(&1u16.to_le_bytes());
        entry(&mut tiff, 0x9003, ASCII, value.len() as u32, data_offset as u32);
        tiff.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(value);
    }
    tiff.extend_from_slice(&data);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_exif_datetime() {
        // Standard EXIF format
        let dt = parse_exif_datetime("2024:01:15 14:30:00").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);
        assert_eq!(dt.second(), 0);

        // With quotes
        let dt = parse_exif_datetime("\"2024:01:15 14:30:00\"").unwrap();
        assert_eq!(dt.year(), 2024);

        // Alternative formats
        let dt = parse_exif_datetime("2024-01-15 14:30:00").unwrap();
        assert_eq!(dt.year(), 2024);
        let dt = parse_exif_datetime("2024/01/15 14:30:00").unwrap();
        assert_eq!(dt.day(), 15);

        // Invalid format
        assert!(parse_exif_datetime("invalid").is_none());
        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_none());
    }

    #[test]
    fn test_prefers_date_taken() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("both.jpg");
        fs::write(
            &path,
            jpeg_with_exif(Some("2020:01:01 08:00:00"), Some("2023:06:30 12:00:00")),
        )
        .unwrap();

        let time = extract_exif_time(&path).unwrap();
        assert_eq!(time.year(), 2020);
        assert_eq!(time.month(), 1);
    }

    #[test]
    fn test_falls_back_to_modified_tag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modified_only.jpg");
        fs::write(&path, jpeg_with_exif(None, Some("2023:06:30 12:00:00"))).unwrap();

        let time = extract_exif_time(&path).unwrap();
        assert_eq!((time.year(), time.month(), time.day()), (2023, 6, 30));
    }

    #[test]
    fn test_no_date_tags() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no_dates.jpg");
        fs::write(&path, jpeg_with_exif(None, None)).unwrap();

        assert!(extract_exif_time(&path).is_err());
    }

    #[test]
    fn test_not_an_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        fs::write(&path, b"hello").unwrap();

        let err = extract_exif_time(&path).unwrap_err();
        assert!(matches!(err, Error::ExifRead { .. }));
    }
}
