//! Decodes a resolved image path into a display-ready RGBA8 bitmap.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::LoadError;

/// Nominal display density; loads at this density keep the source pixel
/// dimensions untouched.
pub const BASE_DENSITY: u32 = 96;

/// A decoded image resized on CPU and ready for GPU upload.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixel buffer, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

/// Decode the file at `path` into an RGBA8 bitmap addressed for
/// `target_density`.
///
/// Any failure (file absent, unsupported format, corrupt data) comes back as
/// a [`LoadError`] for the caller to degrade on; nothing here is
/// process-fatal. EXIF orientation is applied when present.
pub fn load(path: &Path, target_density: u32) -> Result<DecodedImage, LoadError> {
    let decoded = image::ImageReader::open(path)
        .map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    let mut rgba = decoded.to_rgba8();
    rgba = apply_orientation(rgba, read_orientation(path).unwrap_or(1));

    if target_density != BASE_DENSITY && target_density > 0 {
        let (w, h) = rgba.dimensions();
        let scaled_w = (u64::from(w) * u64::from(target_density) / u64::from(BASE_DENSITY)).max(1) as u32;
        let scaled_h = (u64::from(h) * u64::from(target_density) / u64::from(BASE_DENSITY)).max(1) as u32;
        rgba = image::imageops::resize(&rgba, scaled_w, scaled_h, image::imageops::Triangle);
    }

    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        path: path.to_path_buf(),
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

// Maps the common EXIF orientations; unsupported values pass through as-is.
fn apply_orientation(img: image::RgbaImage, orientation: u16) -> image::RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    debug!(orientation = value, path = %path.display(), "exif orientation");
    Some(value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();

        let img = load(&path, BASE_DENSITY).unwrap();
        assert_eq!((img.width, img.height), (1, 2));
        assert_eq!(img.pixels.len(), 8);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("missing.jpg"), BASE_DENSITY).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }

    #[test]
    fn corrupt_data_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png at all").unwrap();

        let err = load(&path, BASE_DENSITY).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
    }

    #[test]
    fn density_scales_pixel_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let nominal = load(&path, BASE_DENSITY).unwrap();
        assert_eq!((nominal.width, nominal.height), (4, 2));

        let doubled = load(&path, BASE_DENSITY * 2).unwrap();
        assert_eq!((doubled.width, doubled.height), (8, 4));
    }
}
