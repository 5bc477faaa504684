use eframe::egui::ColorImage;
use tracing::debug;

/// Fallback when the search API did not include a thumbnail.
pub fn default_thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/mqdefault.jpg", video_id)
}

/// Downloads and decodes a thumbnail. Blocking; run it off the UI thread.
pub fn fetch_thumbnail(url: &str) -> Option<ColorImage> {
    let bytes = match reqwest::blocking::get(url).and_then(|r| r.error_for_status()?.bytes()) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(%url, "thumbnail fetch failed: {}", err);
            return None;
        }
    };
    decode_thumbnail(&bytes)
}

pub fn decode_thumbnail(bytes: &[u8]) -> Option<ColorImage> {
    let img = image::load_from_memory(bytes).ok()?.to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn decodes_png_bytes() {
        let img = RgbaImage::from_pixel(4, 3, Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();

        let decoded = decode_thumbnail(&bytes).unwrap();
        assert_eq!(decoded.size, [4, 3]);
    }

    #[test]
    fn garbage_is_none() {
        assert!(decode_thumbnail(b"not an image").is_none());
    }

    #[test]
    fn fallback_url_uses_video_id() {
        assert_eq!(
            default_thumbnail_url("abc"),
            "https://img.youtube.com/vi/abc/mqdefault.jpg"
        );
    }
}
