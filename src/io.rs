use image::codecs::png::PngEncoder;
use image::{GrayImage, ImageEncoder, RgbaImage};
use rfd::FileDialog;
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};

use crate::ops::compositor::mask_to_rgba;

/// Extensions offered in open dialogs and accepted for reference images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Decode an image file to RGBA.
pub fn load_image(path: &Path) -> Result<RgbaImage, String> {
    let img = image::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(img.to_rgba8())
}

/// Decode in-memory image bytes (any enabled format) to RGBA.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RgbaImage, String> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| e.to_string())
}

/// Encode an RGBA image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    PngEncoder::new(Cursor::new(&mut out))
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|e| e.to_string())?;
    Ok(out)
}

/// Encode a mask as an opaque black/white RGBA PNG.
pub fn encode_mask_png(mask: &GrayImage) -> Result<Vec<u8>, String> {
    encode_png(&mask_to_rgba(mask))
}

/// Write an RGBA image to `path` as PNG, creating parent directories.
/// Standalone so it can run on a background thread.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| format!("{}: {}", parent.display(), e))?;
    }
    let file = File::create(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let writer = BufWriter::new(file);
    PngEncoder::new(writer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|e| format!("{}: {}", path.display(), e))
}

pub fn save_mask_png(mask: &GrayImage, path: &Path) -> Result<(), String> {
    save_png(&mask_to_rgba(mask), path)
}

/// Write raw bytes to `path`, creating parent directories.
pub fn write_bytes(bytes: &[u8], path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| format!("{}: {}", parent.display(), e))?;
    }
    std::fs::write(path, bytes).map_err(|e| format!("{}: {}", path.display(), e))
}

// ============================================================================
// Native dialogs
// ============================================================================

/// Ask the user for a base image.
pub fn pick_image_path() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Images", IMAGE_EXTENSIONS)
        .add_filter("All Files", &["*"])
        .pick_file()
}

/// Ask the user for one or more reference images.
pub fn pick_image_paths() -> Vec<PathBuf> {
    FileDialog::new()
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_files()
        .unwrap_or_default()
}
