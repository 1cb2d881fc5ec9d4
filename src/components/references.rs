use image::RgbaImage;

use crate::settings::REFERENCE_LIMIT;
use crate::{log_info, log_warn};

/// Reference images attached to an edit request.  Holds at most `max`
/// images; anything beyond that is dropped without complaint.
#[derive(Clone, Debug)]
pub struct ReferenceTray {
    images: Vec<RgbaImage>,
    max: usize,
}

impl Default for ReferenceTray {
    fn default() -> Self {
        Self::new(REFERENCE_LIMIT)
    }
}

impl ReferenceTray {
    pub fn new(max: usize) -> Self {
        Self {
            images: Vec::new(),
            max: max.clamp(1, REFERENCE_LIMIT),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.images.len() >= self.max
    }

    pub fn images(&self) -> &[RgbaImage] {
        &self.images
    }

    /// Add one image.  Returns false when the tray was already full.
    pub fn add(&mut self, image: RgbaImage) -> bool {
        if self.is_full() {
            return false;
        }
        self.images.push(image);
        true
    }

    /// Add images in order until the tray is full.  Returns how many were
    /// kept.
    pub fn add_many(&mut self, images: impl IntoIterator<Item = RgbaImage>) -> usize {
        let room = self.max.saturating_sub(self.images.len());
        let before = self.images.len();
        self.images.extend(images.into_iter().take(room));
        self.images.len() - before
    }

    pub fn remove(&mut self, index: usize) -> Option<RgbaImage> {
        (index < self.images.len()).then(|| self.images.remove(index))
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    /// Hand the images over (for an edit request), leaving the tray empty.
    pub fn take(&mut self) -> Vec<RgbaImage> {
        std::mem::take(&mut self.images)
    }

    /// Paste an image from the system clipboard.  Returns false when the
    /// clipboard has no image or the tray is full.
    pub fn paste_from_clipboard(&mut self) -> bool {
        if self.is_full() {
            return false;
        }
        match clipboard_image() {
            Some(img) => {
                log_info!("Reference pasted from clipboard ({}x{})", img.width(), img.height());
                self.add(img)
            }
            None => false,
        }
    }

    /// Decode and add encoded image bytes (a file dropped without a path).
    pub fn add_bytes(&mut self, bytes: &[u8]) -> bool {
        if self.is_full() {
            return false;
        }
        match crate::io::decode_image_bytes(bytes) {
            Ok(img) => self.add(img),
            Err(e) => {
                log_warn!("Skipping dropped reference: {}", e);
                false
            }
        }
    }

    /// Decode and add files picked by the user.  Undecodable files are
    /// logged and skipped.
    pub fn add_files(&mut self, paths: &[std::path::PathBuf]) -> usize {
        let room = self.max.saturating_sub(self.images.len());
        let decoded = paths
            .iter()
            .take(room)
            .filter_map(|p| match crate::io::load_image(p) {
                Ok(img) => Some(img),
                Err(e) => {
                    log_warn!("Skipping reference image: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();
        self.add_many(decoded)
    }
}

/// Read an image from the system clipboard: raw image data first, then
/// text that names an image file.
pub fn clipboard_image() -> Option<RgbaImage> {
    let mut clip = arboard::Clipboard::new().ok()?;
    if let Ok(data) = clip.get_image() {
        if let Some(img) =
            RgbaImage::from_raw(data.width as u32, data.height as u32, data.bytes.into_owned())
        {
            return Some(img);
        }
    }
    let text = clip.get_text().ok()?;
    let path = std::path::Path::new(text.trim());
    if path.is_file() {
        return crate::io::load_image(path).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imgs(n: usize) -> Vec<RgbaImage> {
        (0..n).map(|i| RgbaImage::new(i as u32 + 1, 1)).collect()
    }

    #[test]
    fn excess_images_are_silently_dropped() {
        let mut tray = ReferenceTray::default();
        assert_eq!(tray.add_many(imgs(3)), 3);
        assert_eq!(tray.add_many(imgs(4)), 2);
        assert_eq!(tray.len(), 5);
        assert!(!tray.add(RgbaImage::new(9, 9)));
        // First-come order is kept.
        let widths: Vec<u32> = tray.images().iter().map(|i| i.width()).collect();
        assert_eq!(widths, vec![1, 2, 3, 1, 2]);
    }

    #[test]
    fn limit_is_bounded_to_five() {
        assert_eq!(ReferenceTray::new(50).max(), 5);
        assert_eq!(ReferenceTray::new(0).max(), 1);
    }

    #[test]
    fn dropped_bytes_are_decoded_and_garbage_skipped() {
        let png = crate::io::encode_png(&RgbaImage::new(6, 4)).unwrap();
        let mut tray = ReferenceTray::new(1);
        assert!(!tray.add_bytes(b"not an image"));
        assert!(tray.add_bytes(&png));
        assert_eq!(tray.images()[0].dimensions(), (6, 4));
        assert!(!tray.add_bytes(&png));
    }

    #[test]
    fn remove_frees_a_slot() {
        let mut tray = ReferenceTray::new(2);
        tray.add_many(imgs(2));
        assert!(tray.remove(7).is_none());
        assert_eq!(tray.remove(0).map(|i| i.width()), Some(1));
        assert!(tray.add(RgbaImage::new(4, 4)));
        assert_eq!(tray.take().len(), 2);
        assert!(tray.is_empty());
    }
}
