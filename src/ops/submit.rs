// ============================================================================
// Edit submission: the hand-off from the editor to the generative edit
// collaborator, plus a file-drop backend for local use.
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;

use image::{GrayImage, RgbaImage};
use uuid::Uuid;

use crate::error::EditorError;
use crate::{log_err, log_info};

/// Everything the edit collaborator needs: base image, black/white mask
/// (white = regenerate), free-text instruction and reference images.
#[derive(Clone, Debug)]
pub struct EditRequest {
    pub session_id: Uuid,
    pub base: RgbaImage,
    pub mask: GrayImage,
    /// `mask` encoded as an opaque PNG, ready to upload.
    pub mask_png: Vec<u8>,
    pub instruction: String,
    pub references: Vec<RgbaImage>,
}

/// The host-side collaborator behind Edit Mode.
pub trait EditBackend: Send + Sync {
    /// Pre-check run once when the user asks for Edit Mode.
    fn validate_access(&self) -> bool;

    /// Perform the edit and return the replacement image.
    fn submit_edit(&self, request: &EditRequest) -> Result<RgbaImage, EditorError>;
}

/// Outcome of a background submission, delivered over an mpsc channel.
#[derive(Debug)]
pub enum SubmitResult {
    Completed { session_id: Uuid, image: RgbaImage },
    Failed { session_id: Uuid, error: EditorError },
}

/// Run `backend.submit_edit` on the rayon pool and report through `sender`.
/// Returns immediately; the caller polls its receiver each frame.
pub fn spawn_submission(
    backend: Arc<dyn EditBackend>,
    request: EditRequest,
    sender: mpsc::Sender<SubmitResult>,
) {
    let session_id = request.session_id;
    log_info!(
        "Submitting edit for session {} ({}x{}, {} reference(s))",
        session_id,
        request.base.width(),
        request.base.height(),
        request.references.len()
    );
    rayon::spawn(move || {
        let msg = match backend.submit_edit(&request) {
            Ok(image) => SubmitResult::Completed { session_id, image },
            Err(error) => {
                log_err!("Edit for session {} failed: {}", session_id, error);
                SubmitResult::Failed { session_id, error }
            }
        };
        let _ = sender.send(msg);
    });
}

/// Writes each request into its own folder under `output_dir`:
/// `base.png`, `mask.png`, `instruction.txt`, `ref_N.png`.
///
/// Access is granted while credits remain; each submission spends one.
/// The "edited" image returned is the base image unchanged.
pub struct FileDropBackend {
    output_dir: PathBuf,
    credits: AtomicU32,
}

impl FileDropBackend {
    pub fn new(output_dir: impl Into<PathBuf>, credits: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            credits: AtomicU32::new(credits),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn credits(&self) -> u32 {
        self.credits.load(Ordering::SeqCst)
    }

    /// Folder a request is written to.
    fn request_dir(&self, request: &EditRequest) -> PathBuf {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let short = request.session_id.simple().to_string();
        self.output_dir
            .join(format!("edit_{}_{}", secs, &short[..8.min(short.len())]))
    }

    fn write_request(&self, dir: &Path, request: &EditRequest) -> Result<(), String> {
        crate::io::save_png(&request.base, &dir.join("base.png"))?;
        crate::io::write_bytes(&request.mask_png, &dir.join("mask.png"))?;
        crate::io::write_bytes(request.instruction.as_bytes(), &dir.join("instruction.txt"))?;
        for (i, reference) in request.references.iter().enumerate() {
            crate::io::save_png(reference, &dir.join(format!("ref_{}.png", i + 1)))?;
        }
        Ok(())
    }
}

impl EditBackend for FileDropBackend {
    fn validate_access(&self) -> bool {
        self.credits() > 0
    }

    fn submit_edit(&self, request: &EditRequest) -> Result<RgbaImage, EditorError> {
        // Spend a credit up front; refuse when none are left.
        self.credits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1))
            .map_err(|_| EditorError::AccessDenied)?;

        let dir = self.request_dir(request);
        if let Err(e) = self.write_request(&dir, request) {
            self.credits.fetch_add(1, Ordering::SeqCst);
            return Err(EditorError::Io(e));
        }
        log_info!("Edit request written to {}", dir.display());
        Ok(request.base.clone())
    }
}
