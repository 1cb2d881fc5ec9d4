/// Errors surfaced by the edit canvas and its collaborators.
///
/// Pointer/keyboard handling never produces these: malformed input there is a
/// no-op.  They come from opening the editor, exporting the mask and handing
/// the request to the edit backend.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorError {
    /// The base image has not been loaded/decoded yet.
    CanvasNotReady,
    /// The host's access check (credits, entitlement) refused Edit Mode.
    AccessDenied,
    /// Mask could not be prepared; the editor stays open so the user can retry.
    MaskPreparation(String),
    Encode(String),
    Io(String),
    /// Failure reported by the downstream edit collaborator.
    Backend(String),
    /// Malformed headless session file.
    Session(String),
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorError::CanvasNotReady => write!(f, "Canvas is not ready yet"),
            EditorError::AccessDenied => write!(f, "Edit mode is not available for this account"),
            EditorError::MaskPreparation(e) => write!(f, "Mask preparation failed: {}", e),
            EditorError::Encode(e) => write!(f, "Image encoding failed: {}", e),
            EditorError::Io(e) => write!(f, "I/O error: {}", e),
            EditorError::Backend(e) => write!(f, "Edit request failed: {}", e),
            EditorError::Session(e) => write!(f, "Invalid session file: {}", e),
        }
    }
}

impl std::error::Error for EditorError {}

impl EditorError {
    /// Short text suitable for a toast/status line.
    pub fn user_message(&self) -> String {
        match self {
            EditorError::MaskPreparation(_) | EditorError::Encode(_) => {
                "Preparation failed, please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}
