//! Speech-to-text boundary
//!
//! Best-effort: `None` on any failure, consumed only when the caller did
//! not supply lyrics directly. The built-in implementation reports the
//! model as unavailable, which degrades the bias signal to absent rather
//! than zero.

/// Transcription seam for the speech-to-text model
pub trait Transcriber: Send + Sync {
    /// Transcribe audio bytes to text. `None` on failure or when no speech
    /// model is available.
    fn transcribe(&self, bytes: &[u8], filename: &str) -> Option<String>;

    /// Whether a speech model is actually loaded (health reporting)
    fn available(&self) -> bool {
        false
    }
}

/// Stand-in used when no speech model is installed
#[derive(Debug, Default, Clone)]
pub struct UnavailableTranscriber;

impl Transcriber for UnavailableTranscriber {
    fn transcribe(&self, _bytes: &[u8], filename: &str) -> Option<String> {
        tracing::debug!(filename, "No speech model available, skipping transcription");
        None
    }
}
