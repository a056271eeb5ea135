//! Local media capture boundary.
//!
//! Camera, microphone, and screen acquisition are OS/browser capabilities;
//! the engine only consumes them through [`MediaDevices`]. Streams are
//! described by [`MediaStreamHandle`], which is what travels through
//! negotiation and ends up bound to presence records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::ids::StreamId;

// =============================================================================
// STREAMS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub enabled: bool,
}

/// A live media stream: one id, one or more tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStreamHandle {
    pub id: StreamId,
    pub tracks: Vec<MediaTrack>,
}

impl MediaStreamHandle {
    #[must_use]
    pub fn new(id: StreamId, tracks: Vec<MediaTrack>) -> Self {
        Self { id, tracks }
    }

    /// Enable or disable every track of `kind`. Returns the new state, or
    /// `None` when the stream has no such track.
    pub fn set_enabled(&mut self, kind: TrackKind, enabled: bool) -> Option<bool> {
        let mut found = false;
        for track in self.tracks.iter_mut().filter(|t| t.kind == kind) {
            track.enabled = enabled;
            found = true;
        }
        found.then_some(enabled)
    }

    /// Whether the first track of `kind` is enabled.
    #[must_use]
    pub fn is_enabled(&self, kind: TrackKind) -> Option<bool> {
        self.tracks.iter().find(|t| t.kind == kind).map(|t| t.enabled)
    }
}

// =============================================================================
// CAPTURE
// =============================================================================

/// Capability errors. Fatal to starting a session, never to a running one.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("media permission denied")]
    PermissionDenied,
    #[error("no capture device found")]
    NotFound,
    #[error("capture unsupported: {0}")]
    Unsupported(String),
}

impl frames::ErrorCode for CaptureError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "E_MEDIA_DENIED",
            Self::NotFound => "E_MEDIA_NOT_FOUND",
            Self::Unsupported(_) => "E_MEDIA_UNSUPPORTED",
        }
    }
}

/// A freshly acquired stream. `ended` fires when the capture is stopped
/// out-of-band (e.g. the OS "stop sharing" button).
#[derive(Debug)]
pub struct Capture {
    pub stream: MediaStreamHandle,
    pub ended: Option<oneshot::Receiver<()>>,
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire camera + microphone.
    async fn user_media(&self) -> Result<Capture, CaptureError>;

    /// Acquire a screen capture stream (video only).
    async fn display_media(&self) -> Result<Capture, CaptureError>;

    /// Stop every track of `stream`.
    fn stop(&self, stream: &MediaStreamHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn av_stream() -> MediaStreamHandle {
        MediaStreamHandle::new(
            StreamId::new("cam"),
            vec![
                MediaTrack { id: "a".into(), kind: TrackKind::Audio, enabled: true },
                MediaTrack { id: "v".into(), kind: TrackKind::Video, enabled: true },
            ],
        )
    }

    #[test]
    fn set_enabled_touches_only_matching_kind() {
        let mut stream = av_stream();
        assert_eq!(stream.set_enabled(TrackKind::Audio, false), Some(false));
        assert_eq!(stream.is_enabled(TrackKind::Audio), Some(false));
        assert_eq!(stream.is_enabled(TrackKind::Video), Some(true));
    }

    #[test]
    fn set_enabled_without_track_is_none() {
        let mut stream = MediaStreamHandle::new(StreamId::new("screen"), Vec::new());
        assert_eq!(stream.set_enabled(TrackKind::Audio, true), None);
        assert_eq!(stream.is_enabled(TrackKind::Video), None);
    }
}
