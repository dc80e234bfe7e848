//! Request and completion value types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Target dimensions for decoding/scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Whether embedded thumbnail data is used instead of a full decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailMode {
    /// Use embedded data when present, fall back to a full decode.
    #[default]
    PreferEmbedded,
    /// Always decode the full image.
    Never,
    /// Only use embedded data.
    Always,
}

/// A single load request.
///
/// `ticket` is the arrival sequence number assigned when the request is
/// enqueued; it is zero until then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest<K> {
    pub key: K,
    pub size: Size,
    pub thumbnail_mode: ThumbnailMode,
    pub auto_rotate: bool,
    pub priority: bool,
    pub(crate) ticket: u64,
}

impl<K> LoadRequest<K> {
    /// Create a normal-priority request with default thumbnail mode and
    /// auto-rotation enabled.
    pub fn new(key: K, size: Size) -> Self {
        Self {
            key,
            size,
            thumbnail_mode: ThumbnailMode::default(),
            auto_rotate: true,
            priority: false,
            ticket: 0,
        }
    }

    pub fn with_thumbnail_mode(mut self, mode: ThumbnailMode) -> Self {
        self.thumbnail_mode = mode;
        self
    }

    pub fn with_auto_rotate(mut self, auto_rotate: bool) -> Self {
        self.auto_rotate = auto_rotate;
        self
    }

    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    /// Arrival sequence number (0 if never enqueued).
    pub fn ticket(&self) -> u64 {
        self.ticket
    }
}

/// Arguments handed to the user-image override before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserImageRequest<'a, K> {
    pub key: &'a K,
    pub size: Size,
    pub thumbnail_mode: ThumbnailMode,
    pub auto_rotate: bool,
}

impl<'a, K> From<&'a LoadRequest<K>> for UserImageRequest<'a, K> {
    fn from(request: &'a LoadRequest<K>) -> Self {
        Self {
            key: &request.key,
            size: request.size,
            thumbnail_mode: request.thumbnail_mode,
            auto_rotate: request.auto_rotate,
        }
    }
}

/// Outcome of a load, echoing the request it answers.
#[derive(Debug)]
pub struct LoadCompleted<K, I> {
    pub key: K,
    pub size: Size,
    pub thumbnail_mode: ThumbnailMode,
    pub auto_rotate: bool,
    pub priority: bool,
    pub ticket: u64,
    /// Decoded image or the failure cause.
    pub outcome: Result<I, DecodeError>,
    /// Set when the request was cancelled or superseded while in flight.
    pub stale: bool,
}

impl<K, I> LoadCompleted<K, I> {
    pub(crate) fn new(request: LoadRequest<K>, outcome: Result<I, DecodeError>, stale: bool) -> Self {
        Self {
            key: request.key,
            size: request.size,
            thumbnail_mode: request.thumbnail_mode,
            auto_rotate: request.auto_rotate,
            priority: request.priority,
            ticket: request.ticket,
            outcome,
            stale,
        }
    }

    pub fn image(&self) -> Option<&I> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&DecodeError> {
        self.outcome.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Take the image, discarding the echoed fields.
    pub fn into_image(self) -> Result<I, DecodeError> {
        self.outcome
    }
}
