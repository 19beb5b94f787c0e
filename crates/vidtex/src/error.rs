use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by [`VideoSource::load`](crate::VideoSource::load) and
/// the media adapter underneath it.
///
/// Engine-level errors are caught at the adapter boundary and turned into a
/// single [`SourceError::Load`]; callers never listen for engine events
/// themselves.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The playback engine reported a decode or network failure.
    #[error("media load failed: {0}")]
    Load(String),

    /// The engine never delivered a terminal load event within the
    /// configured bound.
    #[error("media load timed out after {0:?}")]
    Timeout(Duration),

    /// The source was destroyed; it cannot be loaded or sampled again.
    #[error("source has been destroyed")]
    Destroyed,
}
