use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::filters::FilterId;

/// Handle to a playable media item. Two refs are the same item when their
/// path strings are equal; a successful edit produces a new ref instead of
/// changing an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(String);

impl MediaRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem path the handle names, with any `file://` scheme removed
    pub fn as_path(&self) -> PathBuf {
        PathBuf::from(self.0.strip_prefix("file://").unwrap_or(&self.0))
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where playback continues after the player is torn down and rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackResumePoint {
    pub track_index: Option<u32>,
    pub position_millis: Option<u64>,
    pub should_autoplay: bool,
}

impl PlaybackResumePoint {
    pub const UNSET: Self = Self {
        track_index: None,
        position_millis: None,
        should_autoplay: true,
    };

    /// Build a point from raw player readings; negative positions clamp to zero
    pub fn captured(track_index: Option<u32>, position_millis: i64, should_autoplay: bool) -> Self {
        Self {
            track_index,
            position_millis: Some(position_millis.max(0) as u64),
            should_autoplay,
        }
    }

    pub fn is_unset(&self) -> bool {
        self.track_index.is_none() && self.position_millis.is_none()
    }
}

impl Default for PlaybackResumePoint {
    fn default() -> Self {
        Self::UNSET
    }
}

/// The filter baked into the pixels of the current media
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub applied: FilterId,
}

/// Everything an edit session must carry across presentation rebuilds.
/// This field set is exhaustive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSessionState {
    pub current_media: MediaRef,
    #[serde(default)]
    pub resume: PlaybackResumePoint,
    #[serde(default)]
    pub filter: FilterState,
    #[serde(default)]
    pub job_in_flight: bool,
}

impl EditSessionState {
    pub fn new(current_media: MediaRef) -> Self {
        Self {
            current_media,
            resume: PlaybackResumePoint::UNSET,
            filter: FilterState::default(),
            job_in_flight: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    SaveCopy,
    ReplaceAudio,
    ApplyFilter,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::SaveCopy => "save_copy",
            JobKind::ReplaceAudio => "replace_audio",
            JobKind::ApplyFilter => "apply_filter",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One transcoder invocation. Lives from intent acceptance until its
/// terminal callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub kind: JobKind,
    pub source_paths: Vec<PathBuf>,
    pub destination: PathBuf,
    pub filter: Option<FilterId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    Success(Option<MediaRef>),
    Cancelled,
    Failed(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_position_clamps_negative_values() {
        let point = PlaybackResumePoint::captured(Some(0), -250, false);
        assert_eq!(point.position_millis, Some(0));
        assert!(!point.should_autoplay);
    }

    #[test]
    fn media_ref_strips_file_scheme() {
        let media = MediaRef::new("file:///tmp/clip.mp4");
        assert_eq!(media.as_path(), PathBuf::from("/tmp/clip.mp4"));
        assert_ne!(media, MediaRef::new("/tmp/clip.mp4"));
    }

    #[test]
    fn state_snapshot_restores_missing_fields_with_defaults() {
        let state: EditSessionState =
            serde_json::from_str(r#"{"current_media":"a.mp4"}"#).unwrap();
        assert_eq!(state, EditSessionState::new(MediaRef::new("a.mp4")));
        assert!(state.resume.is_unset());
    }
}
