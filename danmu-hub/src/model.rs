//! Canonical data model of the aggregation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use danmu_sources::{MediaType, SourceKind};

/// Display mode of a canonical comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentMode {
    Scroll,
    Top,
    Bottom,
}

impl Default for CommentMode {
    fn default() -> Self {
        Self::Scroll
    }
}

impl CommentMode {
    /// Map a shared-code-space hint (1-3 scroll, 4 bottom, 5 top) from a
    /// source adapter.
    pub fn from_code(code: u8) -> Self {
        match code {
            4 => Self::Bottom,
            5 => Self::Top,
            _ => Self::Scroll,
        }
    }

    pub fn as_code(self) -> u8 {
        match self {
            Self::Scroll => 1,
            Self::Bottom => 4,
            Self::Top => 5,
        }
    }
}

pub const COLOR_WHITE: u32 = 0xFFFFFF;

/// The platform-agnostic comment record every source is normalized into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalComment {
    /// Offset from the start of playback, in milliseconds.
    #[serde(rename = "t")]
    pub time_ms: u64,
    pub mode: CommentMode,
    /// 0xRRGGBB.
    pub color: u32,
    pub text: String,
}

impl CanonicalComment {
    pub fn scroll(time_ms: u64, text: impl Into<String>) -> Self {
        Self {
            time_ms,
            mode: CommentMode::Scroll,
            color: COLOR_WHITE,
            text: text.into(),
        }
    }
}

/// A registered program, bounded by the registry capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeEntry {
    pub anime_id: i64,
    pub title: String,
    pub media_type: MediaType,
    pub source: SourceKind,
    /// Platform-local id the owning adapter resolves episodes with.
    pub media_id: String,
    /// Landing URL on the platform.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_count: Option<u32>,
    #[serde(default)]
    pub episodes: Vec<EpisodeEntry>,
    pub created_at: DateTime<Utc>,
}

/// One resolved episode of a registered program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeEntry {
    pub episode_id: i64,
    pub anime_id: i64,
    pub episode_number: u32,
    pub episode_title: String,
    /// Playback URL the comment track is keyed by.
    pub origin_url: String,
    pub source: SourceKind,
}

/// Reverse index record: episode id to its origin URL and owning anime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeIndexEntry {
    pub origin_url: String,
    pub anime_id: i64,
    pub source: SourceKind,
}

/// One independently fetchable time slice of a comment track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub source: SourceKind,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Opaque, adapter-supplied. The engine never parses it.
    pub locator: String,
}

/// A search/match candidate after registration, carrying its registry id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub anime_id: i64,
    pub title: String,
    pub media_type: MediaType,
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_count: Option<u32>,
}

/// Outcome of a comment fetch: the whole normalized track, or the segment
/// index for progressive consumption.
#[derive(Debug, Clone)]
pub enum CommentsOutcome {
    Full(Vec<CanonicalComment>),
    Segmented(Vec<Segment>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_code_round_trip() {
        for mode in [CommentMode::Scroll, CommentMode::Top, CommentMode::Bottom] {
            assert_eq!(CommentMode::from_code(mode.as_code()), mode);
        }
        // Codes 1-3 all mean scroll.
        assert_eq!(CommentMode::from_code(2), CommentMode::Scroll);
        assert_eq!(CommentMode::from_code(3), CommentMode::Scroll);
    }

    #[test]
    fn test_canonical_comment_wire_field_names() {
        let comment = CanonicalComment::scroll(1500, "hello");
        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["t"], 1500);
        assert_eq!(json["mode"], "scroll");
        assert_eq!(json["color"], 0xFFFFFF);
        assert_eq!(json["text"], "hello");
    }
}
