//! The source adapter capability and its exchange types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::registry::SourceKind;

/// What kind of program a candidate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Series,
    Movie,
    Other,
}

impl Default for MediaType {
    fn default() -> Self {
        Self::Series
    }
}

/// One program returned by a platform search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaCandidate {
    pub source: SourceKind,
    /// Platform-local identifier (season id, album id, collection id...).
    pub media_id: String,
    pub title: String,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Landing URL of the program on the platform.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_count: Option<u32>,
}

/// One episode of a resolved program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub number: u32,
    pub title: String,
    /// Playback URL the comment track is keyed by.
    pub url: String,
}

/// A timed comment as the platform reports it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawComment {
    /// Offset from the start of playback, in milliseconds.
    pub time_ms: u64,
    /// Display mode, already mapped by the adapter into the shared code
    /// space: 1-3 scroll, 4 bottom, 5 top. None when the platform has no
    /// mode channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u8>,
    /// 0xRRGGBB, if the platform reports a color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    pub text: String,
}

/// One independently fetchable slice of a comment track.
///
/// `locator` is adapter-supplied and opaque to the engine; only the owning
/// adapter interprets it in [`SourceAdapter::segment_comments`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSlice {
    pub start_ms: u64,
    pub end_ms: u64,
    pub locator: String,
}

/// What a comment fetch produced: the whole track, or a segment index to be
/// fetched slice by slice. Segment granularity is adapter-defined.
#[derive(Debug, Clone)]
pub enum CommentPayload {
    Full(Vec<RawComment>),
    Segmented(Vec<SegmentSlice>),
}

/// Season/episode context extracted from the user query, passed through to
/// platforms that can use it to narrow their search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchHints {
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Capability contract every platform integration implements.
///
/// "No result" is an empty collection, never an error. Errors mean the
/// platform could not be asked (network, parse, rejection); the engine
/// catches them at the call boundary and the adapter contributes nothing to
/// the aggregate operation.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Whether a user-pasted URL belongs to this platform.
    fn handles_url(&self, url: &str) -> bool;

    async fn search(
        &self,
        keyword: &str,
        hints: &SearchHints,
    ) -> Result<Vec<MediaCandidate>, SourceError>;

    async fn episodes(&self, media: &MediaCandidate) -> Result<Vec<EpisodeInfo>, SourceError>;

    async fn comments(&self, url: &str) -> Result<CommentPayload, SourceError>;

    async fn segment_comments(&self, locator: &str) -> Result<Vec<RawComment>, SourceError>;
}
