//! Source adapters for third-party danmu platforms.
//!
//! Every platform integration implements the [`SourceAdapter`] capability:
//! `search`, `episodes`, `comments` and `segment_comments`. The aggregation
//! engine treats all adapters uniformly through this trait and never depends
//! on platform wire formats.

pub mod adapter;
pub mod client;
pub mod error;
pub mod registry;

pub mod bilibili;
pub mod iqiyi;
pub mod mgtv;
pub mod tencent;

pub use adapter::{
    CommentPayload, EpisodeInfo, MediaCandidate, MediaType, RawComment, SearchHints, SegmentSlice,
    SourceAdapter,
};
pub use client::SourceClient;
pub use error::SourceError;
pub use registry::{SourceKind, SourceRegistry};
