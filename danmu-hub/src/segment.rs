//! Segment index construction.
//!
//! A comment stream is exposed as an ordered list of independently
//! fetchable `{start, end, locator}` slices. Natively segmented adapters
//! supply their own granularity; whole-track adapters get a single synthetic
//! slice whose locator is the playback URL itself.

use danmu_sources::{CommentPayload, SourceKind};

use crate::model::{CanonicalComment, Segment};

/// Build the segment index for a fetched payload.
pub fn build_index(source: SourceKind, origin_url: &str, payload: &CommentPayload) -> Vec<Segment> {
    match payload {
        CommentPayload::Segmented(slices) => {
            let mut segments: Vec<Segment> = slices
                .iter()
                .map(|slice| Segment {
                    source,
                    start_ms: slice.start_ms,
                    end_ms: slice.end_ms,
                    locator: slice.locator.clone(),
                })
                .collect();
            segments.sort_by_key(|s| s.start_ms);
            segments
        }
        CommentPayload::Full(comments) => {
            let end_ms = comments.iter().map(|c| c.time_ms).max().unwrap_or(0);
            vec![Segment {
                source,
                start_ms: 0,
                end_ms,
                locator: origin_url.to_string(),
            }]
        }
    }
}

/// Index for a track that is already normalized (cache hits).
pub fn whole_track_index(
    source: SourceKind,
    origin_url: &str,
    comments: &[CanonicalComment],
) -> Vec<Segment> {
    let end_ms = comments.iter().map(|c| c.time_ms).max().unwrap_or(0);
    vec![Segment {
        source,
        start_ms: 0,
        end_ms,
        locator: origin_url.to_string(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use danmu_sources::{RawComment, SegmentSlice};

    #[test]
    fn test_segmented_payload_is_sorted() {
        let payload = CommentPayload::Segmented(vec![
            SegmentSlice { start_ms: 60_000, end_ms: 90_000, locator: "v/2".into() },
            SegmentSlice { start_ms: 0, end_ms: 30_000, locator: "v/0".into() },
            SegmentSlice { start_ms: 30_000, end_ms: 60_000, locator: "v/1".into() },
        ]);
        let index = build_index(SourceKind::Tencent, "https://u", &payload);
        let locators: Vec<_> = index.iter().map(|s| s.locator.as_str()).collect();
        assert_eq!(locators, vec!["v/0", "v/1", "v/2"]);
    }

    #[test]
    fn test_full_payload_gets_single_slice() {
        let payload = CommentPayload::Full(vec![
            RawComment { time_ms: 500, mode: None, color: None, text: "a".into() },
            RawComment { time_ms: 88_000, mode: None, color: None, text: "b".into() },
        ]);
        let index = build_index(SourceKind::Bilibili, "https://u", &payload);
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].start_ms, 0);
        assert_eq!(index[0].end_ms, 88_000);
        assert_eq!(index[0].locator, "https://u");
    }
}
