//! API request/response models.

use serde::{Deserialize, Serialize};

use danmu_sources::{MediaType, SourceKind};

use crate::model::{CanonicalComment, EpisodeEntry, MatchCandidate, Segment};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub keyword: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimeSummary {
    pub anime_id: i64,
    pub anime_title: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub source: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_count: Option<u32>,
}

impl From<MatchCandidate> for AnimeSummary {
    fn from(candidate: MatchCandidate) -> Self {
        Self {
            anime_id: candidate.anime_id,
            anime_title: candidate.title,
            media_type: candidate.media_type,
            source: candidate.source,
            season: candidate.season,
            year: candidate.year,
            episode_count: candidate.episode_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub animes: Vec<AnimeSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchQuery {
    pub file_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSummary {
    pub episode_id: i64,
    pub anime_id: i64,
    pub episode_number: u32,
    pub episode_title: String,
}

impl From<EpisodeEntry> for EpisodeSummary {
    fn from(episode: EpisodeEntry) -> Self {
        Self {
            episode_id: episode.episode_id,
            anime_id: episode.anime_id,
            episode_number: episode.episode_number,
            episode_title: episode.episode_title,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub is_matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anime: Option<AnimeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<EpisodeSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<AnimeSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    pub keyword: String,
    pub anime_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BangumiResponse {
    pub anime_id: i64,
    pub anime_title: String,
    pub episodes: Vec<EpisodeSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentQuery {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub segmented: Option<bool>,
    #[serde(default)]
    pub with_related: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub count: usize,
    pub comments: Vec<CanonicalComment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentIndexResponse {
    pub count: usize,
    pub segments: Vec<Segment>,
}

/// One segment to fetch, exactly as handed out by the index response.
#[derive(Debug, Deserialize)]
pub struct SegmentRequest(pub Segment);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anime_summary_wire_names() {
        let summary = AnimeSummary {
            anime_id: 3,
            anime_title: "t".into(),
            media_type: MediaType::Movie,
            source: SourceKind::Bilibili,
            season: None,
            year: Some(2024),
            episode_count: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["animeId"], 3);
        assert_eq!(json["animeTitle"], "t");
        assert_eq!(json["type"], "movie");
        assert_eq!(json["year"], 2024);
        assert!(json.get("season").is_none());
    }

    #[test]
    fn test_comment_query_defaults() {
        let query: CommentQuery = serde_json::from_str("{}").unwrap();
        assert!(query.format.is_none());
        assert!(query.segmented.is_none());
        assert!(query.with_related.is_none());
    }
}
