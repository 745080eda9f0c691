//! Mango TV (mgtv.com) source adapter.
//!
//! The barrage API serves one-minute JSON chunks addressed by millisecond
//! offset. Segment locators are `"{cid}/{vid}/{offset_ms}"`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::adapter::{
    CommentPayload, EpisodeInfo, MediaCandidate, MediaType, RawComment, SearchHints, SegmentSlice,
    SourceAdapter,
};
use crate::client::SourceClient;
use crate::error::SourceError;
use crate::registry::SourceKind;

pub static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:www\.)?mgtv\.com/b/\d+/\d+\.html").unwrap());

/// Path ids also appear in relative URLs from the search API.
static IDS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/b/(\d+)/(\d+)\.html").unwrap());

/// Milliseconds of track covered by one barrage chunk.
const CHUNK_SPAN_MS: u64 = 60_000;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    contents: Vec<SearchContent>,
}

#[derive(Debug, Deserialize)]
struct SearchContent {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    data: Vec<SearchMedia>,
}

#[derive(Debug, Deserialize)]
struct SearchMedia {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default, rename = "desc")]
    descriptions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodeListResponse {
    #[serde(default)]
    data: Option<EpisodeListData>,
}

#[derive(Debug, Deserialize)]
struct EpisodeListData {
    #[serde(default)]
    list: Vec<MgtvEpisode>,
}

#[derive(Debug, Deserialize)]
struct MgtvEpisode {
    #[serde(default, rename = "t1")]
    index_label: String,
    #[serde(default, rename = "t3")]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default, rename = "isIntact")]
    is_intact: String,
}

#[derive(Debug, Deserialize)]
struct VideoInfoResponse {
    #[serde(default)]
    data: Option<VideoInfoData>,
}

#[derive(Debug, Deserialize)]
struct VideoInfoData {
    #[serde(default)]
    info: Option<VideoInfo>,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    /// "HH:MM:SS" or "MM:SS".
    #[serde(default)]
    time: String,
}

#[derive(Debug, Deserialize)]
struct BarrageResponse {
    #[serde(default)]
    data: Option<BarrageData>,
}

#[derive(Debug, Deserialize)]
struct BarrageData {
    #[serde(default)]
    items: Option<Vec<BarrageItem>>,
}

#[derive(Debug, Deserialize)]
struct BarrageItem {
    #[serde(default)]
    time: u64,
    #[serde(default)]
    content: String,
    #[serde(default, rename = "type")]
    kind: Option<u8>,
}

pub struct Mgtv {
    client: SourceClient,
}

impl Mgtv {
    pub fn new(client: Client) -> Self {
        let mut client = SourceClient::new("mgtv", client);
        client.set_referer_static("https://www.mgtv.com/");
        Self { client }
    }

    fn ids_from_url(url: &str) -> Result<(String, String), SourceError> {
        IDS_REGEX
            .captures(url)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .ok_or_else(|| SourceError::InvalidUrl(url.to_string()))
    }
}

/// Parse "HH:MM:SS" / "MM:SS" into seconds.
fn parse_clock(time: &str) -> u64 {
    time.split(':')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .fold(0, |acc, part| acc * 60 + part)
}

#[async_trait]
impl SourceAdapter for Mgtv {
    fn kind(&self) -> SourceKind {
        SourceKind::Mgtv
    }

    fn handles_url(&self, url: &str) -> bool {
        URL_REGEX.is_match(url)
    }

    async fn search(
        &self,
        keyword: &str,
        _hints: &SearchHints,
    ) -> Result<Vec<MediaCandidate>, SourceError> {
        let url = format!(
            "https://mobileso.bz.mgtv.com/msite/search/v2?q={}&pc=30&pn=1",
            urlencoding::encode(keyword)
        );
        let response: SearchResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[Bb]>").unwrap());

        Ok(response
            .data
            .map(|d| d.contents)
            .unwrap_or_default()
            .into_iter()
            .filter(|content| content.kind == "media")
            .flat_map(|content| content.data)
            .filter_map(|media| {
                let (cid, _) = Self::ids_from_url(&media.url).ok()?;
                if media.title.is_empty() {
                    return None;
                }
                let media_type = if media.descriptions.iter().any(|d| d.contains("电影")) {
                    MediaType::Movie
                } else {
                    MediaType::Series
                };
                let url = if media.url.starts_with("http") {
                    media.url.clone()
                } else {
                    format!("https://www.mgtv.com{}", media.url)
                };
                Some(MediaCandidate {
                    source: SourceKind::Mgtv,
                    media_id: cid,
                    title: TAG.replace_all(&media.title, "").into_owned(),
                    media_type,
                    season: None,
                    year: None,
                    url,
                    episode_count: None,
                })
            })
            .collect())
    }

    async fn episodes(&self, media: &MediaCandidate) -> Result<Vec<EpisodeInfo>, SourceError> {
        let (_, vid) = Self::ids_from_url(&media.url)?;
        let url = format!(
            "https://pcweb.api.mgtv.com/episode/list?video_id={vid}&page=1&size=100"
        );
        let response: EpisodeListResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .data
            .map(|d| d.list)
            .unwrap_or_default()
            .into_iter()
            // "1" marks full episodes; trailers and clips are interleaved.
            .filter(|ep| ep.is_intact == "1" && !ep.url.is_empty())
            .enumerate()
            .map(|(i, ep)| EpisodeInfo {
                number: ep.index_label.parse().unwrap_or(i as u32 + 1),
                title: ep.title,
                url: format!("https://www.mgtv.com{}", ep.url),
            })
            .collect())
    }

    async fn comments(&self, url: &str) -> Result<CommentPayload, SourceError> {
        let (cid, vid) = Self::ids_from_url(url)?;
        let info_url = format!("https://pcweb.api.mgtv.com/video/info?cid={cid}&vid={vid}");
        let response: VideoInfoResponse = self
            .client
            .get(&info_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let duration_ms = response
            .data
            .and_then(|d| d.info)
            .map(|info| parse_clock(&info.time) * 1000)
            .unwrap_or(0);
        let chunks = duration_ms.div_ceil(CHUNK_SPAN_MS).max(1);

        let segments = (0..chunks)
            .map(|i| {
                let start_ms = i * CHUNK_SPAN_MS;
                SegmentSlice {
                    start_ms,
                    end_ms: (start_ms + CHUNK_SPAN_MS).min(duration_ms.max(CHUNK_SPAN_MS)),
                    locator: format!("{cid}/{vid}/{start_ms}"),
                }
            })
            .collect();
        debug!(cid, vid, chunks, "mgtv barrage chunk index");

        Ok(CommentPayload::Segmented(segments))
    }

    async fn segment_comments(&self, locator: &str) -> Result<Vec<RawComment>, SourceError> {
        let parts: Vec<&str> = locator.splitn(3, '/').collect();
        let [cid, vid, offset] = parts.as_slice() else {
            return Err(SourceError::Other(format!("bad locator {locator}")));
        };
        let url = format!(
            "https://galaxy.bz.mgtv.com/rdbarrage?vid={vid}&cid={cid}&time={offset}"
        );
        let response: BarrageResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .data
            .and_then(|d| d.items)
            .unwrap_or_default()
            .into_iter()
            .filter(|item| !item.content.is_empty())
            .map(|item| RawComment {
                time_ms: item.time,
                // Type 1 pins to the top; everything else scrolls. No color channel.
                mode: match item.kind {
                    Some(1) => Some(5),
                    _ => Some(1),
                },
                color: None,
                text: item.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_regex_and_ids() {
        let (cid, vid) = Mgtv::ids_from_url("https://www.mgtv.com/b/301218/3605252.html").unwrap();
        assert_eq!(cid, "301218");
        assert_eq!(vid, "3605252");
        assert!(Mgtv::ids_from_url("https://www.mgtv.com/h/12345.html").is_err());
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("00:45:30"), 2730);
        assert_eq!(parse_clock("45:30"), 2730);
        assert_eq!(parse_clock("1:00:00"), 3600);
        assert_eq!(parse_clock(""), 0);
    }
}
