//! bilibili source adapter.
//!
//! Search goes through the web search API (`media_bangumi`), episodes through
//! the PGC season view, and the comment track is the classic whole-track XML
//! danmu list keyed by `cid`.

use std::sync::LazyLock;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::adapter::{
    CommentPayload, EpisodeInfo, MediaCandidate, MediaType, RawComment, SearchHints, SourceAdapter,
};
use crate::client::SourceClient;
use crate::error::SourceError;
use crate::registry::SourceKind;

pub static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:www\.)?bilibili\.com/(?:bangumi/play/(?:ep|ss)\d+|video/(?:BV[0-9A-Za-z]+|av\d+))")
        .unwrap()
});

static EP_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/bangumi/play/ep(\d+)").unwrap());
static SEASON_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/bangumi/play/ss(\d+)").unwrap());
static BVID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/video/(BV[0-9A-Za-z]+)").unwrap());
static EM_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?em[^>]*>").unwrap());

const API_BASE: &str = "https://api.bilibili.com";

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(alias = "result")]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    result: Vec<SearchMedia>,
}

#[derive(Debug, Deserialize)]
struct SearchMedia {
    season_id: u64,
    title: String,
    #[serde(default)]
    season_type_name: String,
    #[serde(default)]
    ep_size: Option<u32>,
    #[serde(default)]
    pubtime: Option<i64>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeasonData {
    #[serde(default)]
    episodes: Vec<SeasonEpisode>,
}

#[derive(Debug, Deserialize)]
struct SeasonEpisode {
    id: u64,
    cid: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    long_title: String,
}

#[derive(Debug, Deserialize)]
struct VideoView {
    cid: u64,
}

pub struct Bilibili {
    client: SourceClient,
}

impl Bilibili {
    pub fn new(client: Client) -> Self {
        let mut client = SourceClient::new("bilibili", client);
        client.set_referer_static("https://www.bilibili.com/");
        Self { client }
    }

    async fn fetch_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, SourceError> {
        let envelope: ApiEnvelope<T> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if envelope.code != 0 {
            return Err(SourceError::UpstreamRejected(format!(
                "code {}: {}",
                envelope.code, envelope.message
            )));
        }
        envelope
            .data
            .ok_or_else(|| SourceError::Other("empty response body".into()))
    }

    async fn season_episodes(&self, query: &str) -> Result<Vec<SeasonEpisode>, SourceError> {
        let url = format!("{API_BASE}/pgc/view/web/season?{query}");
        let season: SeasonData = self.fetch_json(&url).await?;
        Ok(season.episodes)
    }

    /// Resolve the danmu track id (`cid`) behind a playback URL.
    async fn resolve_cid(&self, url: &str) -> Result<u64, SourceError> {
        if let Some(caps) = EP_ID_REGEX.captures(url) {
            let ep_id: u64 = caps[1].parse().map_err(|_| {
                SourceError::InvalidUrl(url.to_string())
            })?;
            let episodes = self.season_episodes(&format!("ep_id={ep_id}")).await?;
            return episodes
                .iter()
                .find(|e| e.id == ep_id)
                .or_else(|| episodes.first())
                .map(|e| e.cid)
                .ok_or_else(|| SourceError::Other(format!("no episodes for ep{ep_id}")));
        }

        if let Some(caps) = SEASON_ID_REGEX.captures(url) {
            let season_id = &caps[1];
            let episodes = self.season_episodes(&format!("season_id={season_id}")).await?;
            return episodes
                .first()
                .map(|e| e.cid)
                .ok_or_else(|| SourceError::Other(format!("no episodes for ss{season_id}")));
        }

        if let Some(caps) = BVID_REGEX.captures(url) {
            let view: VideoView = self
                .fetch_json(&format!("{API_BASE}/x/web-interface/view?bvid={}", &caps[1]))
                .await?;
            return Ok(view.cid);
        }

        Err(SourceError::InvalidUrl(url.to_string()))
    }

    async fn fetch_track(&self, cid: u64) -> Result<Vec<RawComment>, SourceError> {
        let url = format!("{API_BASE}/x/v1/dm/list.so?oid={cid}");
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let comments = parse_danmu_xml(&body)?;
        debug!(cid, count = comments.len(), "fetched bilibili danmu track");
        Ok(comments)
    }
}

/// Parse the classic `<d p="time,mode,size,color,...">text</d>` track.
///
/// Time is fractional seconds; mode codes 1-3 scroll, 4 bottom, 5 top are
/// already the shared code space, passed through unchanged.
fn parse_danmu_xml(xml: &str) -> Result<Vec<RawComment>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut comments = Vec::new();
    let mut pending: Option<(u64, Option<u8>, Option<u32>)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"d" => {
                pending = e
                    .try_get_attribute("p")
                    .ok()
                    .flatten()
                    .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
                    .and_then(|p| parse_p_attribute(&p));
            }
            Ok(Event::Text(ref t)) => {
                if let Some((time_ms, mode, color)) = pending.take() {
                    let text = t.unescape().map_err(|e| SourceError::XmlError(e.to_string()))?;
                    if !text.is_empty() {
                        comments.push(RawComment {
                            time_ms,
                            mode,
                            color,
                            text: text.into_owned(),
                        });
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"d" => {
                pending = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::XmlError(e.to_string())),
            _ => {}
        }
    }

    Ok(comments)
}

fn parse_p_attribute(p: &str) -> Option<(u64, Option<u8>, Option<u32>)> {
    let mut parts = p.split(',');
    let time_secs: f64 = parts.next()?.parse().ok()?;
    let mode: Option<u8> = parts.next().and_then(|m| m.parse().ok());
    let _font_size = parts.next();
    let color: Option<u32> = parts.next().and_then(|c| c.parse().ok());
    Some(((time_secs * 1000.0) as u64, mode, color))
}

#[async_trait]
impl SourceAdapter for Bilibili {
    fn kind(&self) -> SourceKind {
        SourceKind::Bilibili
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
            "{API_BASE}/x/web-interface/search/type?search_type=media_bangumi&keyword={}",
            urlencoding::encode(keyword)
        );
        let data: SearchData = match self.fetch_json(&url).await {
            Ok(data) => data,
            // The search API reports "no result" as a non-zero code.
            Err(SourceError::UpstreamRejected(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(data
            .result
            .into_iter()
            .map(|media| {
                let title = EM_TAG_REGEX.replace_all(&media.title, "").into_owned();
                let media_type = if media.season_type_name == "电影" {
                    MediaType::Movie
                } else {
                    MediaType::Series
                };
                let url = media
                    .url
                    .unwrap_or_else(|| format!("https://www.bilibili.com/bangumi/play/ss{}", media.season_id));
                MediaCandidate {
                    source: SourceKind::Bilibili,
                    media_id: media.season_id.to_string(),
                    title,
                    media_type,
                    season: None,
                    year: media.pubtime.map(|ts| (1970 + ts / 31_556_952) as i32),
                    url,
                    episode_count: media.ep_size,
                }
            })
            .collect())
    }

    async fn episodes(&self, media: &MediaCandidate) -> Result<Vec<EpisodeInfo>, SourceError> {
        let episodes = self
            .season_episodes(&format!("season_id={}", media.media_id))
            .await?;

        Ok(episodes
            .into_iter()
            .enumerate()
            .map(|(i, ep)| {
                let number = ep.title.parse::<u32>().unwrap_or(i as u32 + 1);
                let title = if ep.long_title.is_empty() {
                    format!("第{}话", ep.title)
                } else {
                    ep.long_title
                };
                EpisodeInfo {
                    number,
                    title,
                    url: format!("https://www.bilibili.com/bangumi/play/ep{}", ep.id),
                }
            })
            .collect())
    }

    async fn comments(&self, url: &str) -> Result<CommentPayload, SourceError> {
        let cid = self.resolve_cid(url).await?;
        Ok(CommentPayload::Full(self.fetch_track(cid).await?))
    }

    /// bilibili tracks are fetched whole; the locator of the single synthetic
    /// segment is the playback URL itself.
    async fn segment_comments(&self, locator: &str) -> Result<Vec<RawComment>, SourceError> {
        match self.comments(locator).await? {
            CommentPayload::Full(comments) => Ok(comments),
            CommentPayload::Segmented(_) => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_regex() {
        assert!(URL_REGEX.is_match("https://www.bilibili.com/bangumi/play/ep836727"));
        assert!(URL_REGEX.is_match("https://www.bilibili.com/bangumi/play/ss48852"));
        assert!(URL_REGEX.is_match("https://www.bilibili.com/video/BV1xx411c7mD"));
        assert!(!URL_REGEX.is_match("https://v.qq.com/x/cover/abc/def.html"));
    }

    #[test]
    fn test_parse_danmu_xml() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <i>
              <chatserver>chat.bilibili.com</chatserver>
              <d p="12.5,1,25,16777215,1700000000,0,abc,123">前方高能</d>
              <d p="600.02,5,25,16711680,1700000001,0,def,456">名场面</d>
            </i>"#;

        let comments = parse_danmu_xml(xml).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].time_ms, 12_500);
        assert_eq!(comments[0].mode, Some(1));
        assert_eq!(comments[0].color, Some(16_777_215));
        assert_eq!(comments[0].text, "前方高能");
        assert_eq!(comments[1].time_ms, 600_020);
        assert_eq!(comments[1].mode, Some(5));
    }

    #[test]
    fn test_parse_p_attribute_short() {
        // Degenerate attribute with only a timestamp still yields a comment.
        let parsed = parse_p_attribute("3.5").unwrap();
        assert_eq!(parsed.0, 3_500);
        assert_eq!(parsed.1, None);
        assert_eq!(parsed.2, None);
    }
}
