//! iQiyi source adapter.
//!
//! Comment tracks are served as zlib-compressed XML pages covering 300
//! seconds each. Segment locators are `"{tvid}/{page}"`.

use std::io::Read;
use std::sync::LazyLock;

use async_trait::async_trait;
use flate2::read::ZlibDecoder;
use quick_xml::Reader;
use quick_xml::events::Event;
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
    LazyLock::new(|| Regex::new(r"(?:www\.)?iqiyi\.com/v_\w+\.html").unwrap());

static TVID_PARAM_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?#&]tvid=(\d+)").unwrap());
static TVID_PAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""tvId"\s*:\s*(\d+)"#).unwrap());

/// Seconds of track covered by one bullet page.
const PAGE_SPAN_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    docinfos: Vec<DocInfo>,
}

#[derive(Debug, Deserialize)]
struct DocInfo {
    #[serde(rename = "albumDocInfo")]
    album: Option<AlbumDoc>,
}

#[derive(Debug, Deserialize)]
struct AlbumDoc {
    #[serde(default, rename = "albumTitle")]
    title: String,
    #[serde(default, rename = "albumId")]
    album_id: u64,
    #[serde(default, rename = "albumLink")]
    link: String,
    #[serde(default)]
    channel: String,
    #[serde(default, rename = "itemTotalNumber")]
    item_total: Option<u32>,
    #[serde(default, rename = "releaseDate")]
    release_date: String,
}

#[derive(Debug, Deserialize)]
struct AlbumListResponse {
    #[serde(default)]
    data: Option<AlbumListData>,
}

#[derive(Debug, Deserialize)]
struct AlbumListData {
    // "epsodelist" is the upstream field name, not a typo here.
    #[serde(default, rename = "epsodelist")]
    episodes: Vec<AlbumEpisode>,
}

#[derive(Debug, Deserialize)]
struct AlbumEpisode {
    #[serde(default)]
    name: String,
    #[serde(default)]
    order: u32,
    #[serde(default, rename = "playUrl")]
    play_url: String,
    #[serde(default, rename = "tvId")]
    tv_id: u64,
}

#[derive(Debug, Deserialize)]
struct BaseInfoResponse {
    #[serde(default)]
    data: Option<BaseInfo>,
}

#[derive(Debug, Deserialize)]
struct BaseInfo {
    #[serde(default, rename = "durationSec")]
    duration_sec: u64,
}

pub struct Iqiyi {
    client: SourceClient,
}

impl Iqiyi {
    pub fn new(client: Client) -> Self {
        let mut client = SourceClient::new("iqiyi", client);
        client.set_referer_static("https://www.iqiyi.com/");
        Self { client }
    }

    /// Resolve the numeric tvid behind a playback URL. Episode URLs minted by
    /// this adapter carry it as a fragment; user-pasted page URLs need a page
    /// fetch.
    async fn resolve_tvid(&self, url: &str) -> Result<u64, SourceError> {
        if let Some(caps) = TVID_PARAM_REGEX.captures(url) {
            return caps[1]
                .parse()
                .map_err(|_| SourceError::InvalidUrl(url.to_string()));
        }

        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        TVID_PAGE_REGEX
            .captures(&html)
            .and_then(|caps| caps[1].parse().ok())
            .ok_or_else(|| SourceError::Other(format!("no tvid in page {url}")))
    }

    async fn duration_secs(&self, tvid: u64) -> Result<u64, SourceError> {
        let url = format!("https://pcw-api.iqiyi.com/video/video/baseinfo/{tvid}");
        let response: BaseInfoResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.data.map(|d| d.duration_sec).unwrap_or(0))
    }
}

#[async_trait]
impl SourceAdapter for Iqiyi {
    fn kind(&self) -> SourceKind {
        SourceKind::Iqiyi
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
            "https://search.video.iqiyi.com/o?if=html5&key={}&pageNum=1&pageSize=20",
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

        Ok(response
            .data
            .map(|d| d.docinfos)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|doc| {
                let album = doc.album?;
                if album.title.is_empty() || album.album_id == 0 {
                    return None;
                }
                let media_type = if album.channel.contains("电影") {
                    MediaType::Movie
                } else {
                    MediaType::Series
                };
                let year = album
                    .release_date
                    .get(..4)
                    .and_then(|y| y.parse::<i32>().ok());
                Some(MediaCandidate {
                    source: SourceKind::Iqiyi,
                    media_id: album.album_id.to_string(),
                    title: album.title,
                    media_type,
                    season: None,
                    year,
                    url: album.link,
                    episode_count: album.item_total,
                })
            })
            .collect())
    }

    async fn episodes(&self, media: &MediaCandidate) -> Result<Vec<EpisodeInfo>, SourceError> {
        let url = format!(
            "https://pcw-api.iqiyi.com/albums/album/avlistinfo?aid={}&page=1&size=200",
            media.media_id
        );
        let response: AlbumListResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .data
            .map(|d| d.episodes)
            .unwrap_or_default()
            .into_iter()
            .filter(|ep| ep.tv_id != 0 && !ep.play_url.is_empty())
            .map(|ep| EpisodeInfo {
                number: ep.order,
                title: ep.name,
                // Keep the tvid on the URL so the comment path skips a page fetch.
                url: format!("{}#tvid={}", ep.play_url, ep.tv_id),
            })
            .collect())
    }

    async fn comments(&self, url: &str) -> Result<CommentPayload, SourceError> {
        let tvid = self.resolve_tvid(url).await?;
        let duration = self.duration_secs(tvid).await?;
        let pages = duration.div_ceil(PAGE_SPAN_SECS).max(1);

        let segments = (1..=pages)
            .map(|page| SegmentSlice {
                start_ms: (page - 1) * PAGE_SPAN_SECS * 1000,
                end_ms: (page * PAGE_SPAN_SECS * 1000).min(duration.max(1) * 1000),
                locator: format!("{tvid}/{page}"),
            })
            .collect();
        debug!(tvid, pages, "iqiyi bullet page index");

        Ok(CommentPayload::Segmented(segments))
    }

    async fn segment_comments(&self, locator: &str) -> Result<Vec<RawComment>, SourceError> {
        let (tvid, page) = locator
            .split_once('/')
            .ok_or_else(|| SourceError::Other(format!("bad locator {locator}")))?;
        if tvid.len() < 4 {
            return Err(SourceError::Other(format!("bad tvid {tvid}")));
        }
        let s1 = &tvid[tvid.len() - 4..tvid.len() - 2];
        let s2 = &tvid[tvid.len() - 2..];
        let url = format!("https://cmts.iqiyi.com/bullet/{s1}/{s2}/{tvid}_300_{page}.z");

        let compressed = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let mut xml = String::new();
        ZlibDecoder::new(compressed.as_ref())
            .read_to_string(&mut xml)
            .map_err(|e| SourceError::Other(format!("bullet inflate failed: {e}")))?;

        parse_bullet_xml(&xml)
    }
}

/// Parse `<bulletInfo>` elements out of one inflated bullet page.
fn parse_bullet_xml(xml: &str) -> Result<Vec<RawComment>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut comments = Vec::new();
    let mut field: Vec<u8> = Vec::new();
    let mut content = String::new();
    let mut show_time: Option<u64> = None;
    let mut color: Option<u32> = None;
    let mut position: Option<u8> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                field = e.name().as_ref().to_vec();
                if field == b"bulletInfo" {
                    content.clear();
                    show_time = None;
                    color = None;
                    position = None;
                }
            }
            Ok(Event::Text(ref t)) => {
                let value = t.unescape().map_err(|e| SourceError::XmlError(e.to_string()))?;
                match field.as_slice() {
                    b"content" => content = value.into_owned(),
                    b"showTime" => show_time = value.parse().ok(),
                    b"color" => color = u32::from_str_radix(value.trim_start_matches('#'), 16).ok(),
                    b"position" => position = value.parse().ok(),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"bulletInfo" {
                    if let Some(secs) = show_time.take() {
                        if !content.is_empty() {
                            let mode = match position {
                                Some(1) => Some(5),
                                Some(2) => Some(4),
                                _ => Some(1),
                            };
                            comments.push(RawComment {
                                time_ms: secs * 1000,
                                mode,
                                color,
                                text: std::mem::take(&mut content),
                            });
                        }
                    }
                }
                field.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::XmlError(e.to_string())),
            _ => {}
        }
    }

    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_regex() {
        assert!(URL_REGEX.is_match("https://www.iqiyi.com/v_19rrok4nt0.html"));
        assert!(!URL_REGEX.is_match("https://www.iqiyi.com/a_19rrhcqwst.html"));
    }

    #[test]
    fn test_tvid_from_fragment() {
        let caps = TVID_PARAM_REGEX
            .captures("https://www.iqiyi.com/v_abc.html#tvid=123456789")
            .unwrap();
        assert_eq!(&caps[1], "123456789");
    }

    #[test]
    fn test_parse_bullet_xml() {
        let xml = r#"<danmu><data><entry><list>
            <bulletInfo>
              <contentId>1</contentId>
              <content>弹幕一条</content>
              <showTime>15</showTime>
              <color>ffffff</color>
              <position>0</position>
            </bulletInfo>
            <bulletInfo>
              <contentId>2</contentId>
              <content>顶部弹幕</content>
              <showTime>292</showTime>
              <color>ff0000</color>
              <position>1</position>
            </bulletInfo>
        </list></entry></data></danmu>"#;

        let comments = parse_bullet_xml(xml).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].time_ms, 15_000);
        assert_eq!(comments[0].mode, Some(1));
        assert_eq!(comments[1].time_ms, 292_000);
        assert_eq!(comments[1].mode, Some(5));
        assert_eq!(comments[1].color, Some(0xff0000));
    }

    #[test]
    fn test_segment_locator_shape() {
        // Locator digits drive the bullet path: .../ bullet/{s1}/{s2}/{tvid}_300_{page}.z
        let tvid = "2076679000";
        let s1 = &tvid[tvid.len() - 4..tvid.len() - 2];
        let s2 = &tvid[tvid.len() - 2..];
        assert_eq!(s1, "90");
        assert_eq!(s2, "00");
    }
}
