//! Tencent Video (v.qq.com) source adapter.
//!
//! The comment track is natively segmented: a barrage catalogue lists 30s
//! slices which are fetched one by one. Segment locators are
//! `"{vid}/{segment_name}"`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::adapter::{
    CommentPayload, EpisodeInfo, MediaCandidate, MediaType, RawComment, SearchHints, SegmentSlice,
    SourceAdapter,
};
use crate::client::SourceClient;
use crate::error::SourceError;
use crate::registry::SourceKind;

pub static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"v\.qq\.com/x/(?:cover/\w+/(\w+)\.html|page/(\w+)\.html)").unwrap()
});

const SEARCH_URL: &str = "https://pbaccess.video.qq.com/trpc.videosearch.mobile_search.MultiTerminalSearch/MbSearch?vplatform=2";
const EPISODE_URL: &str = "https://pbaccess.video.qq.com/trpc.universal_backend_service.page_server_rpc.PageServer/GetPageData?video_appid=3000010&vplatform=2";
const BARRAGE_BASE: &str = "https://dm.video.qq.com/barrage";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: SearchResponseData,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponseData {
    #[serde(default, rename = "normalList")]
    normal_list: ItemList,
}

#[derive(Debug, Default, Deserialize)]
struct ItemList {
    #[serde(default, rename = "itemList")]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default, rename = "videoInfo")]
    video_info: Option<VideoInfo>,
    #[serde(default)]
    doc: Option<Doc>,
}

#[derive(Debug, Deserialize)]
struct Doc {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    title: String,
    #[serde(default, rename = "typeName")]
    type_name: String,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default, rename = "episodeSites")]
    episode_sites: Vec<EpisodeSite>,
}

#[derive(Debug, Deserialize)]
struct EpisodeSite {
    #[serde(default, rename = "totalEpisode")]
    total_episode: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BarrageCatalogue {
    #[serde(default)]
    segment_span: Option<String>,
    #[serde(default)]
    segment_index: std::collections::BTreeMap<String, CatalogueEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogueEntry {
    segment_name: String,
    segment_start: String,
}

#[derive(Debug, Deserialize)]
struct BarrageSegment {
    #[serde(default)]
    barrage_list: Vec<BarrageItem>,
}

#[derive(Debug, Deserialize)]
struct BarrageItem {
    #[serde(default)]
    time_offset: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    content_style: String,
}

/// Optional style blob carried by a barrage item, JSON inside a string.
#[derive(Debug, Default, Deserialize)]
struct ContentStyle {
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    position: Option<u8>,
}

pub struct Tencent {
    client: SourceClient,
}

impl Tencent {
    pub fn new(client: Client) -> Self {
        let mut client = SourceClient::new("tencent", client);
        client.set_origin_static("https://v.qq.com");
        client.set_referer_static("https://v.qq.com/");
        Self { client }
    }

    fn vid_from_url(url: &str) -> Result<String, SourceError> {
        URL_REGEX
            .captures(url)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| SourceError::InvalidUrl(url.to_string()))
    }
}

#[async_trait]
impl SourceAdapter for Tencent {
    fn kind(&self) -> SourceKind {
        SourceKind::Tencent
    }

    fn handles_url(&self, url: &str) -> bool {
        URL_REGEX.is_match(url)
    }

    async fn search(
        &self,
        keyword: &str,
        _hints: &SearchHints,
    ) -> Result<Vec<MediaCandidate>, SourceError> {
        let body = json!({
            "version": "",
            "query": keyword,
            "retrieveRecord": {},
            "pageNum": 0,
            "pageSize": 20,
        });
        let response: SearchResponse = self
            .client
            .request(reqwest::Method::POST, SEARCH_URL)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .data
            .normal_list
            .items
            .into_iter()
            .filter_map(|item| {
                let info = item.video_info?;
                let cid = item.doc.map(|d| d.id).filter(|id| !id.is_empty())?;
                if info.title.is_empty() {
                    return None;
                }
                let media_type = if info.type_name == "电影" {
                    MediaType::Movie
                } else {
                    MediaType::Series
                };
                let episode_count = info
                    .episode_sites
                    .first()
                    .and_then(|site| site.total_episode);
                Some(MediaCandidate {
                    source: SourceKind::Tencent,
                    media_id: cid.clone(),
                    title: strip_highlight(&info.title),
                    media_type,
                    season: None,
                    year: info.year,
                    url: format!("https://v.qq.com/x/cover/{cid}.html"),
                    episode_count,
                })
            })
            .collect())
    }

    async fn episodes(&self, media: &MediaCandidate) -> Result<Vec<EpisodeInfo>, SourceError> {
        let body = json!({
            "page_params": {
                "req_from": "web_vsite",
                "page_id": "vsite_episode_list",
                "page_type": "detail_operation",
                "id_type": "1",
                "cid": media.media_id,
                "page_size": "100",
                "page_context": "",
            }
        });
        let response: serde_json::Value = self
            .client
            .request(reqwest::Method::POST, EPISODE_URL)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // The page server nests episode tabs several levels deep; walk down to
        // the item_datas list and keep entries that carry a vid.
        let mut episodes = Vec::new();
        let modules = response
            .pointer("/data/module_list_datas")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for module in &modules {
            let items = module
                .pointer("/module_datas/0/item_data_lists/item_datas")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            for item in &items {
                let Some(params) = item.pointer("/item_params") else {
                    continue;
                };
                let vid = params.get("vid").and_then(|v| v.as_str()).unwrap_or_default();
                if vid.is_empty() {
                    continue;
                }
                // Trailers and features share the list with real episodes.
                if params.get("is_trailer").and_then(|v| v.as_str()) == Some("1") {
                    continue;
                }
                let number = params
                    .get("title")
                    .and_then(|v| v.as_str())
                    .and_then(|t| t.parse::<u32>().ok())
                    .unwrap_or(episodes.len() as u32 + 1);
                let title = params
                    .get("play_title")
                    .or_else(|| params.get("union_title"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                episodes.push(EpisodeInfo {
                    number,
                    title,
                    url: format!("https://v.qq.com/x/cover/{}/{vid}.html", media.media_id),
                });
            }
        }
        Ok(episodes)
    }

    async fn comments(&self, url: &str) -> Result<CommentPayload, SourceError> {
        let vid = Self::vid_from_url(url)?;
        let catalogue: BarrageCatalogue = self
            .client
            .get(&format!("{BARRAGE_BASE}/base/{vid}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let span: u64 = catalogue
            .segment_span
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30_000);

        let mut segments: Vec<SegmentSlice> = catalogue
            .segment_index
            .values()
            .filter_map(|entry| {
                let start_ms: u64 = entry.segment_start.parse().ok()?;
                Some(SegmentSlice {
                    start_ms,
                    end_ms: start_ms + span,
                    locator: format!("{vid}/{}", entry.segment_name),
                })
            })
            .collect();
        segments.sort_by_key(|s| s.start_ms);
        debug!(vid, segments = segments.len(), "tencent barrage catalogue");

        Ok(CommentPayload::Segmented(segments))
    }

    async fn segment_comments(&self, locator: &str) -> Result<Vec<RawComment>, SourceError> {
        let segment: BarrageSegment = self
            .client
            .get(&format!("{BARRAGE_BASE}/segment/{locator}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(segment
            .barrage_list
            .into_iter()
            .filter_map(|item| {
                let time_ms: u64 = item.time_offset.parse().ok()?;
                if item.content.is_empty() {
                    return None;
                }
                let style: ContentStyle =
                    serde_json::from_str(&item.content_style).unwrap_or_default();
                let color = style
                    .color
                    .as_deref()
                    .and_then(|c| u32::from_str_radix(c.trim_start_matches('#'), 16).ok());
                // Position 2 pins to the top, 3 to the bottom; default scrolls.
                let mode = match style.position {
                    Some(2) => Some(5),
                    Some(3) => Some(4),
                    _ => Some(1),
                };
                Some(RawComment {
                    time_ms,
                    mode,
                    color,
                    text: item.content,
                })
            })
            .collect())
    }
}

fn strip_highlight(title: &str) -> String {
    static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?(?:em|b)[^>]*>").unwrap());
    TAG.replace_all(title, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_regex_and_vid() {
        assert!(URL_REGEX.is_match("https://v.qq.com/x/cover/mzc00200abc/z0047dq0qsj.html"));
        assert_eq!(
            Tencent::vid_from_url("https://v.qq.com/x/cover/mzc00200abc/z0047dq0qsj.html").unwrap(),
            "z0047dq0qsj"
        );
        assert_eq!(
            Tencent::vid_from_url("https://v.qq.com/x/page/a1234567890.html").unwrap(),
            "a1234567890"
        );
        assert!(Tencent::vid_from_url("https://v.qq.com/channel/tv").is_err());
    }

    #[test]
    fn test_strip_highlight() {
        assert_eq!(strip_highlight("<em class=\"hl\">三体</em> 第一季"), "三体 第一季");
    }

    #[test]
    fn test_segment_style_parsing() {
        let style: ContentStyle = serde_json::from_str(r#"{"color":"ff0000","position":2}"#).unwrap();
        assert_eq!(style.color.as_deref(), Some("ff0000"));
        assert_eq!(style.position, Some(2));
    }
}
