//! Integration tests for the aggregation engine.
//!
//! These drive the engine through its public facade with a mock source
//! adapter, verifying the caching, matching, admission and normalization
//! contracts end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use danmu_hub::config::AppConfig;
use danmu_hub::engine::DanmuEngine;
use danmu_hub::error::Error;
use danmu_hub::model::CommentsOutcome;
use danmu_hub::registry::FsMirror;
use danmu_sources::{
    CommentPayload, EpisodeInfo, MediaCandidate, MediaType, RawComment, SearchHints, SegmentSlice,
    SourceAdapter, SourceError, SourceKind, SourceRegistry,
};

/// How the mock serves comment tracks.
#[derive(Clone)]
enum MockPayload {
    /// Whole track with this many comments, 1s apart.
    Full(usize),
    /// Three 30s slices, each holding one comment.
    Segmented,
}

struct MockSource {
    titles: Vec<&'static str>,
    payload: MockPayload,
    search_calls: AtomicU32,
    comment_calls: AtomicU32,
}

impl MockSource {
    fn new(titles: Vec<&'static str>, payload: MockPayload) -> Arc<Self> {
        Arc::new(Self {
            titles,
            payload,
            search_calls: AtomicU32::new(0),
            comment_calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Bilibili
    }

    fn handles_url(&self, url: &str) -> bool {
        url.starts_with("https://mock.example/")
    }

    async fn search(
        &self,
        _keyword: &str,
        _hints: &SearchHints,
    ) -> Result<Vec<MediaCandidate>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .titles
            .iter()
            .enumerate()
            .map(|(i, title)| MediaCandidate {
                source: SourceKind::Bilibili,
                media_id: format!("m{i}"),
                title: title.to_string(),
                media_type: MediaType::Series,
                season: None,
                year: None,
                url: format!("https://mock.example/media/{i}"),
                episode_count: Some(2),
            })
            .collect())
    }

    async fn episodes(&self, media: &MediaCandidate) -> Result<Vec<EpisodeInfo>, SourceError> {
        Ok((1..=2)
            .map(|n| EpisodeInfo {
                number: n,
                title: format!("第{n}集"),
                url: format!("https://mock.example/{}/ep/{n}", media.media_id),
            })
            .collect())
    }

    async fn comments(&self, _url: &str) -> Result<CommentPayload, SourceError> {
        self.comment_calls.fetch_add(1, Ordering::SeqCst);
        match self.payload {
            MockPayload::Full(count) => Ok(CommentPayload::Full(
                (0..count)
                    .map(|i| RawComment {
                        time_ms: i as u64 * 1000,
                        mode: Some(1),
                        color: Some(0xFFFFFF),
                        text: format!("comment {i}"),
                    })
                    .collect(),
            )),
            MockPayload::Segmented => Ok(CommentPayload::Segmented(
                (0..3)
                    .map(|i| SegmentSlice {
                        start_ms: i * 30_000,
                        end_ms: (i + 1) * 30_000,
                        locator: format!("mock/{i}"),
                    })
                    .collect(),
            )),
        }
    }

    async fn segment_comments(&self, locator: &str) -> Result<Vec<RawComment>, SourceError> {
        let index: u64 = locator.trim_start_matches("mock/").parse().unwrap_or(0);
        Ok(vec![RawComment {
            time_ms: index * 30_000 + 500,
            mode: Some(1),
            color: None,
            text: format!("slice {index}"),
        }])
    }
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.sources.timeout_secs = 2;
    config.cache.max_animes = 10;
    config.normalize.max_comments_thousands = 1;
    config.admission.max_requests = 3;
    config.admission.window_secs = 1;
    config
}

fn engine_with(
    config: AppConfig,
    source: Arc<MockSource>,
) -> Arc<DanmuEngine> {
    let registry = SourceRegistry::from_adapters(vec![source as Arc<dyn SourceAdapter>]);
    DanmuEngine::new(config, registry, None)
}

mod search_tests {
    use super::*;

    #[tokio::test]
    async fn test_identical_searches_fan_out_once() {
        let source = MockSource::new(vec!["生万物"], MockPayload::Full(10));
        let engine = engine_with(test_config(), source.clone());

        let first = engine.search_title("生万物 S02E08").await.unwrap();
        let second = engine.search_title("生万物 第8集").await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        // Same normalized keyword, one upstream fan-out.
        assert_eq!(source.search_calls.load(Ordering::SeqCst), 1);
        // Search traffic never touches the admission window.
        assert_eq!(engine.admission_remaining("anyone"), 3);
    }

    #[tokio::test]
    async fn test_no_match_is_empty_success() {
        let source = MockSource::new(vec![], MockPayload::Full(0));
        let engine = engine_with(test_config(), source);

        let candidates = engine.search_title("不存在的剧").await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_direct_url_bypasses_search() {
        let source = MockSource::new(vec!["ignored"], MockPayload::Full(5));
        let engine = engine_with(test_config(), source.clone());

        let candidates = engine
            .search_title("https://mock.example/v/99")
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(source.search_calls.load(Ordering::SeqCst), 0);

        // The registered single episode is immediately fetchable by id.
        let episodes = engine.resolve_episodes(candidates[0].anime_id).await.unwrap();
        assert_eq!(episodes.len(), 1);
        let outcome = engine
            .fetch_comments("client", &episodes[0].episode_id.to_string(), false, false)
            .await
            .unwrap();
        let CommentsOutcome::Full(comments) = outcome else {
            panic!("expected full outcome");
        };
        assert_eq!(comments.len(), 5);
    }

    #[tokio::test]
    async fn test_manual_selection_is_sticky() {
        let source = MockSource::new(vec!["某科学的超电磁炮", "某科学的超电磁炮T"], MockPayload::Full(1));
        let engine = engine_with(test_config(), source);

        let first = engine.search_title("某科学的超电磁炮").await.unwrap();
        assert_eq!(first[0].title, "某科学的超电磁炮");
        let wanted = first
            .iter()
            .find(|c| c.title == "某科学的超电磁炮T")
            .unwrap()
            .anime_id;

        engine
            .remember_selection("某科学的超电磁炮", wanted)
            .await
            .unwrap();

        // Served from cache, but the remembered id is forced to rank 1.
        let second = engine.search_title("某科学的超电磁炮").await.unwrap();
        assert_eq!(second[0].anime_id, wanted);
    }
}

mod registry_tests {
    use super::*;

    #[tokio::test]
    async fn test_capacity_eviction_drops_oldest_and_its_episodes() {
        let mut config = test_config();
        config.cache.max_animes = 2;
        let source = MockSource::new(vec!["甲", "乙", "丙"], MockPayload::Full(1));
        let engine = engine_with(config, source);

        let candidates = engine.search_title("三选二").await.unwrap();
        assert_eq!(candidates.len(), 3);

        // The first registered entry was evicted when the third arrived.
        let first_id = candidates.iter().map(|c| c.anime_id).min().unwrap();
        assert!(engine.anime(first_id).is_none());

        let surviving: Vec<_> = candidates
            .iter()
            .filter(|c| engine.anime(c.anime_id).is_some())
            .collect();
        assert_eq!(surviving.len(), 2);
    }
}

mod comment_tests {
    use super::*;

    #[tokio::test]
    async fn test_comment_cache_bypasses_admission() {
        let source = MockSource::new(vec![], MockPayload::Full(7));
        let engine = engine_with(test_config(), source.clone());

        let url = "https://mock.example/v/1";
        let first = engine.fetch_comments("c1", url, false, false).await.unwrap();
        let CommentsOutcome::Full(first) = first else {
            panic!("expected full outcome");
        };
        assert_eq!(first.len(), 7);
        assert_eq!(engine.admission_remaining("c1"), 2);

        // Cache hit: no upstream call, no admission state change.
        let second = engine.fetch_comments("c1", url, false, false).await.unwrap();
        let CommentsOutcome::Full(second) = second else {
            panic!("expected full outcome");
        };
        assert_eq!(second.len(), 7);
        assert_eq!(source.comment_calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.admission_remaining("c1"), 2);
    }

    #[tokio::test]
    async fn test_admission_window_limits_cache_misses() {
        let source = MockSource::new(vec![], MockPayload::Full(1));
        let engine = engine_with(test_config(), source);

        for i in 0..3 {
            let url = format!("https://mock.example/v/{i}");
            engine.fetch_comments("1.2.3.4", &url, false, false).await.unwrap();
        }

        let denied = engine
            .fetch_comments("1.2.3.4", "https://mock.example/v/9", false, false)
            .await;
        assert!(matches!(denied, Err(Error::RateLimited(_))));

        // Another client is unaffected.
        engine
            .fetch_comments("5.6.7.8", "https://mock.example/v/9", false, false)
            .await
            .unwrap();

        // After the window elapses the denied client passes again.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        engine
            .fetch_comments("1.2.3.4", "https://mock.example/v/10", false, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_volume_cap_preserves_endpoints() {
        let source = MockSource::new(vec![], MockPayload::Full(5000));
        let engine = engine_with(test_config(), source);

        let outcome = engine
            .fetch_comments("c", "https://mock.example/v/1", false, false)
            .await
            .unwrap();
        let CommentsOutcome::Full(comments) = outcome else {
            panic!("expected full outcome");
        };

        assert!((999..=1001).contains(&comments.len()));
        assert_eq!(comments.first().unwrap().time_ms, 0);
        assert_eq!(comments.last().unwrap().time_ms, 4999 * 1000);
    }

    #[tokio::test]
    async fn test_segment_index_and_slices() {
        let source = MockSource::new(vec![], MockPayload::Segmented);
        let engine = engine_with(test_config(), source.clone());

        let outcome = engine
            .fetch_comments("c", "https://mock.example/v/1", true, false)
            .await
            .unwrap();
        let CommentsOutcome::Segmented(segments) = outcome else {
            panic!("expected segment index");
        };
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].start_ms, 0);
        assert_eq!(segments[2].end_ms, 90_000);

        // Segment-scoped fetch normalizes one slice.
        let slice = engine.fetch_segment("c", &segments[1]).await.unwrap();
        assert_eq!(slice.len(), 1);
        assert_eq!(slice[0].time_ms, 30_500);

        // A repeated slice fetch is a cache hit.
        let before = engine.admission_remaining("c");
        let again = engine.fetch_segment("c", &segments[1]).await.unwrap();
        assert_eq!(again, slice);
        assert_eq!(engine.admission_remaining("c"), before);
    }

    #[tokio::test]
    async fn test_bulk_mode_materializes_segmented_track() {
        let source = MockSource::new(vec![], MockPayload::Segmented);
        let engine = engine_with(test_config(), source);

        let outcome = engine
            .fetch_comments("c", "https://mock.example/v/1", false, false)
            .await
            .unwrap();
        let CommentsOutcome::Full(comments) = outcome else {
            panic!("expected full outcome");
        };
        // All three slices merged and ordered.
        let times: Vec<_> = comments.iter().map(|c| c.time_ms).collect();
        assert_eq!(times, vec![500, 30_500, 60_500]);
    }
}

mod wire_tests {
    use super::*;
    use danmu_hub::api::wire;

    #[tokio::test]
    async fn test_fetched_track_round_trips_xml_and_json() {
        let source = MockSource::new(vec![], MockPayload::Full(25));
        let engine = engine_with(test_config(), source);

        let outcome = engine
            .fetch_comments("c", "https://mock.example/v/1", false, false)
            .await
            .unwrap();
        let CommentsOutcome::Full(comments) = outcome else {
            panic!("expected full outcome");
        };

        let xml = wire::to_xml(&comments).unwrap();
        let from_xml = wire::from_xml(&xml).unwrap();

        let json = serde_json::to_string(&comments).unwrap();
        let from_json: Vec<danmu_hub::model::CanonicalComment> =
            serde_json::from_str(&json).unwrap();

        assert_eq!(from_xml, comments);
        assert_eq!(from_json, comments);
    }
}

mod mirror_tests {
    use super::*;

    #[tokio::test]
    async fn test_state_survives_instance_restart() {
        let dir = tempfile::tempdir().unwrap();

        // Instance A registers state; searches flush the mirror.
        let source = MockSource::new(vec!["转生剧"], MockPayload::Full(1));
        let registry = SourceRegistry::from_adapters(vec![source as Arc<dyn SourceAdapter>]);
        let engine_a = DanmuEngine::new(
            test_config(),
            registry,
            Some(Box::new(FsMirror::new(dir.path(), "t"))),
        );
        let candidates = engine_a.search_title("转生剧").await.unwrap();
        let anime_id = candidates[0].anime_id;
        engine_a.remember_selection("转生剧", anime_id).await.unwrap();

        // Instance B starts empty and converges via read-repair.
        let source_b = MockSource::new(vec!["转生剧"], MockPayload::Full(1));
        let registry_b = SourceRegistry::from_adapters(vec![source_b as Arc<dyn SourceAdapter>]);
        let engine_b = DanmuEngine::new(
            test_config(),
            registry_b,
            Some(Box::new(FsMirror::new(dir.path(), "t"))),
        );
        assert!(engine_b.anime(anime_id).is_none());
        engine_b.sync_from_mirror().await;
        assert!(engine_b.anime(anime_id).is_some());

        // The remembered selection travelled too.
        let ranked = engine_b.search_title("转生剧").await.unwrap();
        assert_eq!(ranked[0].anime_id, anime_id);
    }

    #[tokio::test]
    async fn test_clear_durable_mirrors() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockSource::new(vec!["剧"], MockPayload::Full(1));
        let registry = SourceRegistry::from_adapters(vec![source as Arc<dyn SourceAdapter>]);
        let engine = DanmuEngine::new(
            test_config(),
            registry,
            Some(Box::new(FsMirror::new(dir.path(), "t"))),
        );

        engine.search_title("剧").await.unwrap();
        engine.clear_durable_mirrors().await.unwrap();

        let fresh = DanmuEngine::new(
            test_config(),
            SourceRegistry::from_adapters(vec![]),
            Some(Box::new(FsMirror::new(dir.path(), "t"))),
        );
        fresh.sync_from_mirror().await;
        // Nothing came back from the cleared mirror.
        assert!(fresh.anime(1).is_none());
    }
}

mod extraction_tests {
    use danmu_hub::matcher::{ParsedQuery, parse_query};

    fn parts(raw: &str) -> (String, Option<u32>, Option<u32>) {
        match parse_query(raw).unwrap() {
            ParsedQuery::Title { title, season, episode } => (title, season, episode),
            ParsedQuery::Url(url) => panic!("unexpected url {url}"),
        }
    }

    #[test]
    fn test_filename_extraction_literals() {
        assert_eq!(parts("生万物 S02E08"), ("生万物".into(), Some(2), Some(8)));
        assert_eq!(
            parts("Dark.Matter.S01E03.2160p"),
            ("Dark Matter".into(), Some(1), Some(3))
        );
        assert_eq!(parts("海贼王 第十二集"), ("海贼王".into(), None, Some(12)));
    }
}
