//! Concurrent source fan-out.
//!
//! Every configured adapter is queried as an independent task with its own
//! timeout. "All" mode awaits the full set and merges results in configured
//! order; "fastest" mode takes the first non-empty success and aborts the
//! rest. Aborted tasks may already have queued results; dropping the JoinSet
//! discards them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use danmu_sources::{MediaCandidate, SearchHints, SourceAdapter};

use crate::config::FanoutMode;

/// Query `adapters` for `keyword` and merge per the configured join mode.
///
/// Adapter errors and timeouts contribute nothing; they never fail the
/// aggregate operation.
pub async fn search_sources(
    adapters: &[Arc<dyn SourceAdapter>],
    keyword: &str,
    hints: SearchHints,
    mode: FanoutMode,
    timeout: Duration,
) -> Vec<MediaCandidate> {
    if adapters.is_empty() {
        return Vec::new();
    }

    let mut set = JoinSet::new();
    for (index, adapter) in adapters.iter().enumerate() {
        let adapter = Arc::clone(adapter);
        let keyword = keyword.to_string();
        set.spawn(async move {
            let kind = adapter.kind();
            let result = tokio::time::timeout(timeout, adapter.search(&keyword, &hints)).await;
            let candidates = match result {
                Ok(Ok(candidates)) => candidates,
                Ok(Err(e)) => {
                    warn!(source = %kind, error = %e, "source search failed");
                    Vec::new()
                }
                Err(_) => {
                    warn!(source = %kind, timeout = ?timeout, "source search timed out");
                    Vec::new()
                }
            };
            (index, candidates)
        });
    }

    match mode {
        FanoutMode::All => {
            let mut slots: Vec<Vec<MediaCandidate>> = vec![Vec::new(); adapters.len()];
            while let Some(joined) = set.join_next().await {
                if let Ok((index, candidates)) = joined {
                    slots[index] = candidates;
                }
            }
            slots.into_iter().flatten().collect()
        }
        FanoutMode::Fastest => {
            while let Some(joined) = set.join_next().await {
                if let Ok((index, candidates)) = joined
                    && !candidates.is_empty()
                {
                    debug!(winner = index, count = candidates.len(), "fastest fan-out won");
                    set.abort_all();
                    return candidates;
                }
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use danmu_sources::{CommentPayload, EpisodeInfo, MediaType, RawComment, SourceError, SourceKind};

    struct StubSource {
        kind: SourceKind,
        delay: Duration,
        titles: Vec<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl SourceAdapter for StubSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn handles_url(&self, _url: &str) -> bool {
            false
        }

        async fn search(
            &self,
            _keyword: &str,
            _hints: &SearchHints,
        ) -> Result<Vec<MediaCandidate>, SourceError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(SourceError::Other("boom".into()));
            }
            Ok(self
                .titles
                .iter()
                .map(|t| MediaCandidate {
                    source: self.kind,
                    media_id: t.to_string(),
                    title: t.to_string(),
                    media_type: MediaType::Series,
                    season: None,
                    year: None,
                    url: format!("https://example.invalid/{t}"),
                    episode_count: None,
                })
                .collect())
        }

        async fn episodes(&self, _media: &MediaCandidate) -> Result<Vec<EpisodeInfo>, SourceError> {
            Ok(Vec::new())
        }

        async fn comments(&self, _url: &str) -> Result<CommentPayload, SourceError> {
            Ok(CommentPayload::Full(Vec::new()))
        }

        async fn segment_comments(&self, _locator: &str) -> Result<Vec<RawComment>, SourceError> {
            Ok(Vec::new())
        }
    }

    fn adapters(specs: Vec<StubSource>) -> Vec<Arc<dyn SourceAdapter>> {
        specs
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn SourceAdapter>)
            .collect()
    }

    #[tokio::test]
    async fn test_all_mode_merges_in_configured_order() {
        let adapters = adapters(vec![
            StubSource {
                kind: SourceKind::Bilibili,
                delay: Duration::from_millis(30),
                titles: vec!["slow-first"],
                fail: false,
            },
            StubSource {
                kind: SourceKind::Tencent,
                delay: Duration::from_millis(1),
                titles: vec!["fast-second"],
                fail: false,
            },
        ]);

        let merged = search_sources(
            &adapters,
            "q",
            SearchHints::default(),
            FanoutMode::All,
            Duration::from_secs(1),
        )
        .await;

        let titles: Vec<_> = merged.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["slow-first", "fast-second"]);
    }

    #[tokio::test]
    async fn test_fastest_mode_skips_empty_and_failing() {
        let adapters = adapters(vec![
            StubSource {
                kind: SourceKind::Bilibili,
                delay: Duration::from_millis(1),
                titles: vec![],
                fail: false,
            },
            StubSource {
                kind: SourceKind::Tencent,
                delay: Duration::from_millis(2),
                titles: vec![],
                fail: true,
            },
            StubSource {
                kind: SourceKind::Mgtv,
                delay: Duration::from_millis(10),
                titles: vec!["winner"],
                fail: false,
            },
        ]);

        let merged = search_sources(
            &adapters,
            "q",
            SearchHints::default(),
            FanoutMode::Fastest,
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "winner");
    }

    #[tokio::test]
    async fn test_timeout_is_adapter_failure_not_request_failure() {
        let adapters = adapters(vec![
            StubSource {
                kind: SourceKind::Bilibili,
                delay: Duration::from_secs(5),
                titles: vec!["never-arrives"],
                fail: false,
            },
            StubSource {
                kind: SourceKind::Tencent,
                delay: Duration::from_millis(1),
                titles: vec!["on-time"],
                fail: false,
            },
        ]);

        let merged = search_sources(
            &adapters,
            "q",
            SearchHints::default(),
            FanoutMode::All,
            Duration::from_millis(50),
        )
        .await;

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "on-time");
    }
}
