//! The aggregation engine facade.
//!
//! One `DanmuEngine` instance owns every piece of mutable state: the source
//! registry, the bounded anime/episode registries, the TTL caches, the
//! admission controller, the normalization pipeline and the optional durable
//! mirror. Request handlers hold it behind an `Arc` and call through.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use danmu_sources::{
    CommentPayload, MediaCandidate, MediaType, RawComment, SearchHints, SourceRegistry,
};

use crate::admission::AdmissionController;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::matcher::{
    EpisodeNoiseFilter, ParsedQuery, normalize_keyword, parse_query, rank_candidates,
    search_sources,
};
use crate::model::{
    AnimeEntry, CanonicalComment, CommentsOutcome, EpisodeEntry, MatchCandidate, Segment,
};
use crate::pipeline::Pipeline;
use crate::registry::{DurableMirror, MirrorSync, RegistryState, TtlCache};
use crate::segment;

/// Best automatic match for a filename-style query.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub candidate: MatchCandidate,
    pub episode: Option<EpisodeEntry>,
    pub alternatives: Vec<MatchCandidate>,
}

pub struct DanmuEngine {
    config: AppConfig,
    sources: SourceRegistry,
    registry: RegistryState,
    search_cache: TtlCache<Vec<MatchCandidate>>,
    comment_cache: TtlCache<Vec<CanonicalComment>>,
    mirror: Option<MirrorSync>,
    admission: AdmissionController,
    pipeline: Pipeline,
    noise: EpisodeNoiseFilter,
}

impl DanmuEngine {
    pub fn new(
        config: AppConfig,
        sources: SourceRegistry,
        mirror: Option<Box<dyn DurableMirror>>,
    ) -> Arc<Self> {
        let admission = AdmissionController::new(&config.admission);
        let pipeline = Pipeline::from_config(&config.normalize);
        let noise = EpisodeNoiseFilter::from_config(&config.matching);
        let registry = RegistryState::new(config.cache.max_animes, config.cache.max_selections);
        let search_cache = TtlCache::new(Duration::from_secs(config.cache.search_ttl_minutes * 60));
        let comment_cache =
            TtlCache::new(Duration::from_secs(config.cache.comment_ttl_minutes * 60));

        Arc::new(Self {
            config,
            sources,
            registry,
            search_cache,
            comment_cache,
            mirror: mirror.map(MirrorSync::new),
            admission,
            pipeline,
            noise,
        })
    }

    /// Build the engine from configuration alone: shared HTTP client,
    /// configured adapter set, configured mirror backend.
    pub fn from_config(config: AppConfig) -> Result<Arc<Self>> {
        let client = reqwest::Client::builder()
            .timeout(config.sources.timeout() + Duration::from_secs(2))
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::config(format!("http client: {e}")))?;

        let sources = SourceRegistry::from_kinds(&config.sources.enabled, client.clone());
        if sources.is_empty() {
            return Err(Error::config("no sources enabled"));
        }
        info!(sources = sources.len(), "source adapters registered");

        let mirror = crate::registry::mirror::from_config(&config.mirror, client);
        if let Some(mirror) = &mirror {
            info!(backend = mirror.name(), "durable mirror configured");
        }

        Ok(Self::new(config, sources, mirror))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ---- matching ------------------------------------------------------

    /// Search by free text or direct URL. An empty result is a successful
    /// "no match", never an error.
    pub async fn search_title(&self, query: &str) -> Result<Vec<MatchCandidate>> {
        match parse_query(query)? {
            ParsedQuery::Url(url) => self.register_direct_url(&url).map(|c| vec![c]),
            parsed => self.search_by_title(&parsed).await,
        }
    }

    /// A pasted platform URL bypasses search entirely: the owning adapter is
    /// resolved and a single-episode program is registered for it.
    fn register_direct_url(&self, url: &str) -> Result<MatchCandidate> {
        let adapter = self
            .sources
            .route_url(url)
            .ok_or_else(|| Error::AmbiguousInput(format!("no configured source handles {url}")))?;

        let candidate = MediaCandidate {
            source: adapter.kind(),
            media_id: url.to_string(),
            title: url.to_string(),
            media_type: MediaType::Other,
            season: None,
            year: None,
            url: url.to_string(),
            episode_count: Some(1),
        };
        let anime_id = self.registry.register_anime(&candidate);
        self.registry.set_episodes(
            anime_id,
            &[danmu_sources::EpisodeInfo {
                number: 1,
                title: "直达链接".to_string(),
                url: url.to_string(),
            }],
        )?;

        Ok(MatchCandidate {
            anime_id,
            title: candidate.title,
            media_type: MediaType::Other,
            source: candidate.source,
            season: None,
            year: None,
            episode_count: Some(1),
        })
    }

    async fn search_by_title(&self, parsed: &ParsedQuery) -> Result<Vec<MatchCandidate>> {
        let title = parsed
            .title()
            .ok_or_else(|| Error::AmbiguousInput("query has no title".to_string()))?;
        let keyword = normalize_keyword(title);

        let mut candidates = match self.search_cache.get(&keyword) {
            Some(cached) => cached,
            None => {
                let hints = SearchHints {
                    season: parsed.season(),
                    episode: parsed.episode(),
                };
                let found = search_sources(
                    self.sources.all(),
                    title,
                    hints,
                    self.config.sources.fanout_mode,
                    self.config.sources.timeout(),
                )
                .await;

                let registered: Vec<MatchCandidate> = found
                    .iter()
                    .map(|media| {
                        let anime_id = self.registry.register_anime(media);
                        MatchCandidate {
                            anime_id,
                            title: media.title.clone(),
                            media_type: media.media_type,
                            source: media.source,
                            season: media.season,
                            year: media.year,
                            episode_count: media.episode_count,
                        }
                    })
                    .collect();

                self.search_cache.insert(keyword.clone(), registered.clone());
                self.flush_mirror().await;
                registered
            }
        };

        let remembered = self.registry.selection_for(&keyword);
        rank_candidates(&mut candidates, parsed, remembered);
        Ok(candidates)
    }

    /// Automatic match: best candidate plus its episode for the parsed
    /// episode number. Noise episodes are skipped here and only here.
    pub async fn match_query(&self, file_name: &str) -> Result<Option<MatchOutcome>> {
        let parsed = parse_query(file_name)?;
        let candidates = match &parsed {
            ParsedQuery::Url(url) => vec![self.register_direct_url(url)?],
            _ => self.search_by_title(&parsed).await?,
        };
        let Some(candidate) = candidates.first().cloned() else {
            return Ok(None);
        };

        let episodes = self.resolve_episodes(candidate.anime_id).await?;
        let mut usable = episodes
            .iter()
            .filter(|ep| !self.noise.is_noise(&ep.episode_title));

        let episode = match parsed.episode() {
            Some(number) => usable.find(|ep| ep.episode_number == number).cloned(),
            None => usable.next().cloned(),
        };

        Ok(Some(MatchOutcome {
            candidate,
            episode,
            alternatives: candidates.into_iter().skip(1).collect(),
        }))
    }

    /// Resolve (and register) the episode list of an anime. Used both for
    /// automatic matching and manual browsing; no noise filtering here.
    pub async fn resolve_episodes(&self, anime_id: i64) -> Result<Vec<EpisodeEntry>> {
        let anime = self
            .registry
            .anime(anime_id)
            .ok_or_else(|| Error::not_found("anime", anime_id.to_string()))?;
        if !anime.episodes.is_empty() {
            return Ok(anime.episodes);
        }

        let Some(adapter) = self.sources.by_kind(anime.source) else {
            warn!(source = %anime.source, "source no longer configured");
            return Ok(Vec::new());
        };

        let candidate = candidate_from_entry(&anime);
        let infos = match tokio::time::timeout(
            self.config.sources.timeout(),
            adapter.episodes(&candidate),
        )
        .await
        {
            Ok(Ok(infos)) => infos,
            Ok(Err(e)) => {
                warn!(source = %anime.source, error = %e, "episode resolution failed");
                return Ok(Vec::new());
            }
            Err(_) => {
                warn!(source = %anime.source, "episode resolution timed out");
                return Ok(Vec::new());
            }
        };

        let episodes = self.registry.set_episodes(anime_id, &infos)?;
        self.flush_mirror().await;
        Ok(episodes)
    }

    pub fn anime(&self, anime_id: i64) -> Option<AnimeEntry> {
        self.registry.anime(anime_id)
    }

    /// Record a manual disambiguation. Later automatic searches for the same
    /// normalized keyword will rank this anime first.
    pub async fn remember_selection(&self, keyword: &str, anime_id: i64) -> Result<()> {
        if self.registry.anime(anime_id).is_none() {
            return Err(Error::not_found("anime", anime_id.to_string()));
        }
        self.registry
            .remember_selection(&normalize_keyword(keyword), anime_id);
        self.flush_mirror().await;
        Ok(())
    }

    // ---- comments ------------------------------------------------------

    /// Fetch the comment track behind an episode id or a direct URL.
    ///
    /// Cache hits bypass admission entirely. On a miss the client passes the
    /// admission gate before any upstream call is made.
    pub async fn fetch_comments(
        &self,
        client_id: &str,
        reference: &str,
        want_segments: bool,
        with_related: bool,
    ) -> Result<CommentsOutcome> {
        let (url, episode_id) = self.resolve_reference(reference)?;

        if let Some(cached) = self.comment_cache.get(&url) {
            let comments = if with_related {
                self.merge_related_cached(episode_id, &url, cached)
            } else {
                cached
            };
            if want_segments {
                let source = self.sources.route_url(&url).map(|a| a.kind());
                let Some(source) = source else {
                    return Ok(CommentsOutcome::Full(comments));
                };
                return Ok(CommentsOutcome::Segmented(segment::whole_track_index(
                    source, &url, &comments,
                )));
            }
            return Ok(CommentsOutcome::Full(comments));
        }

        if !self.admission.admit(client_id) {
            return Err(Error::RateLimited(client_id.to_string()));
        }

        let Some(adapter) = self.sources.route_url(&url) else {
            return Err(Error::Validation(format!("no configured source handles {url}")));
        };

        let payload = match tokio::time::timeout(
            self.config.sources.timeout(),
            adapter.comments(&url),
        )
        .await
        {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                // Non-fatal: the source contributed nothing. Not cached, so a
                // later request retries upstream.
                warn!(source = %adapter.kind(), error = %e, "comment fetch failed");
                return Ok(CommentsOutcome::Full(Vec::new()));
            }
            Err(_) => {
                warn!(source = %adapter.kind(), "comment fetch timed out");
                return Ok(CommentsOutcome::Full(Vec::new()));
            }
        };

        if want_segments {
            return Ok(CommentsOutcome::Segmented(segment::build_index(
                adapter.kind(),
                &url,
                &payload,
            )));
        }

        let comments = match payload {
            CommentPayload::Full(raw) => self.pipeline.normalize(raw),
            CommentPayload::Segmented(slices) => {
                // Bulk mode: materialize the whole stream before capping; the
                // volume cap bounds output, not upstream cost.
                let raw = self.fetch_all_slices(&adapter, slices).await;
                self.pipeline.normalize(raw)
            }
        };

        self.comment_cache.insert(url.clone(), comments.clone());
        debug!(url = %url, count = comments.len(), "comment track cached");

        let comments = if with_related {
            self.merge_related_cached(episode_id, &url, comments)
        } else {
            comments
        };
        Ok(CommentsOutcome::Full(comments))
    }

    /// Fetch and normalize one segment slice (progressive playback).
    pub async fn fetch_segment(
        &self,
        client_id: &str,
        segment: &Segment,
    ) -> Result<Vec<CanonicalComment>> {
        let key = format!("segment:{}:{}", segment.source, segment.locator);
        if let Some(cached) = self.comment_cache.get(&key) {
            return Ok(cached);
        }
        // Whole-track slices handed out for an already-materialized stream
        // carry the playback URL as locator; serve those from the track cache.
        if let Some(cached) = self.comment_cache.get(&segment.locator) {
            return Ok(cached);
        }

        if !self.admission.admit(client_id) {
            return Err(Error::RateLimited(client_id.to_string()));
        }

        let adapter = self
            .sources
            .by_kind(segment.source)
            .ok_or_else(|| Error::Validation(format!("source {} not configured", segment.source)))?;

        let raw = match tokio::time::timeout(
            self.config.sources.timeout(),
            adapter.segment_comments(&segment.locator),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(source = %segment.source, error = %e, "segment fetch failed");
                return Ok(Vec::new());
            }
            Err(_) => {
                warn!(source = %segment.source, "segment fetch timed out");
                return Ok(Vec::new());
            }
        };

        let comments = self.pipeline.normalize(raw);
        self.comment_cache.insert(key, comments.clone());
        Ok(comments)
    }

    fn resolve_reference(&self, reference: &str) -> Result<(String, Option<i64>)> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok((reference.to_string(), None));
        }
        let episode_id: i64 = reference
            .parse()
            .map_err(|_| Error::validation(format!("bad episode reference: {reference}")))?;
        let entry = self
            .registry
            .episode(episode_id)
            .ok_or_else(|| Error::not_found("episode", reference.to_string()))?;
        Ok((entry.origin_url, Some(episode_id)))
    }

    async fn fetch_all_slices(
        &self,
        adapter: &Arc<dyn danmu_sources::SourceAdapter>,
        slices: Vec<danmu_sources::SegmentSlice>,
    ) -> Vec<RawComment> {
        let timeout = self.config.sources.timeout();
        let mut set = JoinSet::new();
        for slice in slices {
            let adapter = Arc::clone(adapter);
            set.spawn(async move {
                match tokio::time::timeout(timeout, adapter.segment_comments(&slice.locator)).await
                {
                    Ok(Ok(raw)) => raw,
                    Ok(Err(e)) => {
                        warn!(locator = %slice.locator, error = %e, "slice fetch failed");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(locator = %slice.locator, "slice fetch timed out");
                        Vec::new()
                    }
                }
            });
        }

        let mut all = Vec::new();
        while let Some(joined) = set.join_next().await {
            if let Ok(mut raw) = joined {
                all.append(&mut raw);
            }
        }
        all
    }

    /// Merge the cached tracks of alias URLs: episodes with the same number
    /// under same-titled programs from other sources. Cache-only, so related
    /// merging never costs an upstream call.
    fn merge_related_cached(
        &self,
        episode_id: Option<i64>,
        primary_url: &str,
        mut comments: Vec<CanonicalComment>,
    ) -> Vec<CanonicalComment> {
        let Some(episode_id) = episode_id else {
            return comments;
        };
        let mut merged_any = false;
        for alias in self.registry.alias_urls(episode_id) {
            if alias == primary_url {
                continue;
            }
            if let Some(mut cached) = self.comment_cache.get(&alias) {
                comments.append(&mut cached);
                merged_any = true;
            }
        }
        if merged_any {
            comments.sort_by_key(|c| c.time_ms);
            comments = self.pipeline.run(comments);
        }
        comments
    }

    // ---- admission, caches, mirror ------------------------------------

    /// The raw admission gate, for callers that manage their own fetch path.
    pub fn admit_request(&self, client_id: &str) -> bool {
        self.admission.admit(client_id)
    }

    pub fn admission_remaining(&self, client_id: &str) -> u32 {
        self.admission.remaining(client_id)
    }

    /// Drop every in-memory cache and registry. Mirrored state is untouched;
    /// use [`Self::clear_durable_mirrors`] for that.
    pub fn clear_caches(&self) {
        self.search_cache.invalidate_all();
        self.comment_cache.invalidate_all();
        self.registry.clear();
        info!("in-memory caches and registries cleared");
    }

    pub async fn clear_durable_mirrors(&self) -> Result<()> {
        if let Some(mirror) = &self.mirror {
            mirror.clear().await?;
            info!(backend = mirror.backend_name(), "durable mirror cleared");
        }
        Ok(())
    }

    /// Read-repair hook: refresh in-memory registries from the mirror.
    /// An unreachable mirror degrades to process-local state.
    pub async fn sync_from_mirror(&self) {
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.restore(&self.registry).await {
                warn!(error = %e, "mirror read-repair skipped");
            }
        }
    }

    async fn flush_mirror(&self) {
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.flush(&self.registry).await {
                warn!(error = %e, "mirror flush skipped");
            }
        }
    }
}

fn candidate_from_entry(anime: &AnimeEntry) -> MediaCandidate {
    MediaCandidate {
        source: anime.source,
        media_id: anime.media_id.clone(),
        title: anime.title.clone(),
        media_type: anime.media_type,
        season: anime.season,
        year: anime.year,
        url: anime.url.clone(),
        episode_count: anime.episode_count,
    }
}
