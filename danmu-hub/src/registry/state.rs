//! The authoritative in-process registry.
//!
//! One `RegistryState` instance owns the anime list, the episode-id index
//! and the selection memory. Every mutation happens under a single write
//! lock, so each logical operation is atomic within the process. Durable
//! mirroring works on JSON snapshots of named aggregates (see
//! [`super::sync`]).

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use danmu_sources::{EpisodeInfo, MediaCandidate};

use crate::error::{Error, Result};
use crate::model::{AnimeEntry, EpisodeEntry, EpisodeIndexEntry, MatchCandidate};

/// Names of the mirrored aggregates.
pub const AGGREGATE_ANIMES: &str = "animes";
pub const AGGREGATE_EPISODE_INDEX: &str = "episode_index";
pub const AGGREGATE_COUNTERS: &str = "counters";
pub const AGGREGATE_SELECTIONS: &str = "selections";

pub const ALL_AGGREGATES: &[&str] = &[
    AGGREGATE_ANIMES,
    AGGREGATE_EPISODE_INDEX,
    AGGREGATE_COUNTERS,
    AGGREGATE_SELECTIONS,
];

#[derive(Debug, Default, Serialize, Deserialize)]
struct Counters {
    next_anime_id: i64,
    next_episode_id: i64,
}

/// Remembered manual selections, bounded, evicted in insertion order.
#[derive(Debug, Default)]
struct SelectionMemory {
    entries: VecDeque<(String, i64)>,
    capacity: usize,
}

impl SelectionMemory {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, keyword: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, id)| *id)
    }

    /// Updating an existing keyword keeps its position in the eviction order.
    fn remember(&mut self, keyword: String, anime_id: i64) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == keyword) {
            slot.1 = anime_id;
            return;
        }
        if self.capacity > 0 && self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((keyword, anime_id));
    }
}

struct RegistryInner {
    /// Front is oldest; capacity eviction pops from the front.
    animes: VecDeque<AnimeEntry>,
    episode_index: HashMap<i64, EpisodeIndexEntry>,
    counters: Counters,
    selections: SelectionMemory,
}

pub struct RegistryState {
    inner: RwLock<RegistryInner>,
    max_animes: usize,
}

impl RegistryState {
    pub fn new(max_animes: usize, max_selections: usize) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                animes: VecDeque::new(),
                episode_index: HashMap::new(),
                counters: Counters {
                    next_anime_id: 1,
                    next_episode_id: 1,
                },
                selections: SelectionMemory::new(max_selections),
            }),
            max_animes,
        }
    }

    /// Register a search candidate, returning its stable anime id.
    ///
    /// A candidate already registered for the same platform program keeps its
    /// id. Over-capacity insert evicts the single oldest entry together with
    /// its episode-index records, atomically.
    pub fn register_anime(&self, candidate: &MediaCandidate) -> i64 {
        let mut inner = self.inner.write();

        if let Some(existing) = inner
            .animes
            .iter()
            .find(|a| a.source == candidate.source && a.media_id == candidate.media_id)
        {
            return existing.anime_id;
        }

        let anime_id = inner.counters.next_anime_id;
        inner.counters.next_anime_id += 1;

        inner.animes.push_back(AnimeEntry {
            anime_id,
            title: candidate.title.clone(),
            media_type: candidate.media_type,
            source: candidate.source,
            media_id: candidate.media_id.clone(),
            url: candidate.url.clone(),
            season: candidate.season,
            year: candidate.year,
            episode_count: candidate.episode_count,
            episodes: Vec::new(),
            created_at: Utc::now(),
        });

        if self.max_animes > 0 && inner.animes.len() > self.max_animes {
            if let Some(evicted) = inner.animes.pop_front() {
                inner
                    .episode_index
                    .retain(|_, entry| entry.anime_id != evicted.anime_id);
                debug!(anime_id = evicted.anime_id, title = %evicted.title, "evicted oldest anime");
            }
        }

        anime_id
    }

    /// Replace an anime's episode list, minting fresh episode ids and
    /// updating the reverse index in the same operation.
    pub fn set_episodes(&self, anime_id: i64, infos: &[EpisodeInfo]) -> Result<Vec<EpisodeEntry>> {
        let mut inner = self.inner.write();

        let position = inner
            .animes
            .iter()
            .position(|a| a.anime_id == anime_id)
            .ok_or_else(|| Error::not_found("anime", anime_id.to_string()))?;
        let source = inner.animes[position].source;

        inner
            .episode_index
            .retain(|_, entry| entry.anime_id != anime_id);

        let mut episodes = Vec::with_capacity(infos.len());
        for info in infos {
            let episode_id = inner.counters.next_episode_id;
            inner.counters.next_episode_id += 1;

            inner.episode_index.insert(
                episode_id,
                EpisodeIndexEntry {
                    origin_url: info.url.clone(),
                    anime_id,
                    source,
                },
            );
            episodes.push(EpisodeEntry {
                episode_id,
                anime_id,
                episode_number: info.number,
                episode_title: info.title.clone(),
                origin_url: info.url.clone(),
                source,
            });
        }

        inner.animes[position].episodes = episodes.clone();
        Ok(episodes)
    }

    pub fn anime(&self, anime_id: i64) -> Option<AnimeEntry> {
        self.inner
            .read()
            .animes
            .iter()
            .find(|a| a.anime_id == anime_id)
            .cloned()
    }

    pub fn episode(&self, episode_id: i64) -> Option<EpisodeIndexEntry> {
        self.inner.read().episode_index.get(&episode_id).cloned()
    }

    pub fn anime_count(&self) -> usize {
        self.inner.read().animes.len()
    }

    pub fn episode_index_len(&self) -> usize {
        self.inner.read().episode_index.len()
    }

    /// All origin URLs indexed for the anime owning `episode_id`. The first
    /// element is the episode's own URL.
    pub fn alias_urls(&self, episode_id: i64) -> Vec<String> {
        let inner = self.inner.read();
        let Some(entry) = inner.episode_index.get(&episode_id) else {
            return Vec::new();
        };
        let mut urls = vec![entry.origin_url.clone()];
        for other in inner.episode_index.values() {
            if other.anime_id == entry.anime_id && other.origin_url != entry.origin_url {
                urls.push(other.origin_url.clone());
            }
        }
        urls
    }

    pub fn selection_for(&self, keyword: &str) -> Option<i64> {
        self.inner.read().selections.get(keyword)
    }

    pub fn remember_selection(&self, keyword: &str, anime_id: i64) {
        self.inner
            .write()
            .selections
            .remember(keyword.to_string(), anime_id);
    }

    /// Lightweight candidate views of every registered anime, newest last.
    pub fn candidates(&self) -> Vec<MatchCandidate> {
        self.inner
            .read()
            .animes
            .iter()
            .map(|a| MatchCandidate {
                anime_id: a.anime_id,
                title: a.title.clone(),
                media_type: a.media_type,
                source: a.source,
                season: a.season,
                year: a.year,
                episode_count: a.episode_count,
            })
            .collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.animes.clear();
        inner.episode_index.clear();
        inner.selections.entries.clear();
        // Counters keep running: episode ids stay unique for the process
        // lifetime even across clears.
    }

    /// Serialize one named aggregate for mirroring.
    pub fn snapshot_aggregate(&self, name: &str) -> Result<String> {
        let inner = self.inner.read();
        let value = match name {
            AGGREGATE_ANIMES => serde_json::to_string(&inner.animes)?,
            AGGREGATE_EPISODE_INDEX => serde_json::to_string(&inner.episode_index)?,
            AGGREGATE_COUNTERS => serde_json::to_string(&inner.counters)?,
            AGGREGATE_SELECTIONS => serde_json::to_string(&inner.selections.entries)?,
            other => return Err(Error::validation(format!("unknown aggregate {other}"))),
        };
        Ok(value)
    }

    /// Install one named aggregate from a mirrored snapshot.
    ///
    /// A payload that fails to parse is reported as [`Error::CacheCorrupt`];
    /// the caller treats it as a miss and local state stays untouched.
    pub fn restore_aggregate(&self, name: &str, payload: &str) -> Result<()> {
        let mut inner = self.inner.write();
        match name {
            AGGREGATE_ANIMES => {
                inner.animes = serde_json::from_str(payload)
                    .map_err(|_| Error::CacheCorrupt(name.to_string()))?;
            }
            AGGREGATE_EPISODE_INDEX => {
                inner.episode_index = serde_json::from_str(payload)
                    .map_err(|_| Error::CacheCorrupt(name.to_string()))?;
            }
            AGGREGATE_COUNTERS => {
                let mirrored: Counters = serde_json::from_str(payload)
                    .map_err(|_| Error::CacheCorrupt(name.to_string()))?;
                // Ids must never move backwards, whichever side is ahead.
                inner.counters.next_anime_id =
                    inner.counters.next_anime_id.max(mirrored.next_anime_id);
                inner.counters.next_episode_id =
                    inner.counters.next_episode_id.max(mirrored.next_episode_id);
            }
            AGGREGATE_SELECTIONS => {
                inner.selections.entries = serde_json::from_str(payload)
                    .map_err(|_| Error::CacheCorrupt(name.to_string()))?;
            }
            other => return Err(Error::validation(format!("unknown aggregate {other}"))),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use danmu_sources::{MediaType, SourceKind};

    fn candidate(media_id: &str, title: &str) -> MediaCandidate {
        MediaCandidate {
            source: SourceKind::Bilibili,
            media_id: media_id.to_string(),
            title: title.to_string(),
            media_type: MediaType::Series,
            season: None,
            year: None,
            url: format!("https://www.bilibili.com/bangumi/play/ss{media_id}"),
            episode_count: None,
        }
    }

    fn episode(number: u32, url: &str) -> EpisodeInfo {
        EpisodeInfo {
            number,
            title: format!("第{number}话"),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_register_is_idempotent_per_program() {
        let registry = RegistryState::new(10, 10);
        let first = registry.register_anime(&candidate("1", "A"));
        let second = registry.register_anime(&candidate("1", "A"));
        assert_eq!(first, second);
        assert_eq!(registry.anime_count(), 1);
    }

    #[test]
    fn test_capacity_eviction_removes_episode_index_in_lockstep() {
        let registry = RegistryState::new(2, 10);

        let first = registry.register_anime(&candidate("1", "A"));
        let eps = registry
            .set_episodes(first, &[episode(1, "https://a/1"), episode(2, "https://a/2")])
            .unwrap();
        assert_eq!(registry.episode_index_len(), 2);

        registry.register_anime(&candidate("2", "B"));
        registry.register_anime(&candidate("3", "C"));

        assert_eq!(registry.anime_count(), 2);
        assert!(registry.anime(first).is_none());
        assert_eq!(registry.episode_index_len(), 0);
        assert!(registry.episode(eps[0].episode_id).is_none());
    }

    #[test]
    fn test_episode_ids_monotonic_across_replacement() {
        let registry = RegistryState::new(10, 10);
        let id = registry.register_anime(&candidate("1", "A"));

        let first = registry.set_episodes(id, &[episode(1, "https://a/1")]).unwrap();
        let second = registry.set_episodes(id, &[episode(1, "https://a/1")]).unwrap();
        assert!(second[0].episode_id > first[0].episode_id);
        // The stale index record is gone.
        assert!(registry.episode(first[0].episode_id).is_none());
        assert!(registry.episode(second[0].episode_id).is_some());
    }

    #[test]
    fn test_selection_memory_bounded_insertion_order() {
        let registry = RegistryState::new(10, 2);
        registry.remember_selection("a", 1);
        registry.remember_selection("b", 2);
        // Updating "a" keeps its slot.
        registry.remember_selection("a", 10);
        registry.remember_selection("c", 3);

        assert_eq!(registry.selection_for("a"), None); // evicted as oldest
        assert_eq!(registry.selection_for("b"), Some(2));
        assert_eq!(registry.selection_for("c"), Some(3));
    }

    #[test]
    fn test_aggregate_snapshot_round_trip() {
        let registry = RegistryState::new(10, 10);
        let id = registry.register_anime(&candidate("1", "A"));
        registry.set_episodes(id, &[episode(1, "https://a/1")]).unwrap();
        registry.remember_selection("a", id);

        let other = RegistryState::new(10, 10);
        for name in ALL_AGGREGATES {
            let payload = registry.snapshot_aggregate(name).unwrap();
            other.restore_aggregate(name, &payload).unwrap();
        }

        assert_eq!(other.anime_count(), 1);
        assert_eq!(other.episode_index_len(), 1);
        assert_eq!(other.selection_for("a"), Some(id));
        // Restored counters continue after the mirrored ones.
        let next = other.register_anime(&candidate("2", "B"));
        assert!(next > id);
    }

    #[test]
    fn test_restore_corrupt_payload_is_cache_corrupt() {
        let registry = RegistryState::new(10, 10);
        let err = registry
            .restore_aggregate(AGGREGATE_ANIMES, "{not json")
            .unwrap_err();
        assert!(matches!(err, Error::CacheCorrupt(_)));
    }
}
