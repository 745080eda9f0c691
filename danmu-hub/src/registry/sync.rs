//! Cross-instance continuity: read-repair and write-minimization.
//!
//! Independent stateless instances converge through the durable mirror.
//! Writes are minimized by comparing a sha256 content hash per aggregate
//! against the last hash this instance saw; reads install only aggregates
//! whose hash differs from the local view. Concurrent writers race and
//! last-writer-wins on the mirror, by design of the consistency model.

use std::collections::HashMap;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::registry::mirror::DurableMirror;
use crate::registry::state::{ALL_AGGREGATES, RegistryState};

pub fn content_hash(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct MirrorSync {
    mirror: Box<dyn DurableMirror>,
    /// Hash of each aggregate as last seen on the mirror (read or written).
    last_hashes: Mutex<HashMap<String, String>>,
}

impl MirrorSync {
    pub fn new(mirror: Box<dyn DurableMirror>) -> Self {
        Self {
            mirror,
            last_hashes: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.mirror.name()
    }

    /// Mirror every aggregate whose content changed since the last sync.
    pub async fn flush(&self, registry: &RegistryState) -> Result<()> {
        if !self.mirror.is_valid().await {
            return Err(Error::MirrorUnavailable(self.mirror.name().to_string()));
        }

        for name in ALL_AGGREGATES {
            let payload = registry.snapshot_aggregate(name)?;
            let hash = content_hash(&payload);

            let unchanged = self
                .last_hashes
                .lock()
                .get(*name)
                .is_some_and(|last| *last == hash);
            if unchanged {
                continue;
            }

            self.mirror.write_aggregate(name, &payload, &hash).await?;
            self.last_hashes.lock().insert((*name).to_string(), hash);
        }
        Ok(())
    }

    /// Refresh in-memory state from the mirror (read-repair).
    ///
    /// Aggregates whose mirrored hash matches the last seen one are skipped.
    /// A corrupt payload is treated as a miss: local state stays, and the
    /// stale record is overwritten by the next flush.
    pub async fn restore(&self, registry: &RegistryState) -> Result<()> {
        if !self.mirror.is_valid().await {
            return Err(Error::MirrorUnavailable(self.mirror.name().to_string()));
        }

        for name in ALL_AGGREGATES {
            let record = match self.mirror.read_aggregate(name).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(Error::CacheCorrupt(_)) => {
                    warn!(aggregate = name, "corrupt mirror payload treated as miss");
                    self.last_hashes.lock().remove(*name);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let unchanged = self
                .last_hashes
                .lock()
                .get(*name)
                .is_some_and(|last| *last == record.hash);
            if unchanged {
                continue;
            }

            match registry.restore_aggregate(name, &record.data) {
                Ok(()) => {
                    debug!(aggregate = name, "refreshed from mirror");
                    self.last_hashes
                        .lock()
                        .insert((*name).to_string(), record.hash);
                }
                Err(Error::CacheCorrupt(_)) => {
                    warn!(aggregate = name, "corrupt mirror payload treated as miss");
                    self.last_hashes.lock().remove(*name);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Drop every mirrored aggregate and forget the hash history.
    pub async fn clear(&self) -> Result<()> {
        self.mirror.clear(ALL_AGGREGATES).await?;
        self.last_hashes.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::mirror::FsMirror;
    use danmu_sources::{MediaCandidate, MediaType, SourceKind};

    fn candidate(media_id: &str) -> MediaCandidate {
        MediaCandidate {
            source: SourceKind::Bilibili,
            media_id: media_id.to_string(),
            title: format!("title-{media_id}"),
            media_type: MediaType::Series,
            season: None,
            year: None,
            url: format!("https://example.invalid/{media_id}"),
            episode_count: None,
        }
    }

    #[tokio::test]
    async fn test_flush_then_restore_converges() {
        let dir = tempfile::tempdir().unwrap();

        let writer = RegistryState::new(10, 10);
        let id = writer.register_anime(&candidate("1"));
        writer.remember_selection("keyword", id);

        let sync_a = MirrorSync::new(Box::new(FsMirror::new(dir.path(), "t")));
        sync_a.flush(&writer).await.unwrap();

        let reader = RegistryState::new(10, 10);
        let sync_b = MirrorSync::new(Box::new(FsMirror::new(dir.path(), "t")));
        sync_b.restore(&reader).await.unwrap();

        assert_eq!(reader.anime_count(), 1);
        assert_eq!(reader.selection_for("keyword"), Some(id));
    }

    #[tokio::test]
    async fn test_flush_skips_unchanged_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryState::new(10, 10);
        registry.register_anime(&candidate("1"));

        let sync = MirrorSync::new(Box::new(FsMirror::new(dir.path(), "t")));
        sync.flush(&registry).await.unwrap();

        // Tamper with the mirrored animes file; an unchanged flush must not
        // rewrite it.
        let path = dir.path().join("t.animes.json");
        tokio::fs::write(&path, b"tampered").await.unwrap();
        sync.flush(&registry).await.unwrap();
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw, "tampered");

        // After a mutation the aggregate is written again.
        registry.register_anime(&candidate("2"));
        sync.flush(&registry).await.unwrap();
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_ne!(raw, "tampered");
    }

    #[tokio::test]
    async fn test_restore_corrupt_keeps_local_state() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryState::new(10, 10);
        registry.register_anime(&candidate("1"));

        tokio::fs::write(dir.path().join("t.animes.json"), b"{broken")
            .await
            .unwrap();

        let sync = MirrorSync::new(Box::new(FsMirror::new(dir.path(), "t")));
        sync.restore(&registry).await.unwrap();
        assert_eq!(registry.anime_count(), 1);
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("abc").len(), 64);
    }
}
