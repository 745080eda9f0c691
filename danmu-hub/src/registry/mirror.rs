//! Durable mirror port and its backend strategies.
//!
//! The engine only ever talks to [`DurableMirror`]; filesystem, remote
//! key-value cache and "no mirror" are interchangeable. Mirrors store an
//! envelope of `{hash, data}` per aggregate so a reader can skip unchanged
//! payloads without re-hashing.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::MirrorConfig;
use crate::error::{Error, Result};

/// One mirrored aggregate as stored by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub hash: String,
    pub data: String,
}

#[async_trait]
pub trait DurableMirror: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the backend is reachable right now. An invalid mirror makes
    /// the engine degrade to process-local state, never fail a request.
    async fn is_valid(&self) -> bool;

    async fn read_aggregate(&self, name: &str) -> Result<Option<AggregateRecord>>;

    async fn write_aggregate(&self, name: &str, payload: &str, hash: &str) -> Result<()>;

    async fn clear(&self, aggregate_names: &[&str]) -> Result<()>;
}

/// Build the configured backend, if any.
pub fn from_config(config: &MirrorConfig, client: reqwest::Client) -> Option<Box<dyn DurableMirror>> {
    match config.backend {
        crate::config::MirrorBackend::None => None,
        crate::config::MirrorBackend::Fs => Some(Box::new(FsMirror::new(
            config.fs_path.clone(),
            config.namespace.clone(),
        ))),
        crate::config::MirrorBackend::Remote => {
            let Some(url) = config.remote_url.clone() else {
                warn!("remote mirror selected but DANMU_MIRROR_URL is unset; running without mirror");
                return None;
            };
            Some(Box::new(HttpKvMirror::new(
                url,
                config.remote_token.clone(),
                config.namespace.clone(),
                client,
            )))
        }
    }
}

/// Filesystem mirror: one JSON envelope file per aggregate.
pub struct FsMirror {
    dir: PathBuf,
    namespace: String,
}

impl FsMirror {
    pub fn new(dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            namespace: namespace.into(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{name}.json", self.namespace))
    }
}

#[async_trait]
impl DurableMirror for FsMirror {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn is_valid(&self) -> bool {
        if self.dir.is_dir() {
            return true;
        }
        match tokio::fs::create_dir_all(&self.dir).await {
            Ok(()) => true,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "mirror directory unusable");
                false
            }
        }
    }

    async fn read_aggregate(&self, name: &str) -> Result<Option<AggregateRecord>> {
        let path = self.path_for(name);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::MirrorUnavailable(e.to_string())),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|_| Error::CacheCorrupt(name.to_string()))
    }

    async fn write_aggregate(&self, name: &str, payload: &str, hash: &str) -> Result<()> {
        let record = AggregateRecord {
            hash: hash.to_string(),
            data: payload.to_string(),
        };
        let path = self.path_for(name);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec(&record)?;
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| Error::MirrorUnavailable(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::MirrorUnavailable(e.to_string()))?;
        debug!(aggregate = name, path = %path.display(), "mirrored aggregate");
        Ok(())
    }

    async fn clear(&self, aggregate_names: &[&str]) -> Result<()> {
        for name in aggregate_names {
            match tokio::fs::remove_file(self.path_for(name)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::MirrorUnavailable(e.to_string())),
            }
        }
        Ok(())
    }
}

/// Remote key-value mirror speaking the Upstash-style single-command REST
/// protocol: `POST <base>` with a JSON command array, `{"result": ...}` back.
pub struct HttpKvMirror {
    base_url: String,
    token: Option<String>,
    namespace: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct KvResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpKvMirror {
    pub fn new(
        base_url: String,
        token: Option<String>,
        namespace: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            namespace,
            client,
        }
    }

    fn key_for(&self, name: &str) -> String {
        format!("{}:{name}", self.namespace)
    }

    async fn command(&self, command: serde_json::Value) -> Result<Option<serde_json::Value>> {
        let mut request = self.client.post(&self.base_url).json(&command);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response: KvResponse = request
            .send()
            .await
            .map_err(|e| Error::MirrorUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::MirrorUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::MirrorUnavailable(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(Error::MirrorUnavailable(error));
        }
        Ok(response.result)
    }
}

#[async_trait]
impl DurableMirror for HttpKvMirror {
    fn name(&self) -> &'static str {
        "remote-kv"
    }

    async fn is_valid(&self) -> bool {
        match self.command(json!(["PING"])).await {
            Ok(Some(result)) => result == "PONG",
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "remote mirror unreachable");
                false
            }
        }
    }

    async fn read_aggregate(&self, name: &str) -> Result<Option<AggregateRecord>> {
        let result = self.command(json!(["GET", self.key_for(name)])).await?;
        let Some(serde_json::Value::String(raw)) = result else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|_| Error::CacheCorrupt(name.to_string()))
    }

    async fn write_aggregate(&self, name: &str, payload: &str, hash: &str) -> Result<()> {
        let record = AggregateRecord {
            hash: hash.to_string(),
            data: payload.to_string(),
        };
        let envelope = serde_json::to_string(&record)?;
        self.command(json!(["SET", self.key_for(name), envelope]))
            .await?;
        debug!(aggregate = name, "mirrored aggregate to remote kv");
        Ok(())
    }

    async fn clear(&self, aggregate_names: &[&str]) -> Result<()> {
        for name in aggregate_names {
            self.command(json!(["DEL", self.key_for(name)])).await?;
        }
        Ok(())
    }
}
