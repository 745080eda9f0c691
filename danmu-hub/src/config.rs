//! Engine and server configuration.
//!
//! Everything is env-driven with sensible defaults, so the gateway runs as a
//! stateless process configured entirely through its environment
//! (`DANMU_*` variables, loaded after an optional `.env` file).

use std::time::Duration;

use danmu_sources::SourceKind;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How search fan-out joins its adapter tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanoutMode {
    /// First non-empty, non-erroring adapter wins; siblings are abandoned.
    Fastest,
    /// Every adapter is awaited and results are merged in configured order.
    All,
}

/// Color policy of the style normalization stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorPolicy {
    AsAuthored,
    ForceWhite,
    Randomize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9321,
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Adapters to query, in priority order.
    pub enabled: Vec<SourceKind>,
    pub fanout_mode: FanoutMode,
    /// Per-adapter timeout; a slow adapter is a failed adapter.
    pub timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: vec![
                SourceKind::Bilibili,
                SourceKind::Tencent,
                SourceKind::Iqiyi,
                SourceKind::Mgtv,
            ],
            fanout_mode: FanoutMode::All,
            timeout_secs: 8,
        }
    }
}

impl SourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Exclude noise episodes (promos, recaps...) from automatic matching.
    pub filter_noise_episodes: bool,
    /// Episode titles matching this are noise. Manual browsing still sees them.
    pub noise_regex: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            filter_noise_episodes: true,
            noise_regex: "预告|花絮|彩蛋|专访|幕后|直拍|纯享|加更|看点|速看|解读|影评|周边|特辑|资讯"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Registry capacity; the oldest entry is evicted past this.
    pub max_animes: usize,
    pub search_ttl_minutes: u64,
    pub comment_ttl_minutes: u64,
    /// Remembered manual selections, insertion-order evicted.
    pub max_selections: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_animes: 100,
            search_ttl_minutes: 60,
            comment_ttl_minutes: 60,
            max_selections: 100,
        }
    }
}

/// Which durable mirror backend to use, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorBackend {
    None,
    Fs,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub backend: MirrorBackend,
    /// Directory for the filesystem backend.
    pub fs_path: String,
    /// Base URL of the remote key-value REST backend.
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
    /// Key prefix shared by all instances mirroring the same state.
    pub namespace: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            backend: MirrorBackend::None,
            fs_path: "./danmu-state".to_string(),
            remote_url: None,
            remote_token: None,
            namespace: "danmu-hub".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Collapse Top/Bottom comments into Scroll.
    pub collapse_fixed_modes: bool,
    pub color_policy: ColorPolicy,
    /// Convert traditional script to simplified.
    pub simplify_script: bool,
    /// Literal substrings; a comment containing any is dropped.
    pub block_literals: Vec<String>,
    /// Regex patterns; a comment matching any is dropped.
    pub block_patterns: Vec<String>,
    /// Dedup window in minutes; 0 disables temporal dedup.
    pub dedup_window_minutes: u64,
    /// Output cap in thousands of comments; 0 disables capping.
    pub max_comments_thousands: u64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            collapse_fixed_modes: false,
            color_policy: ColorPolicy::AsAuthored,
            simplify_script: true,
            block_literals: Vec::new(),
            block_patterns: Vec::new(),
            dedup_window_minutes: 0,
            max_comments_thousands: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Upstream fetches allowed per client per window.
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
        }
    }
}

impl AdmissionConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    pub matching: MatchingConfig,
    pub cache: CacheConfig,
    pub mirror: MirrorConfig,
    pub normalize: NormalizeConfig,
    pub admission: AdmissionConfig,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Some(raw) = env_var(name) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(var = name, value = %raw, "unparsable env var ignored"),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for everything unset.
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_var("DANMU_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        env_parse("DANMU_PORT", &mut config.server.port);
        env_parse("DANMU_ENABLE_CORS", &mut config.server.enable_cors);

        if let Some(raw) = env_var("DANMU_SOURCES") {
            let kinds: Vec<SourceKind> = raw
                .split(',')
                .filter_map(|part| {
                    let part = part.trim();
                    match part.parse() {
                        Ok(kind) => Some(kind),
                        Err(_) => {
                            warn!(source = part, "unknown source in DANMU_SOURCES ignored");
                            None
                        }
                    }
                })
                .collect();
            if !kinds.is_empty() {
                config.sources.enabled = kinds;
            }
        }
        if let Some(mode) = env_var("DANMU_FANOUT_MODE") {
            match mode.to_ascii_lowercase().as_str() {
                "fastest" => config.sources.fanout_mode = FanoutMode::Fastest,
                "all" => config.sources.fanout_mode = FanoutMode::All,
                other => warn!(mode = other, "unknown fan-out mode ignored"),
            }
        }
        env_parse("DANMU_SOURCE_TIMEOUT_SECS", &mut config.sources.timeout_secs);

        env_parse(
            "DANMU_FILTER_NOISE_EPISODES",
            &mut config.matching.filter_noise_episodes,
        );
        if let Some(regex) = env_var("DANMU_NOISE_REGEX") {
            config.matching.noise_regex = regex;
        }

        env_parse("DANMU_MAX_ANIMES", &mut config.cache.max_animes);
        env_parse("DANMU_SEARCH_TTL_MINUTES", &mut config.cache.search_ttl_minutes);
        env_parse("DANMU_COMMENT_TTL_MINUTES", &mut config.cache.comment_ttl_minutes);
        env_parse("DANMU_MAX_SELECTIONS", &mut config.cache.max_selections);

        if let Some(backend) = env_var("DANMU_MIRROR_BACKEND") {
            match backend.to_ascii_lowercase().as_str() {
                "none" => config.mirror.backend = MirrorBackend::None,
                "fs" => config.mirror.backend = MirrorBackend::Fs,
                "remote" => config.mirror.backend = MirrorBackend::Remote,
                other => warn!(backend = other, "unknown mirror backend ignored"),
            }
        }
        if let Some(path) = env_var("DANMU_MIRROR_PATH") {
            config.mirror.fs_path = path;
        }
        config.mirror.remote_url = env_var("DANMU_MIRROR_URL").or(config.mirror.remote_url);
        config.mirror.remote_token = env_var("DANMU_MIRROR_TOKEN").or(config.mirror.remote_token);
        if let Some(ns) = env_var("DANMU_MIRROR_NAMESPACE") {
            config.mirror.namespace = ns;
        }

        env_parse(
            "DANMU_COLLAPSE_FIXED_MODES",
            &mut config.normalize.collapse_fixed_modes,
        );
        if let Some(policy) = env_var("DANMU_COLOR_POLICY") {
            match policy.to_ascii_lowercase().as_str() {
                "as_authored" => config.normalize.color_policy = ColorPolicy::AsAuthored,
                "force_white" => config.normalize.color_policy = ColorPolicy::ForceWhite,
                "randomize" => config.normalize.color_policy = ColorPolicy::Randomize,
                other => warn!(policy = other, "unknown color policy ignored"),
            }
        }
        env_parse("DANMU_SIMPLIFY_SCRIPT", &mut config.normalize.simplify_script);
        if let Some(raw) = env_var("DANMU_BLOCK_LITERALS") {
            config.normalize.block_literals = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(raw) = env_var("DANMU_BLOCK_PATTERNS") {
            config.normalize.block_patterns = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        env_parse(
            "DANMU_DEDUP_WINDOW_MINUTES",
            &mut config.normalize.dedup_window_minutes,
        );
        env_parse(
            "DANMU_MAX_COMMENTS_THOUSANDS",
            &mut config.normalize.max_comments_thousands,
        );

        env_parse("DANMU_ADMISSION_MAX", &mut config.admission.max_requests);
        env_parse("DANMU_ADMISSION_WINDOW_SECS", &mut config.admission.window_secs);

        config
    }
}
