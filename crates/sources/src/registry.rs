//! Tagged registry of concrete source adapters.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::adapter::SourceAdapter;
use crate::bilibili::Bilibili;
use crate::iqiyi::Iqiyi;
use crate::mgtv::Mgtv;
use crate::tencent::Tencent;

/// Platforms the gateway knows how to talk to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SourceKind {
    Bilibili,
    Tencent,
    Iqiyi,
    Mgtv,
}

type AdapterConstructor = fn(Client) -> Arc<dyn SourceAdapter>;

struct SourceEntry {
    kind: SourceKind,
    url_regex: &'static LazyLock<Regex>,
    constructor: AdapterConstructor,
}

macro_rules! source_registry {
    ( $( $kind:expr, $regex:path => $builder:path ),+ $(,)? ) => {
        &[
            $(
                SourceEntry {
                    kind: $kind,
                    url_regex: &$regex,
                    constructor: |client| Arc::new($builder(client)) as Arc<dyn SourceAdapter>,
                },
            )+
        ]
    };
}

static SOURCES: &[SourceEntry] = source_registry![
    SourceKind::Bilibili, crate::bilibili::URL_REGEX => Bilibili::new,
    SourceKind::Tencent,  crate::tencent::URL_REGEX  => Tencent::new,
    SourceKind::Iqiyi,    crate::iqiyi::URL_REGEX    => Iqiyi::new,
    SourceKind::Mgtv,     crate::mgtv::URL_REGEX     => Mgtv::new,
];

/// The set of adapters one engine instance queries, in configured order.
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    /// Build adapters for `kinds`, preserving order. Unknown duplicates are
    /// collapsed to the first occurrence.
    pub fn from_kinds(kinds: &[SourceKind], client: Client) -> Self {
        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if adapters.iter().any(|a| a.kind() == *kind) {
                continue;
            }
            if let Some(entry) = SOURCES.iter().find(|e| e.kind == *kind) {
                adapters.push((entry.constructor)(client.clone()));
            }
        }
        Self { adapters }
    }

    /// Registry over an externally built adapter set (tests, custom wiring).
    pub fn from_adapters(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn all(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    pub fn by_kind(&self, kind: SourceKind) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.kind() == kind).cloned()
    }

    /// Route a user-pasted URL to its owning adapter.
    pub fn route_url(&self, url: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.handles_url(url)).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }
}

/// Does any known platform (configured or not) claim this URL?
pub fn is_known_platform_url(url: &str) -> bool {
    SOURCES.iter().any(|e| e.url_regex.is_match(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            SourceKind::Bilibili,
            SourceKind::Tencent,
            SourceKind::Iqiyi,
            SourceKind::Mgtv,
        ] {
            let s = kind.to_string();
            let parsed: SourceKind = s.parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert_eq!("BiliBili".parse::<SourceKind>().unwrap(), SourceKind::Bilibili);
    }

    #[test]
    fn test_registry_order_and_dedup() {
        let registry = SourceRegistry::from_kinds(
            &[SourceKind::Tencent, SourceKind::Bilibili, SourceKind::Tencent],
            Client::new(),
        );
        let kinds: Vec<_> = registry.all().iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![SourceKind::Tencent, SourceKind::Bilibili]);
    }

    #[test]
    fn test_url_routing() {
        let registry = SourceRegistry::from_kinds(
            &[SourceKind::Bilibili, SourceKind::Tencent],
            Client::new(),
        );
        let adapter = registry
            .route_url("https://www.bilibili.com/bangumi/play/ep123456")
            .unwrap();
        assert_eq!(adapter.kind(), SourceKind::Bilibili);
        assert!(registry.route_url("https://example.com/video/1").is_none());
    }
}
