//! Episode noise filtering.
//!
//! Platforms interleave promos, recaps and behind-the-scenes clips with real
//! episodes. The filter only guards automatic matching; manual browsing
//! always sees the full list.

use regex::Regex;
use tracing::warn;

use crate::config::MatchingConfig;

pub struct EpisodeNoiseFilter {
    pattern: Option<Regex>,
}

impl EpisodeNoiseFilter {
    pub fn from_config(config: &MatchingConfig) -> Self {
        if !config.filter_noise_episodes || config.noise_regex.is_empty() {
            return Self { pattern: None };
        }
        let pattern = match Regex::new(&config.noise_regex) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(error = %e, "invalid noise regex; episode filtering disabled");
                None
            }
        };
        Self { pattern }
    }

    pub fn is_noise(&self, episode_title: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|p| p.is_match(episode_title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern_flags_promos() {
        let filter = EpisodeNoiseFilter::from_config(&MatchingConfig::default());
        assert!(filter.is_noise("第8集预告"));
        assert!(filter.is_noise("拍摄花絮：片场日常"));
        assert!(!filter.is_noise("第8集"));
    }

    #[test]
    fn test_disabled_filter_passes_everything() {
        let config = MatchingConfig {
            filter_noise_episodes: false,
            ..MatchingConfig::default()
        };
        let filter = EpisodeNoiseFilter::from_config(&config);
        assert!(!filter.is_noise("第8集预告"));
    }

    #[test]
    fn test_invalid_regex_disables_filter() {
        let config = MatchingConfig {
            filter_noise_episodes: true,
            noise_regex: "(unclosed".to_string(),
        };
        let filter = EpisodeNoiseFilter::from_config(&config);
        assert!(!filter.is_noise("预告"));
    }
}
