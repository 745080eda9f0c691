//! The comment normalization pipeline.
//!
//! Heterogeneous raw items become canonical comments, then pass through a
//! fixed-order chain of independently toggleable stages: style, script
//! conversion, content filtering, temporal dedup, volume capping.

pub mod script;
pub mod stages;

use tracing::debug;

use danmu_sources::RawComment;

use crate::config::NormalizeConfig;
use crate::model::{CanonicalComment, COLOR_WHITE, CommentMode};

/// One pipeline stage. Stages are pure list transformations; whether a stage
/// is present at all is decided at assembly time from configuration.
pub trait NormalizeStage: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, comments: Vec<CanonicalComment>) -> Vec<CanonicalComment>;
}

pub struct Pipeline {
    stages: Vec<Box<dyn NormalizeStage>>,
}

impl Pipeline {
    pub fn from_config(config: &NormalizeConfig) -> Self {
        let mut stages: Vec<Box<dyn NormalizeStage>> = Vec::new();

        stages.push(Box::new(stages::StyleStage::new(
            config.collapse_fixed_modes,
            config.color_policy,
        )));
        if config.simplify_script {
            stages.push(Box::new(stages::ScriptStage));
        }
        if !config.block_literals.is_empty() || !config.block_patterns.is_empty() {
            stages.push(Box::new(stages::FilterStage::new(
                &config.block_literals,
                &config.block_patterns,
            )));
        }
        if config.dedup_window_minutes > 0 {
            stages.push(Box::new(stages::DedupStage::new(
                config.dedup_window_minutes,
            )));
        }
        if config.max_comments_thousands > 0 {
            stages.push(Box::new(stages::CapStage::new(
                config.max_comments_thousands as usize * 1000,
            )));
        }

        Self { stages }
    }

    /// Convert raw items into ordered canonical comments and run all stages.
    pub fn normalize(&self, raw: Vec<RawComment>) -> Vec<CanonicalComment> {
        let mut comments: Vec<CanonicalComment> = raw
            .into_iter()
            .filter(|item| !item.text.trim().is_empty())
            .map(|item| CanonicalComment {
                time_ms: item.time_ms,
                mode: item.mode.map(CommentMode::from_code).unwrap_or_default(),
                color: item.color.unwrap_or(COLOR_WHITE) & 0xFF_FF_FF,
                text: item.text,
            })
            .collect();
        comments.sort_by_key(|c| c.time_ms);
        self.run(comments)
    }

    /// Run the stage chain over already-canonical comments.
    pub fn run(&self, mut comments: Vec<CanonicalComment>) -> Vec<CanonicalComment> {
        for stage in &self.stages {
            let before = comments.len();
            comments = stage.apply(comments);
            if comments.len() != before {
                debug!(stage = stage.name(), before, after = comments.len(), "stage applied");
            }
        }
        comments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_orders_and_defaults() {
        let pipeline = Pipeline::from_config(&NormalizeConfig::default());
        let raw = vec![
            RawComment { time_ms: 9_000, mode: Some(5), color: Some(0xFF0000), text: "后".into() },
            RawComment { time_ms: 1_000, mode: None, color: None, text: "先".into() },
            RawComment { time_ms: 5_000, mode: Some(1), color: Some(0xFFFFFF), text: "  ".into() },
        ];

        let comments = pipeline.normalize(raw);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].time_ms, 1_000);
        assert_eq!(comments[0].mode, CommentMode::Scroll);
        assert_eq!(comments[0].color, COLOR_WHITE);
        assert_eq!(comments[1].mode, CommentMode::Top);
    }

    #[test]
    fn test_stage_assembly_respects_toggles() {
        let config = NormalizeConfig {
            simplify_script: false,
            dedup_window_minutes: 0,
            max_comments_thousands: 0,
            ..NormalizeConfig::default()
        };
        let pipeline = Pipeline::from_config(&config);
        // Only the always-on style stage remains.
        assert_eq!(pipeline.stages.len(), 1);
    }
}
