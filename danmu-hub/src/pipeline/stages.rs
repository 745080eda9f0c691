//! Concrete normalization stages.

use std::collections::HashSet;

use rand::RngExt;
use regex::Regex;
use tracing::warn;

use crate::config::ColorPolicy;
use crate::model::{CanonicalComment, COLOR_WHITE, CommentMode};
use crate::pipeline::NormalizeStage;
use crate::pipeline::script::simplify;

/// Style normalization: mode collapsing and color policy.
pub struct StyleStage {
    collapse_fixed: bool,
    color_policy: ColorPolicy,
}

impl StyleStage {
    pub fn new(collapse_fixed: bool, color_policy: ColorPolicy) -> Self {
        Self {
            collapse_fixed,
            color_policy,
        }
    }
}

impl NormalizeStage for StyleStage {
    fn name(&self) -> &'static str {
        "style"
    }

    fn apply(&self, mut comments: Vec<CanonicalComment>) -> Vec<CanonicalComment> {
        let mut rng = rand::rng();
        for comment in &mut comments {
            if self.collapse_fixed {
                comment.mode = CommentMode::Scroll;
            }
            match self.color_policy {
                ColorPolicy::AsAuthored => {}
                ColorPolicy::ForceWhite => comment.color = COLOR_WHITE,
                ColorPolicy::Randomize => comment.color = rng.random_range(0..=0xFF_FF_FF),
            }
        }
        comments
    }
}

/// Optional traditional-to-simplified script conversion.
pub struct ScriptStage;

impl NormalizeStage for ScriptStage {
    fn name(&self) -> &'static str {
        "script"
    }

    fn apply(&self, mut comments: Vec<CanonicalComment>) -> Vec<CanonicalComment> {
        for comment in &mut comments {
            if let Some(converted) = simplify(&comment.text) {
                comment.text = converted;
            }
        }
        comments
    }
}

/// Blocklist filtering: literal substrings and regex patterns.
pub struct FilterStage {
    literals: Vec<String>,
    patterns: Vec<Regex>,
}

impl FilterStage {
    pub fn new(literals: &[String], patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|raw| match Regex::new(raw) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern = raw, error = %e, "invalid block pattern skipped");
                    None
                }
            })
            .collect();
        Self {
            literals: literals.to_vec(),
            patterns,
        }
    }

    fn is_blocked(&self, text: &str) -> bool {
        self.literals.iter().any(|lit| text.contains(lit.as_str()))
            || self.patterns.iter().any(|p| p.is_match(text))
    }
}

impl NormalizeStage for FilterStage {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn apply(&self, comments: Vec<CanonicalComment>) -> Vec<CanonicalComment> {
        comments
            .into_iter()
            .filter(|c| !self.is_blocked(&c.text))
            .collect()
    }
}

/// Temporal dedup: within fixed time windows, identical normalized text
/// collapses to its earliest representative.
pub struct DedupStage {
    window_ms: u64,
}

impl DedupStage {
    pub fn new(window_minutes: u64) -> Self {
        Self {
            window_ms: window_minutes * 60_000,
        }
    }
}

impl NormalizeStage for DedupStage {
    fn name(&self) -> &'static str {
        "dedup"
    }

    fn apply(&self, comments: Vec<CanonicalComment>) -> Vec<CanonicalComment> {
        if self.window_ms == 0 {
            return comments;
        }
        let mut seen: HashSet<(u64, String)> = HashSet::new();
        comments
            .into_iter()
            .filter(|c| {
                let bucket = c.time_ms / self.window_ms;
                seen.insert((bucket, c.text.trim().to_string()))
            })
            .collect()
    }
}

/// Volume capping by even-stride downsampling, preserving temporal coverage
/// end to end instead of truncating the tail.
pub struct CapStage {
    cap: usize,
}

impl CapStage {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }
}

impl NormalizeStage for CapStage {
    fn name(&self) -> &'static str {
        "cap"
    }

    fn apply(&self, comments: Vec<CanonicalComment>) -> Vec<CanonicalComment> {
        let n = comments.len();
        if self.cap == 0 || n <= self.cap {
            return comments;
        }
        if self.cap == 1 {
            return comments.into_iter().take(1).collect();
        }

        // Even stride across the whole track; endpoints always survive.
        let step = (n - 1) as f64 / (self.cap - 1) as f64;
        let mut picks = (0..self.cap)
            .map(|i| (((i as f64) * step).round() as usize).min(n - 1))
            .peekable();

        comments
            .into_iter()
            .enumerate()
            .filter(|(index, _)| {
                if picks.peek() == Some(index) {
                    picks.next();
                    true
                } else {
                    false
                }
            })
            .map(|(_, comment)| comment)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(time_ms: u64, text: &str) -> CanonicalComment {
        CanonicalComment::scroll(time_ms, text)
    }

    #[test]
    fn test_style_collapse_and_force_white() {
        let stage = StyleStage::new(true, ColorPolicy::ForceWhite);
        let mut input = vec![comment(0, "a")];
        input[0].mode = CommentMode::Top;
        input[0].color = 0x123456;

        let out = stage.apply(input);
        assert_eq!(out[0].mode, CommentMode::Scroll);
        assert_eq!(out[0].color, COLOR_WHITE);
    }

    #[test]
    fn test_filter_literals_and_patterns() {
        let stage = FilterStage::new(
            &["代练".to_string()],
            &[r"^\d{1,2}:\d{2}$".to_string(), "(unclosed".to_string()],
        );
        let input = vec![
            comment(0, "正常弹幕"),
            comment(1, "专业代练上分"),
            comment(2, "12:34"),
        ];
        let out = stage.apply(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "正常弹幕");
    }

    #[test]
    fn test_dedup_within_window_only() {
        let stage = DedupStage::new(1); // 60s windows
        let input = vec![
            comment(1_000, "哈哈哈"),
            comment(2_000, "哈哈哈"),
            comment(61_000, "哈哈哈"),
            comment(3_000, "不同"),
        ];
        let out = stage.apply(input);
        let texts: Vec<_> = out.iter().map(|c| (c.time_ms, c.text.as_str())).collect();
        assert_eq!(
            texts,
            vec![(1_000, "哈哈哈"), (61_000, "哈哈哈"), (3_000, "不同")]
        );
    }

    #[test]
    fn test_cap_preserves_endpoints() {
        let input: Vec<_> = (0..1000).map(|i| comment(i * 100, "x")).collect();
        let stage = CapStage::new(300);
        let out = stage.apply(input);

        assert!((299..=301).contains(&out.len()));
        assert_eq!(out.first().unwrap().time_ms, 0);
        assert_eq!(out.last().unwrap().time_ms, 999 * 100);
        // Still ordered after downsampling.
        assert!(out.windows(2).all(|w| w[0].time_ms <= w[1].time_ms));
    }

    #[test]
    fn test_cap_noop_under_limit() {
        let input: Vec<_> = (0..10).map(|i| comment(i, "x")).collect();
        let out = CapStage::new(300).apply(input.clone());
        assert_eq!(out.len(), input.len());
    }
}
