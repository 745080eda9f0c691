//! Candidate ranking.
//!
//! Heuristic scoring promotes title/season agreement, with a special case
//! for movies when the query has no season. A remembered manual selection
//! overrides heuristics entirely: disambiguation is sticky.

use std::sync::LazyLock;

use regex::Regex;

use danmu_sources::MediaType;

use crate::matcher::input::{ParsedQuery, parse_numeral};
use crate::model::MatchCandidate;

static TITLE_SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"第([0-9一二三四五六七八九十]+)[季部期]").unwrap());

/// Normalize a keyword/title for comparison and cache keying: lowercase,
/// whitespace and common separator punctuation removed.
pub fn normalize_keyword(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ':' | '：' | '-' | '－' | '·' | '_' | '.'))
        .collect()
}

/// Title prefix before any parenthetical, the length tie-break basis.
fn prefix_len(title: &str) -> usize {
    let cut = title
        .find(['(', '（'])
        .unwrap_or(title.len());
    title[..cut].trim().chars().count()
}

/// Season as the candidate presents it: an explicit field, or one written
/// into its title.
fn candidate_season(candidate: &MatchCandidate) -> Option<u32> {
    candidate.season.or_else(|| {
        TITLE_SEASON
            .captures(&candidate.title)
            .and_then(|m| parse_numeral(&m[1]))
    })
}

fn score(candidate: &MatchCandidate, query_norm: &str, query_season: Option<u32>) -> i32 {
    let title_norm = normalize_keyword(&candidate.title);
    let mut score = 0;

    if title_norm == *query_norm {
        score += 100;
    } else if title_norm.contains(query_norm) || query_norm.contains(title_norm.as_str()) {
        score += 40;
    }

    match query_season {
        Some(season) => {
            // A series matching the requested season wins over any movie.
            if candidate.media_type != MediaType::Movie
                && candidate_season(candidate).unwrap_or(1) == season
            {
                score += 30;
            }
        }
        None => {
            if candidate.media_type == MediaType::Movie {
                score += 20;
            } else if candidate_season(candidate).unwrap_or(1) == 1 {
                score += 20;
            }
        }
    }

    score
}

/// Order candidates best-first.
///
/// `remembered` is a previously chosen anime id for this keyword; while it is
/// still among the candidates it is forced to rank 1 regardless of score.
pub fn rank_candidates(
    candidates: &mut Vec<MatchCandidate>,
    query: &ParsedQuery,
    remembered: Option<i64>,
) {
    let query_norm = query.title().map(normalize_keyword).unwrap_or_default();
    let query_season = query.season();

    // Stable sort: equal (score, prefix length) keeps configured source order.
    candidates.sort_by(|a, b| {
        let score_a = score(a, &query_norm, query_season);
        let score_b = score(b, &query_norm, query_season);
        score_b
            .cmp(&score_a)
            .then_with(|| prefix_len(&a.title).cmp(&prefix_len(&b.title)))
    });

    if let Some(id) = remembered
        && let Some(position) = candidates.iter().position(|c| c.anime_id == id)
        && position > 0
    {
        let chosen = candidates.remove(position);
        candidates.insert(0, chosen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use danmu_sources::SourceKind;

    fn candidate(id: i64, title: &str, media_type: MediaType) -> MatchCandidate {
        MatchCandidate {
            anime_id: id,
            title: title.to_string(),
            media_type,
            source: SourceKind::Bilibili,
            season: None,
            year: None,
            episode_count: None,
        }
    }

    fn query(title: &str, season: Option<u32>) -> ParsedQuery {
        ParsedQuery::Title {
            title: title.to_string(),
            season,
            episode: None,
        }
    }

    #[test]
    fn test_season_agreement_promotes() {
        let mut candidates = vec![
            candidate(1, "间谍过家家", MediaType::Series),
            candidate(2, "间谍过家家 第二季", MediaType::Series),
        ];
        rank_candidates(&mut candidates, &query("间谍过家家", Some(2)), None);
        assert_eq!(candidates[0].anime_id, 2);
    }

    #[test]
    fn test_movie_promoted_without_season() {
        let mut candidates = vec![
            candidate(1, "流浪地球 幕后纪录", MediaType::Series),
            candidate(2, "流浪地球", MediaType::Movie),
        ];
        rank_candidates(&mut candidates, &query("流浪地球", None), None);
        assert_eq!(candidates[0].anime_id, 2);
    }

    #[test]
    fn test_tie_breaks_by_prefix_length() {
        // Parentheticals are excluded from the measured prefix.
        assert_eq!(prefix_len("夏目友人帐（中配版）"), prefix_len("夏目友人帐"));

        let mut candidates = vec![
            candidate(3, "夏目友人帐 特别篇合集", MediaType::Series),
            candidate(4, "夏目友人帐", MediaType::Series),
        ];
        rank_candidates(&mut candidates, &query("夏目友人帐", None), None);
        assert_eq!(candidates[0].anime_id, 4);
    }

    #[test]
    fn test_remembered_selection_overrides_score() {
        let mut candidates = vec![
            candidate(1, "某科学的超电磁炮", MediaType::Series),
            candidate(2, "某科学的超电磁炮T", MediaType::Series),
        ];
        // Heuristics would rank id 1 first; memory forces id 2.
        rank_candidates(&mut candidates, &query("某科学的超电磁炮", None), Some(2));
        assert_eq!(candidates[0].anime_id, 2);

        // A remembered id that is no longer a candidate changes nothing.
        let mut candidates = vec![candidate(1, "某科学的超电磁炮", MediaType::Series)];
        rank_candidates(&mut candidates, &query("某科学的超电磁炮", None), Some(99));
        assert_eq!(candidates[0].anime_id, 1);
    }

    #[test]
    fn test_normalize_keyword() {
        assert_eq!(normalize_keyword("SPY x FAMILY"), "spyxfamily");
        assert_eq!(normalize_keyword("间谍 过家家：第二季"), "间谍过家家第二季");
    }
}
