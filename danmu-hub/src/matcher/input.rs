//! Free-text query parsing.
//!
//! Extraction is layered: an explicit `SxxEyy` pattern wins, then trailing
//! season/episode words (第X季 / 第X集 / Season N / EP N), with Chinese
//! numerals converted where they appear. Anything left over is the title.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// A classified query: direct URL, or title with optional season/episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedQuery {
    Url(String),
    Title {
        title: String,
        season: Option<u32>,
        episode: Option<u32>,
    },
}

static SXX_EYY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bS(\d{1,2})[\s._-]*E(\d{1,4})\b").unwrap());
static SEASON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"第([0-9一二三四五六七八九十]+)[季部期]").unwrap());
static EPISODE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"第([0-9一二三四五六七八九十]+)[集话話期]").unwrap());
static SEASON_EN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSeason\s*(\d{1,2})\b").unwrap());
static EPISODE_EN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:Episode|EP?)\s*\.?\s*(\d{1,4})\b").unwrap());
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._]+").unwrap());
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Parse "12", "十二", "二十三"... Chinese numerals cover the 1-99 range
/// episode words use in practice.
pub fn parse_numeral(raw: &str) -> Option<u32> {
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }

    const DIGITS: [(char, u32); 9] = [
        ('一', 1),
        ('二', 2),
        ('三', 3),
        ('四', 4),
        ('五', 5),
        ('六', 6),
        ('七', 7),
        ('八', 8),
        ('九', 9),
    ];
    let digit = |c: char| DIGITS.iter().find(|(d, _)| *d == c).map(|(_, v)| *v);

    let chars: Vec<char> = raw.chars().collect();
    match chars.as_slice() {
        [c] if *c == '十' => Some(10),
        [c] => digit(*c),
        ['十', ones] => digit(*ones).map(|o| 10 + o),
        [tens, '十'] => digit(*tens).map(|t| t * 10),
        [tens, '十', ones] => match (digit(*tens), digit(*ones)) {
            (Some(t), Some(o)) => Some(t * 10 + o),
            _ => None,
        },
        _ => None,
    }
}

/// Remove the first match of any pattern from `text`, returning its parsed
/// numeral capture.
fn take_numbered_word(text: &mut String, patterns: &[&LazyLock<Regex>]) -> Option<u32> {
    for pattern in patterns {
        let hit = pattern
            .captures(text)
            .map(|m| (m.get(0).unwrap().range(), m[1].to_string()));
        if let Some((range, numeral)) = hit {
            text.replace_range(range, " ");
            return parse_numeral(&numeral);
        }
    }
    None
}

fn clean_title(raw: &str) -> String {
    let spaced = SEPARATORS.replace_all(raw, " ");
    let collapsed = MULTI_SPACE.replace_all(&spaced, " ");
    collapsed
        .trim()
        .trim_end_matches(['-', '–', ' '])
        .trim()
        .to_string()
}

/// Classify raw user input into a URL or a {title, season, episode} triple.
pub fn parse_query(raw: &str) -> Result<ParsedQuery> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::AmbiguousInput("empty query".to_string()));
    }

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(ParsedQuery::Url(raw.to_string()));
    }

    // Layer 1: explicit SxxEyy.
    if let Some(m) = SXX_EYY.captures(raw) {
        let season = m[1].parse().ok();
        let episode = m[2].parse().ok();
        let title = clean_title(&raw[..m.get(0).unwrap().start()]);
        if !title.is_empty() {
            return Ok(ParsedQuery::Title { title, season, episode });
        }
    }

    // Layers 2 and 3: season/episode words, Arabic or Chinese numerals.
    let mut remainder = raw.to_string();
    let season = take_numbered_word(&mut remainder, &[&SEASON_WORD, &SEASON_EN]);
    let episode = take_numbered_word(&mut remainder, &[&EPISODE_WORD, &EPISODE_EN]);

    let title = clean_title(&remainder);
    if title.is_empty() {
        // Season/episode alone cannot identify a program.
        return Err(Error::AmbiguousInput(format!("no title in query: {raw}")));
    }

    Ok(ParsedQuery::Title { title, season, episode })
}

impl ParsedQuery {
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Url(_) => None,
            Self::Title { title, .. } => Some(title),
        }
    }

    pub fn season(&self) -> Option<u32> {
        match self {
            Self::Url(_) => None,
            Self::Title { season, .. } => *season,
        }
    }

    pub fn episode(&self) -> Option<u32> {
        match self {
            Self::Url(_) => None,
            Self::Title { episode, .. } => *episode,
        }
    }
}
