//! Title/episode matching: query parsing, source fan-out and ranking.

pub mod fanout;
pub mod input;
pub mod noise;
pub mod ranking;

pub use fanout::search_sources;
pub use input::{ParsedQuery, parse_query};
pub use noise::EpisodeNoiseFilter;
pub use ranking::{normalize_keyword, rank_candidates};
