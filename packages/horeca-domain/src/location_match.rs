//! Resolves vendor location names ("Bar-Bea", "Café Bea Amsterdam") to canonical locations.
//!
//! Strategies run in a fixed order and the first one that produces a hit wins. Within a strategy
//! the earliest candidate in the list wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

static NON_ALNUM: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Static regex must compile."));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
	Exact,
	Substring,
	Normalized,
}
impl MatchStrategy {
	pub const ORDER: [MatchStrategy; 3] =
		[MatchStrategy::Exact, MatchStrategy::Substring, MatchStrategy::Normalized];

	pub fn find<S>(self, raw: &str, candidates: &[S]) -> Option<usize>
	where
		S: AsRef<str>,
	{
		match self {
			Self::Exact => exact_match(raw, candidates),
			Self::Substring => substring_match(raw, candidates),
			Self::Normalized => normalized_match(raw, candidates),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationMatch {
	pub index: usize,
	pub strategy: MatchStrategy,
}

pub fn match_location<S>(raw: &str, candidates: &[S]) -> Option<LocationMatch>
where
	S: AsRef<str>,
{
	if raw.trim().is_empty() {
		return None;
	}

	MatchStrategy::ORDER.into_iter().find_map(|strategy| {
		strategy.find(raw, candidates).map(|index| LocationMatch { index, strategy })
	})
}

/// Case-insensitive equality after trimming.
pub fn exact_match<S>(raw: &str, candidates: &[S]) -> Option<usize>
where
	S: AsRef<str>,
{
	let needle = raw.trim().to_lowercase();

	candidates.iter().position(|candidate| candidate.as_ref().trim().to_lowercase() == needle)
}

/// Either side containing the other, case-insensitive.
pub fn substring_match<S>(raw: &str, candidates: &[S]) -> Option<usize>
where
	S: AsRef<str>,
{
	let needle = raw.trim().to_lowercase();

	if needle.is_empty() {
		return None;
	}

	candidates.iter().position(|candidate| {
		let candidate = candidate.as_ref().trim().to_lowercase();

		!candidate.is_empty() && (candidate.contains(&needle) || needle.contains(&candidate))
	})
}

/// Equality of the punctuation/whitespace/diacritic-insensitive forms, spaced or compacted.
pub fn normalized_match<S>(raw: &str, candidates: &[S]) -> Option<usize>
where
	S: AsRef<str>,
{
	let needle = normalize_name(raw);

	if needle.is_empty() {
		return None;
	}

	let needle_compact = needle.replace(' ', "");

	candidates.iter().position(|candidate| {
		let candidate = normalize_name(candidate.as_ref());

		!candidate.is_empty()
			&& (candidate == needle || candidate.replace(' ', "") == needle_compact)
	})
}

/// Lowercases, strips diacritics and collapses every run of non-alphanumerics to one space.
pub fn normalize_name(raw: &str) -> String {
	let folded: String = raw.nfkd().filter(|ch| !is_combining_mark(*ch)).collect::<String>();
	let lowered = folded.to_lowercase();

	NON_ALNUM.replace_all(&lowered, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_punctuation_and_diacritics() {
		assert_eq!(normalize_name("  Bar-Bea!! "), "bar bea");
		assert_eq!(normalize_name("Café  l'Amour"), "cafe l amour");
	}

	#[test]
	fn strategies_are_independent() {
		let candidates = ["Van Kinsbergen", "Bar Bea"];

		assert_eq!(exact_match("bar bea", &candidates), Some(1));
		assert_eq!(exact_match("Bar-Bea", &candidates), None);
		assert_eq!(substring_match("Kinsbergen", &candidates), Some(0));
		assert_eq!(normalized_match("Bar-Bea", &candidates), Some(1));
		assert_eq!(normalized_match("BarBea", &candidates), Some(1));
	}

	#[test]
	fn earlier_strategy_wins_over_earlier_candidate() {
		let candidates = ["Bea Bar", "Bea"];
		let hit = match_location("Bea", &candidates).expect("Expected a match.");

		assert_eq!(hit, LocationMatch { index: 1, strategy: MatchStrategy::Exact });
	}

	#[test]
	fn blank_names_never_match() {
		assert_eq!(match_location("   ", &["Bar Bea"]), None);
		assert_eq!(match_location("---", &["Bar Bea"]), None);
	}
}
