//! Fuzzy station-name resolution: numeric id, nickname, suffix-stripping,
//! spelling correction, exact match, `台`/`臺` variant substitution, then a
//! Levenshtein fallback.

use crate::error::TraError;
use crate::models::{Confidence, Station};
use std::collections::HashMap;

const SUFFIXES: [&str; 3] = ["火車站", "車站", "站"];
const SUGGESTION_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct ResolvedStation {
    pub station: Station,
    pub confidence: Confidence,
}

/// Loaded once at process start from station and side-index payloads;
/// read-only thereafter.
pub struct StationResolver {
    stations: Vec<Station>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    nicknames: HashMap<String, String>,
    corrections: HashMap<String, String>,
}

impl StationResolver {
    pub fn new(
        stations: Vec<Station>,
        nicknames: HashMap<String, String>,
        corrections: HashMap<String, String>,
    ) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for (idx, station) in stations.iter().enumerate() {
            by_id.insert(station.id.clone(), idx);
            by_name.insert(station.name.clone(), idx);
        }

        Self {
            stations,
            by_id,
            by_name,
            nicknames,
            corrections,
        }
    }

    pub fn get_all_stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Station> {
        self.by_id.get(id).map(|&idx| &self.stations[idx])
    }

    fn strip_suffix(query: &str) -> &str {
        for suffix in SUFFIXES {
            if let Some(stripped) = query.strip_suffix(suffix) {
                return stripped;
            }
        }
        query
    }

    fn taiwanese_variant(query: &str) -> String {
        query.chars().map(taiwanese_char_variant).collect()
    }

    /// Resolves `query` to a station, trying each rule in order and
    /// stopping at the first success.
    pub fn resolve(&self, query: &str) -> Result<ResolvedStation, TraError> {
        let query = query.trim();

        // 1. Numeric id match.
        if query.chars().all(|c| c.is_ascii_digit()) && !query.is_empty() {
            if let Some(station) = self.get_by_id(query) {
                return Ok(ResolvedStation {
                    station: station.clone(),
                    confidence: Confidence::Exact,
                });
            }
        }

        // 2. Nickname exact match.
        if let Some(id) = self.nicknames.get(query) {
            if let Some(station) = self.get_by_id(id) {
                return Ok(ResolvedStation {
                    station: station.clone(),
                    confidence: Confidence::Exact,
                });
            }
        }

        // 3. Suffix stripping.
        let stripped = Self::strip_suffix(query);

        // 4. Spelling correction on the stripped form.
        let corrected = self.corrections.get(stripped).map(String::as_str);
        let canonical_candidate = corrected.unwrap_or(stripped);

        // 5. Exact name match (against both the stripped and corrected forms).
        for candidate in [query, stripped, canonical_candidate] {
            if let Some(&idx) = self.by_name.get(candidate) {
                return Ok(ResolvedStation {
                    station: self.stations[idx].clone(),
                    confidence: Confidence::Exact,
                });
            }
        }

        // 6. Taiwanese 台/臺 variant substitution.
        for candidate in [query, stripped, canonical_candidate] {
            let variant = Self::taiwanese_variant(candidate);
            if let Some(&idx) = self.by_name.get(&variant) {
                return Ok(ResolvedStation {
                    station: self.stations[idx].clone(),
                    confidence: Confidence::Exact,
                });
            }
        }

        // 7. Fuzzy match by Levenshtein distance.
        if let Some((idx, distance)) = self.nearest_by_distance(canonical_candidate) {
            let confidence = match distance {
                1 => Some(Confidence::High),
                2 => Some(Confidence::Medium),
                _ => None,
            };
            if let Some(confidence) = confidence {
                return Ok(ResolvedStation {
                    station: self.stations[idx].clone(),
                    confidence,
                });
            }
        }

        // 8. Suggestions on failure.
        let candidates = self.search(canonical_candidate, SUGGESTION_LIMIT);
        let suggestion = candidates.first().map(|s| s.name.clone());
        Err(TraError::StationNotFound {
            message: format!("no station matches '{query}'"),
            suggestion,
            candidates: candidates.into_iter().map(|s| s.name).collect(),
        })
    }

    fn nearest_by_distance(&self, query: &str) -> Option<(usize, usize)> {
        self.stations
            .iter()
            .enumerate()
            .map(|(idx, s)| (idx, levenshtein(query, &s.name)))
            .min_by_key(|&(_, distance)| distance)
    }

    /// Top `limit` candidates by Levenshtein distance, without asserting
    /// success.
    pub fn search(&self, query: &str, limit: usize) -> Vec<Station> {
        let mut ranked: Vec<(usize, &Station)> = self
            .stations
            .iter()
            .map(|s| (levenshtein(query, &s.name), s))
            .collect();
        ranked.sort_by_key(|&(distance, _)| distance);
        ranked.into_iter().take(limit).map(|(_, s)| s.clone()).collect()
    }
}

fn taiwanese_char_variant(c: char) -> char {
    match c {
        '台' => '臺',
        '臺' => '台',
        other => other,
    }
}

/// Classic dynamic-programming edit distance, operating on `char`s so
/// multi-byte CJK characters count as single units.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());

    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m]
}
