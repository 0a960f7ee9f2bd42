//! Facility Matcher
//!
//! Ranks registry facilities against a submitted company name. Each strategy runs
//! independently over the same candidates; results are merged per facility id,
//! keeping the strongest match.

use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use verdant_models::{FacilityRecord, MatchConfidenceLevel, MatchResult, MatchStrategy, MatchSummary};
use verdant_utils::ThresholdsConfig;

const STOP_WORDS: [&str; 12] = ["the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by"];

/// Keyword overlap never scores above this.
const KEYWORD_CEILING: f64 = 0.5;

/// Canonical company-name form used for every comparison.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    punctuation: Regex,
    suffix: Regex,
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl NameNormalizer {
    pub fn new() -> Self {
        Self {
            punctuation: Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"),
            suffix: Regex::new(r"\s+(inc|incorporated|llc|corp|corporation|ltd|limited|co|company)$")
                .expect("suffix pattern is valid"),
        }
    }

    /// Lowercases, drops punctuation, collapses whitespace and strips trailing
    /// corporate suffixes until none remain, so the result is a fixed point.
    pub fn normalize(&self, name: &str) -> String {
        let lowered = name.to_lowercase();
        let spaced = self.punctuation.replace_all(&lowered, " ");
        let mut normalized = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
        loop {
            let stripped = self.suffix.replace(&normalized, "").into_owned();
            if stripped == normalized {
                break;
            }
            normalized = stripped;
        }
        normalized
    }
}

pub fn extract_keywords(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

pub struct FacilityMatcher {
    normalizer: NameNormalizer,
    min_similarity: f64,
    require_state_match: bool,
    /// normalized name -> related normalized names (parents and subsidiaries, both ways)
    relations: HashMap<String, HashSet<String>>,
}

impl FacilityMatcher {
    pub fn new(min_similarity: f64) -> Self {
        Self {
            normalizer: NameNormalizer::new(),
            min_similarity: min_similarity.clamp(0.0, 1.0),
            require_state_match: false,
            relations: HashMap::new(),
        }
    }

    pub fn from_thresholds(thresholds: &ThresholdsConfig) -> Self {
        Self::new(thresholds.fuzzy_min_similarity).with_state_requirement(thresholds.require_state_match)
    }

    pub fn with_state_requirement(mut self, require: bool) -> Self {
        self.require_state_match = require;
        self
    }

    /// Registers `subsidiaries` of `parent`; lookups work from either side.
    pub fn with_subsidiaries(mut self, parent: &str, subsidiaries: &[&str]) -> Self {
        let parent = self.normalizer.normalize(parent);
        for subsidiary in subsidiaries {
            let subsidiary = self.normalizer.normalize(subsidiary);
            if subsidiary.is_empty() || subsidiary == parent {
                continue;
            }
            self.relations.entry(parent.clone()).or_default().insert(subsidiary.clone());
            self.relations.entry(subsidiary).or_default().insert(parent.clone());
        }
        self
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    pub fn match_facilities(&self, company: &str, state: Option<&str>, candidates: &[FacilityRecord]) -> MatchSummary {
        let normalized_company = self.normalizer.normalize(company);
        let state_filter = state.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty());

        let candidates: Vec<(&FacilityRecord, String)> = candidates
            .iter()
            .filter(|record| match (&state_filter, self.require_state_match) {
                (Some(state), true) => record.in_state(state),
                _ => true,
            })
            .map(|record| (record, self.normalizer.normalize(&record.facility_name)))
            .collect();

        let mut found = Vec::new();
        if !normalized_company.is_empty() {
            found.extend(self.exact(&normalized_company, &candidates));
            found.extend(self.fuzzy(&normalized_company, &candidates));
            found.extend(self.keyword(&normalized_company, &candidates));
            found.extend(self.subsidiary(&normalized_company, &candidates));
        }

        let matches = merge_matches(found);
        summarize(company, normalized_company, state_filter, matches)
    }

    fn exact(&self, company: &str, candidates: &[(&FacilityRecord, String)]) -> Vec<MatchResult> {
        candidates
            .iter()
            .filter(|(_, name)| name == company)
            .map(|(record, _)| MatchResult::new((*record).clone(), 1.0, MatchStrategy::Exact))
            .collect()
    }

    fn fuzzy(&self, company: &str, candidates: &[(&FacilityRecord, String)]) -> Vec<MatchResult> {
        candidates
            .iter()
            .filter_map(|(record, name)| {
                let similarity = strsim::normalized_levenshtein(company, name);
                (similarity >= self.min_similarity)
                    .then(|| MatchResult::new((*record).clone(), similarity, MatchStrategy::Fuzzy))
            })
            .collect()
    }

    fn keyword(&self, company: &str, candidates: &[(&FacilityRecord, String)]) -> Vec<MatchResult> {
        let keywords = extract_keywords(company);
        if keywords.is_empty() {
            return Vec::new();
        }
        candidates
            .iter()
            .filter_map(|(record, name)| {
                let words: HashSet<&str> = name.split_whitespace().collect();
                let overlap = keywords.iter().filter(|k| words.contains(k.as_str())).count();
                (overlap > 0).then(|| {
                    let confidence = KEYWORD_CEILING * overlap as f64 / keywords.len() as f64;
                    MatchResult::new((*record).clone(), confidence, MatchStrategy::Keyword)
                })
            })
            .collect()
    }

    fn subsidiary(&self, company: &str, candidates: &[(&FacilityRecord, String)]) -> Vec<MatchResult> {
        let Some(related) = self.relations.get(company) else {
            return Vec::new();
        };
        candidates
            .iter()
            .filter(|(_, name)| {
                let padded = format!(" {} ", name);
                related.iter().any(|alias| padded.contains(&format!(" {} ", alias)))
            })
            .map(|(record, _)| MatchResult::new((*record).clone(), 1.0, MatchStrategy::Subsidiary))
            .collect()
    }
}

/// One result per facility id, strongest first; ties go to the higher-precedence strategy.
pub fn merge_matches(found: Vec<MatchResult>) -> Vec<MatchResult> {
    let mut by_id: HashMap<String, MatchResult> = HashMap::new();
    for candidate in found {
        match by_id.get(&candidate.facility.registry_id) {
            Some(existing) if !candidate.outranks(existing) => {}
            _ => {
                by_id.insert(candidate.facility.registry_id.clone(), candidate);
            }
        }
    }

    let mut merged: Vec<MatchResult> = by_id.into_values().collect();
    merged.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.strategy.precedence().cmp(&b.strategy.precedence()))
            .then_with(|| a.facility.registry_id.cmp(&b.facility.registry_id))
    });
    merged
}

/// Builds the summary for an already ranked list.
pub fn summarize(
    company: &str,
    normalized_company: String,
    state_filter: Option<String>,
    matches: Vec<MatchResult>,
) -> MatchSummary {
    let best_similarity = matches.iter().map(|m| m.similarity).reduce(f64::max);
    let average_similarity = if matches.is_empty() {
        None
    } else {
        Some(matches.iter().map(|m| m.similarity).sum::<f64>() / matches.len() as f64)
    };
    let confidence_level = MatchConfidenceLevel::from_best(best_similarity);

    let mut strategy_breakdown = BTreeMap::new();
    for m in &matches {
        *strategy_breakdown.entry(m.strategy).or_insert(0) += 1;
    }

    MatchSummary {
        company: company.to_string(),
        normalized_company,
        state_filter,
        matches,
        best_similarity,
        average_similarity,
        confidence_level,
        strategy_breakdown,
        recommendation: confidence_level.recommendation().to_string(),
    }
}
