//! Free-text matching over the searchable projection of a [PolicyRecord].
//!
//! Both the query and the record fields are folded the same way (NFKC, then lowercase) before any
//! comparison. Record fields are folded once, when the [SearchIndex] is built.
//!
//! Two modes are supported:
//!
//! - [MatchMode::Substring]: a record matches when any field contains the query.
//! - [MatchMode::Fuzzy]: a record matches when some substring of a field is within
//!   `floor(query_len * threshold)` edits of the query. Edits are insertions, deletions,
//!   substitutions, and transpositions of adjacent characters. Exact substrings cost zero edits, so
//!   everything substring mode accepts is accepted here too.
//!
//! Scores are in `[0, 1]` and lower is better: `0.0` is an exact hit.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::{
    config::{CatalogConfig, MatchMode},
    properties::{PolicyRecord, SearchField},
};

/// Case-fold `text` for matching.
pub fn fold(text: &str) -> String {
    text.nfkc().flat_map(char::to_lowercase).collect()
}

/// Folded searchable fields of a single record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    fields: Vec<(SearchField, String)>,
}

impl SearchEntry {
    pub fn new(record: &PolicyRecord) -> Self {
        SearchEntry {
            fields: record
                .searchable_fields()
                .map(|(field, text)| (field, fold(text)))
                .collect(),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (SearchField, &str)> {
        self.fields.iter().map(|(field, text)| (*field, text.as_str()))
    }
}

/// Folded searchable fields for every record of a store, indexed by store position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchIndex {
    entries: Vec<SearchEntry>,
}

impl SearchIndex {
    pub fn build<'a, I: IntoIterator<Item = &'a PolicyRecord>>(records: I) -> Self {
        SearchIndex {
            entries: records.into_iter().map(SearchEntry::new).collect(),
        }
    }

    pub fn get(&self, position: usize) -> Option<&SearchEntry> {
        self.entries.get(position)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A query after trimming, truncation, and folding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedQuery {
    /// Blank query: every record matches.
    All,
    Text { folded: String, chars: Vec<char> },
}

impl PreparedQuery {
    pub fn is_all(&self) -> bool {
        matches!(self, PreparedQuery::All)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    mode: MatchMode,
    threshold: f32,
    max_query_chars: usize,
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::new(&CatalogConfig::default())
    }
}

impl Matcher {
    pub fn new(config: &CatalogConfig) -> Self {
        Matcher {
            mode: config.match_mode,
            threshold: config.fuzzy_threshold.clamp(0.0, 1.0),
            max_query_chars: config.max_query_chars.max(1),
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn prepare(&self, query: &str) -> PreparedQuery {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return PreparedQuery::All;
        }
        let truncated: String = trimmed.chars().take(self.max_query_chars).collect();
        let folded = fold(&truncated);
        let chars = folded.chars().collect();
        PreparedQuery::Text { folded, chars }
    }

    /// Whether `record` matches `query`. Folds the record's fields on the fly; use
    /// [Matcher::search] when the same records are matched repeatedly.
    pub fn matches(&self, query: &str, record: &PolicyRecord) -> bool {
        let prepared = self.prepare(query);
        self.score(&prepared, &SearchEntry::new(record)).is_some()
    }

    /// Best score of `entry` against `query`, or `None` when it does not match.
    pub fn score(&self, query: &PreparedQuery, entry: &SearchEntry) -> Option<f32> {
        let (folded, chars) = match query {
            PreparedQuery::All => return Some(0.0),
            PreparedQuery::Text { folded, chars } => (folded, chars),
        };
        if entry.fields().any(|(_, text)| text.contains(folded.as_str())) {
            return Some(0.0);
        }
        if self.mode == MatchMode::Substring {
            return None;
        }

        let budget = self.edit_budget(chars.len());
        if budget == 0 {
            return None;
        }
        entry
            .fields()
            .filter_map(|(_, text)| approximate_distance(chars, text, budget))
            .min()
            .map(|distance| distance as f32 / chars.len() as f32)
    }

    /// Match `candidates` (store positions) against `query`.
    ///
    /// Substring mode keeps candidate order. Fuzzy mode orders by ascending score; the sort is
    /// stable, so equal scores keep candidate order.
    pub fn search<I>(&self, index: &SearchIndex, query: &str, candidates: I) -> Vec<(usize, f32)>
    where
        I: IntoIterator<Item = usize>,
    {
        let prepared = self.prepare(query);
        let mut hits: Vec<(usize, f32)> = candidates
            .into_iter()
            .filter_map(|position| {
                index
                    .get(position)
                    .and_then(|entry| self.score(&prepared, entry))
                    .map(|score| (position, score))
            })
            .collect();
        if self.mode == MatchMode::Fuzzy && !prepared.is_all() {
            hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        }
        hits
    }

    fn edit_budget(&self, query_len: usize) -> usize {
        (query_len as f32 * self.threshold).floor() as usize
    }
}

/// Smallest restricted Damerau-Levenshtein distance between `query` and any substring of `text`,
/// if it is at most `budget`.
///
/// Column-wise Sellers DP: the query runs down the column, the text across. Row zero is all zeros,
/// so a match may start anywhere in the text; taking the minimum of the last row lets it end
/// anywhere.
pub(crate) fn approximate_distance(query: &[char], text: &str, budget: usize) -> Option<usize> {
    let m = query.len();
    if m == 0 {
        return Some(0);
    }

    let mut before_prev: Vec<usize> = (0..=m).collect();
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut current: Vec<usize> = vec![0; m + 1];
    let mut best = m;
    let mut prev_char: Option<char> = None;

    for t in text.chars() {
        current[0] = 0;
        for i in 1..=m {
            let substitution = prev[i - 1] + usize::from(query[i - 1] != t);
            let mut cell = substitution.min(prev[i] + 1).min(current[i - 1] + 1);
            if i > 1 {
                if let Some(p) = prev_char {
                    if query[i - 1] == p && query[i - 2] == t {
                        cell = cell.min(before_prev[i - 2] + 1);
                    }
                }
            }
            current[i] = cell;
        }
        best = best.min(current[m]);
        if best == 0 {
            break;
        }
        std::mem::swap(&mut before_prev, &mut prev);
        std::mem::swap(&mut prev, &mut current);
        prev_char = Some(t);
    }

    (best <= budget).then_some(best)
}
