//! Category term matching.
//!
//! Every configured term compiles to `\b<escaped term>s?\b`, matched
//! case-insensitively. All terms of all categories live in one
//! [`RegexSet`], so a text is scanned once no matter how many terms are
//! configured; the hit list is then partitioned back into categories.

use std::collections::BTreeSet;

use regex::{RegexSet, RegexSetBuilder};

use crate::{
    config::Category,
    error::{Error, Result},
};

const SET_SIZE_LIMIT: usize = 64 * (1 << 20);

/// Build the whole-word, plural-tolerant pattern for a single term.
pub fn term_pattern(term: &str) -> String {
    format!(r"\b{}s?\b", regex::escape(term))
}

/// Compiled category vocabulary. Cheap to share across threads.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    categories: Vec<String>,
    set: RegexSet,
    /// Pattern index -> (category index, configured term spelling).
    owners: Vec<(usize, String)>,
}

impl TermMatcher {
    pub fn new(categories: &[Category]) -> Result<Self> {
        let mut patterns = Vec::new();
        let mut owners = Vec::new();

        for (idx, category) in categories.iter().enumerate() {
            for term in &category.terms {
                if term.trim().is_empty() {
                    continue;
                }
                patterns.push(term_pattern(term));
                owners.push((idx, term.clone()));
            }
        }

        let set = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .size_limit(SET_SIZE_LIMIT)
            .build()
            .map_err(|e| {
                Error::Config(format!("cannot compile category terms: {e}"))
            })?;

        Ok(Self {
            categories: categories.iter().map(|c| c.name.clone()).collect(),
            set,
            owners,
        })
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn term_count(&self) -> usize {
        self.owners.len()
    }

    /// Which terms of every category occur in `text`, indexed like
    /// [`TermMatcher::categories`].
    pub fn match_all(&self, text: &str) -> CategoryMatches {
        let mut found = vec![BTreeSet::new(); self.categories.len()];
        if text.is_empty() {
            return CategoryMatches(found);
        }
        for pattern_idx in self.set.matches(text).iter() {
            let (category_idx, term) = &self.owners[pattern_idx];
            found[*category_idx].insert(term.clone());
        }
        CategoryMatches(found)
    }

    /// Which terms of `category` occur in `text`. Unknown categories match
    /// nothing.
    pub fn match_category(&self, category: &str, text: &str) -> BTreeSet<String> {
        let Some(wanted) = self.categories.iter().position(|c| c == category)
        else {
            return BTreeSet::new();
        };
        if text.is_empty() {
            return BTreeSet::new();
        }
        self.set
            .matches(text)
            .iter()
            .filter_map(|pattern_idx| {
                let (category_idx, term) = &self.owners[pattern_idx];
                (*category_idx == wanted).then(|| term.clone())
            })
            .collect()
    }
}

/// Per-category sets of matched terms, in configured category order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategoryMatches(Vec<BTreeSet<String>>);

impl CategoryMatches {
    pub fn empty(len: usize) -> Self {
        Self(vec![BTreeSet::new(); len])
    }

    pub fn get(&self, idx: usize) -> Option<&BTreeSet<String>> {
        self.0.get(idx)
    }

    pub fn union_with(&mut self, other: &CategoryMatches) {
        for (mine, theirs) in self.0.iter_mut().zip(&other.0) {
            mine.extend(theirs.iter().cloned());
        }
    }

    /// Sorted, de-duplicated, comma-joined terms per category; empty string
    /// when nothing matched.
    pub fn joined(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|terms| {
                terms.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
            })
            .collect()
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|terms| !terms.is_empty())
    }
}
