use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::{Serialize, Serializer};

use crate::{
    embedding::{Embedder, dot},
    error::{Error, Result},
    index::Index,
};

pub const DEFAULT_LIMIT: usize = 100;

/// A search request. Empty strings count as "not set" everywhere.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    /// Category -> value that must occur (case-insensitively) in the
    /// record's value for that category.
    pub category_filters: BTreeMap<String, String>,
    /// Exact record type tag, e.g. `table` or `shapefile`.
    pub file_type: Option<String>,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub limit: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            text: String::new(),
            category_filters: BTreeMap::new(),
            file_type: None,
            include: None,
            exclude: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_semantic(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_score"
    )]
    pub score: Option<f32>,
    /// Non-empty category values only.
    #[serde(flatten)]
    pub categories: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub total_matches: usize,
    pub showing: usize,
    pub results: Vec<ResultRow>,
}

/// Round to four decimals at the rendering boundary only.
pub fn round_score(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 10_000.0
}

fn serialize_score<S: Serializer>(
    score: &Option<f32>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match score {
        Some(s) => serializer.serialize_f64(round_score(*s)),
        None => serializer.serialize_none(),
    }
}

fn compile_pattern(
    pattern: Option<&str>,
    which: &'static str,
) -> Result<Option<Regex>> {
    match pattern.filter(|p| !p.is_empty()) {
        Some(p) => RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .map(Some)
            .map_err(|source| Error::Pattern { which, source }),
        None => Ok(None),
    }
}

/// Run `query` against `index`.
///
/// Filters are ANDed: category substrings, exact file type, then the
/// include and exclude patterns (tested against searchable text or path).
/// Survivors are ranked by similarity to the query text when there is one,
/// otherwise alphabetically by name. Both orders are stable.
pub fn execute_search(
    query: &Query,
    index: &Index,
    embedder: &dyn Embedder,
) -> Result<SearchOutcome> {
    let include = compile_pattern(query.include.as_deref(), "Include")?;
    let exclude = compile_pattern(query.exclude.as_deref(), "Exclude")?;

    let category_filters: Vec<(&str, String)> = query
        .category_filters
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name.as_str(), value.to_lowercase()))
        .collect();
    let file_type = query.file_type.as_deref().filter(|t| !t.is_empty());

    let candidates: Vec<usize> = (0..index.len())
        .filter(|&idx| {
            let record = index.record(idx);
            let text = index.searchable_text(idx);
            let pattern_hit =
                |re: &Regex| re.is_match(text) || re.is_match(&record.path);

            category_filters.iter().all(|(name, needle)| {
                record.category(name).to_lowercase().contains(needle.as_str())
            }) && file_type.is_none_or(|t| record.type_tag() == t)
                && include.as_ref().is_none_or(pattern_hit)
                && !exclude.as_ref().is_some_and(pattern_hit)
        })
        .collect();

    let ranked: Vec<(usize, Option<f32>)> = if query.is_semantic() {
        let query_vec = embedder.embed(&query.text)?;
        let dimension = index.embeddings().dimension();
        if query_vec.len() != dimension {
            return Err(Error::Embedding(format!(
                "query embedding has dimension {}, index has {dimension}",
                query_vec.len()
            )));
        }
        let mut scored: Vec<(usize, f32)> = candidates
            .into_iter()
            .map(|idx| (idx, dot(index.embeddings().row(idx), &query_vec)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().map(|(idx, s)| (idx, Some(s))).collect()
    } else {
        let mut sorted = candidates;
        sorted.sort_by_cached_key(|&idx| index.record(idx).name.to_lowercase());
        sorted.into_iter().map(|idx| (idx, None)).collect()
    };

    let total_matches = ranked.len();
    let results: Vec<ResultRow> = ranked
        .into_iter()
        .take(query.limit)
        .map(|(idx, score)| {
            let record = index.record(idx);
            ResultRow {
                file_name: record.name.clone(),
                file_path: record.path.clone(),
                file_type: record.type_tag().to_string(),
                score,
                categories: index
                    .categories()
                    .iter()
                    .filter(|c| !record.category(c).is_empty())
                    .map(|c| (c.clone(), record.category(c).to_string()))
                    .collect(),
            }
        })
        .collect();

    Ok(SearchOutcome {
        total_matches,
        showing: results.len(),
        results,
    })
}

/// Format results for human-readable terminal output.
pub fn format_human(outcome: &SearchOutcome) {
    if outcome.results.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, r) in outcome.results.iter().enumerate() {
        match r.score {
            Some(score) => println!(
                "{:>3}. [{:.4}] {} ({})",
                i + 1,
                round_score(score),
                r.file_name,
                r.file_type
            ),
            None => println!("{:>3}. {} ({})", i + 1, r.file_name, r.file_type),
        }
        println!("     {}", r.file_path);
        for (category, value) in &r.categories {
            println!("     {category}: {value}");
        }
    }
    println!(
        "\nshowing {} of {} match(es)",
        outcome.showing, outcome.total_matches
    );
}

/// Format results as JSON output, the same shape `/api/search` returns.
pub fn format_json(outcome: &SearchOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}
