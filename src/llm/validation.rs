use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::PipelineError;

/// Expected number of subsections per section; outside this range only warns
pub const SUBSECTION_RANGE: std::ops::RangeInclusive<usize> = 3..=5;

/// Expected abstract length in words; outside this range only warns
pub const ABSTRACT_WORD_RANGE: std::ops::RangeInclusive<usize> = 200..=500;

static LEADING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\s*(\d+)\s*\]").expect("leading id pattern is valid"));

static CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("citation pattern is valid"));

/// Outcome of resolving a reference selection against the corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRefs {
    /// Valid ids, deduplicated, in order of first appearance
    pub ids: Vec<u32>,
    /// Lines dropped for lacking a leading `[n]` or naming an id outside the corpus
    pub discarded: usize,
}

/// Resolve the leading `[n]` of each bullet line against a corpus of `corpus_size` entries.
///
/// Bad lines are dropped one by one; only an empty result fails.
pub fn resolve_ids(lines: &[String], corpus_size: usize) -> Result<ResolvedRefs, PipelineError> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut discarded = 0;

    for line in lines {
        let id = LEADING_ID
            .captures(line.trim_start())
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|&id| id >= 1 && (id as usize) <= corpus_size);

        match id {
            Some(id) => {
                if seen.insert(id) {
                    ids.push(id);
                }
            }
            None => {
                debug!("Discarding reference line {:?}", line);
                discarded += 1;
            }
        }
    }

    if ids.is_empty() {
        return Err(PipelineError::validation(format!(
            "no valid reference ids in range [1, {corpus_size}] ({discarded} lines discarded)"
        )));
    }

    Ok(ResolvedRefs { ids, discarded })
}

/// Subsection headings must be non-empty and distinct; an unusual count only warns.
pub fn check_subsection_headings(
    section: &str,
    headings: Vec<String>,
) -> Result<Vec<String>, PipelineError> {
    if headings.is_empty() {
        return Err(PipelineError::validation("no subsection headings"));
    }

    let mut seen = HashSet::new();
    for heading in &headings {
        if !seen.insert(heading.to_lowercase()) {
            return Err(PipelineError::validation(format!(
                "duplicate subsection heading \"{heading}\""
            )));
        }
    }

    if !SUBSECTION_RANGE.contains(&headings.len()) {
        warn!(
            "Section {:?}: {} subsections (expected {}-{})",
            section,
            headings.len(),
            SUBSECTION_RANGE.start(),
            SUBSECTION_RANGE.end()
        );
    }

    Ok(headings)
}

/// Bracketed citations in prose, deduplicated, in order of appearance
pub fn cited_ids(text: &str) -> Vec<u32> {
    let mut seen = HashSet::new();
    CITATION
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Citations in `text` that are not among `selected`
pub fn citations_outside(text: &str, selected: &[u32]) -> Vec<u32> {
    cited_ids(text)
        .into_iter()
        .filter(|id| !selected.contains(id))
        .collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
