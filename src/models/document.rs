use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const INTRODUCTION: &str = "Introduction";
pub const CONCLUSION: &str = "Conclusion";

/// Allowed number of headings between the bookends
pub const MIN_INTERIOR_HEADINGS: usize = 6;
pub const MAX_INTERIOR_HEADINGS: usize = 10;

/// Validated section headings, bookended by Introduction and Conclusion.
///
/// Only constructible through [`Outline::new`], so any `Outline` value holds
/// the structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Outline {
    headings: Vec<String>,
}

impl TryFrom<Vec<String>> for Outline {
    type Error = PipelineError;

    fn try_from(headings: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(headings)
    }
}

impl From<Outline> for Vec<String> {
    fn from(outline: Outline) -> Self {
        outline.headings
    }
}

impl Outline {
    pub fn new(headings: Vec<String>) -> Result<Self, PipelineError> {
        let headings: Vec<String> = headings
            .into_iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        match headings.first() {
            Some(first) if first == INTRODUCTION => {}
            Some(first) => {
                return Err(PipelineError::validation(format!(
                    "outline must start with \"{INTRODUCTION}\", found \"{first}\""
                )));
            }
            None => return Err(PipelineError::validation("outline has no headings")),
        }

        if headings.len() < 2 || headings.last().map(String::as_str) != Some(CONCLUSION) {
            return Err(PipelineError::validation(format!(
                "outline must end with \"{CONCLUSION}\""
            )));
        }

        let interior = headings.len() - 2;
        if !(MIN_INTERIOR_HEADINGS..=MAX_INTERIOR_HEADINGS).contains(&interior) {
            return Err(PipelineError::validation(format!(
                "outline has {interior} headings between the bookends, expected \
                 {MIN_INTERIOR_HEADINGS}-{MAX_INTERIOR_HEADINGS}"
            )));
        }

        let mut seen = HashSet::new();
        for heading in &headings {
            if !seen.insert(heading.to_lowercase()) {
                return Err(PipelineError::validation(format!(
                    "duplicate outline heading \"{heading}\""
                )));
            }
        }

        Ok(Self { headings })
    }

    /// All headings including bookends
    pub fn headings(&self) -> &[String] {
        &self.headings
    }

    /// Headings that get a section body
    pub fn interior(&self) -> &[String] {
        &self.headings[1..self.headings.len() - 1]
    }

    /// One heading per line, as bound into prompts
    pub fn formatted(&self) -> String {
        self.headings.join("\n")
    }
}

/// Why a stage chain stopped, recorded in place of the missing output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: String,
    pub attempts: u32,
    pub reason: String,
}

impl StageFailure {
    pub fn from_error(error: &PipelineError) -> Self {
        Self {
            stage: error
                .stage()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown".to_string()),
            attempts: error.attempts().unwrap_or(0),
            reason: error.root_cause().to_string(),
        }
    }

    pub fn new(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            attempts: 0,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    pub heading: String,
    /// Filled once by the CONTENT stage
    pub content: Option<String>,
}

impl Subsection {
    pub fn pending(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            content: None,
        }
    }

    pub fn is_written(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// One interior outline section, owned by the task chain that builds it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    /// Validated corpus ids, in order of first selection
    pub selected_refs: Vec<u32>,
    pub subsections: Vec<Subsection>,
    /// Set when the chain stopped before every subsection was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
}

impl Section {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            selected_refs: Vec::new(),
            subsections: Vec::new(),
            failure: None,
        }
    }

    pub fn accept_refs(&mut self, ids: Vec<u32>) {
        debug_assert!(self.selected_refs.is_empty(), "section refs accepted twice");
        self.selected_refs = ids;
    }

    pub fn accept_subsection_headings(&mut self, headings: Vec<String>) {
        debug_assert!(self.subsections.is_empty(), "subsections accepted twice");
        self.subsections = headings.into_iter().map(Subsection::pending).collect();
    }

    pub fn accept_content(&mut self, index: usize, content: String) {
        if let Some(subsection) = self.subsections.get_mut(index) {
            debug_assert!(subsection.content.is_none(), "subsection written twice");
            subsection.content = Some(content);
        }
    }

    pub fn mark_incomplete(&mut self, failure: StageFailure) {
        self.failure = Some(failure);
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
            && !self.subsections.is_empty()
            && self.subsections.iter().all(Subsection::is_written)
    }
}

/// Accepted title and outline, shared read-only by every section-level stage
#[derive(Debug, Clone)]
pub struct PaperFrame {
    pub subject: String,
    pub title: String,
    pub outline: Outline,
}

/// The assembled survey draft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub subject: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_failure: Option<StageFailure>,
    pub outline: Outline,
    /// Aligned with `outline.interior()`
    pub sections: Vec<Section>,
}

impl Document {
    pub fn is_complete(&self) -> bool {
        self.abstract_text.is_some() && self.sections.iter().all(Section::is_complete)
    }

    pub fn incomplete_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| !s.is_complete())
    }

    pub fn completed_section_count(&self) -> usize {
        self.sections.iter().filter(|s| s.is_complete()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headings(interior: usize) -> Vec<String> {
        let mut h = vec![INTRODUCTION.to_string()];
        h.extend((1..=interior).map(|i| format!("Topic {i}")));
        h.push(CONCLUSION.to_string());
        h
    }

    #[test]
    fn test_outline_accepts_valid_range() {
        for n in [6, 8, 10] {
            let outline = Outline::new(headings(n)).unwrap();
            assert_eq!(outline.interior().len(), n);
            assert_eq!(outline.headings().len(), n + 2);
        }
    }

    #[test]
    fn test_outline_rejects_too_few_or_many() {
        for n in [3, 5, 11] {
            let err = Outline::new(headings(n)).unwrap_err();
            assert!(matches!(err, PipelineError::Validation(_)), "n = {n}");
        }
    }

    #[test]
    fn test_outline_rejects_missing_bookends() {
        let mut h = headings(6);
        h.remove(0);
        assert!(Outline::new(h).is_err());

        let mut h = headings(6);
        h.pop();
        assert!(Outline::new(h).is_err());

        assert!(Outline::new(vec![]).is_err());
    }

    #[test]
    fn test_outline_rejects_duplicates() {
        let mut h = headings(6);
        h[3] = "topic 1".to_string();
        let err = Outline::new(h).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_section_completion() {
        let mut section = Section::new("Methods");
        assert!(!section.is_complete());

        section.accept_refs(vec![1, 2]);
        section.accept_subsection_headings(vec!["A".to_string(), "B".to_string()]);
        section.accept_content(0, "text a".to_string());
        assert!(!section.is_complete());

        section.accept_content(1, "text b".to_string());
        assert!(section.is_complete());

        section.mark_incomplete(StageFailure::new("content(Methods / B)", "late failure"));
        assert!(!section.is_complete());
    }
}
