use serde::{Deserialize, Serialize};

/// One bibliographic entry with its corpus-assigned id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// 1-based, stable for the lifetime of the corpus
    pub id: u32,
    /// Reference text as supplied (usually the cited work's title)
    pub text: String,
    /// Optional abstract of the cited work
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
}

/// Immutable, ordered collection of references.
///
/// Ids are assigned at construction from position (first entry is `[1]`), so
/// they are unique and contiguous over `1..=len`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceCorpus {
    references: Vec<Reference>,
}

/// Input entry for building a corpus
#[derive(Debug, Clone, Default)]
pub struct ReferenceEntry {
    pub text: String,
    pub abstract_text: Option<String>,
}

impl ReferenceEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            abstract_text: None,
        }
    }

    pub fn with_abstract(text: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            abstract_text: Some(abstract_text.into()),
        }
    }
}

impl ReferenceCorpus {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        let references = entries
            .into_iter()
            .zip(1u32..)
            .map(|(entry, id)| Reference {
                id,
                text: entry.text.trim().to_string(),
                abstract_text: entry
                    .abstract_text
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty()),
            })
            .collect();

        Self { references }
    }

    /// Build from plain reference texts
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(ReferenceEntry::new).collect())
    }

    pub fn size(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Reference> {
        if id == 0 {
            return None;
        }
        self.references.get(id as usize - 1)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter()
    }
}
