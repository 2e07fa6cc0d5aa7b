use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one pipeline stage, carried by every stage-level error
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageId {
    Title,
    Outline,
    Abstract,
    SectionRefs { section: String },
    SubsectionHeadings { section: String },
    Content { section: String, subsection: String },
}

impl StageId {
    pub fn section_refs(section: &str) -> Self {
        Self::SectionRefs {
            section: section.to_string(),
        }
    }

    pub fn subsection_headings(section: &str) -> Self {
        Self::SubsectionHeadings {
            section: section.to_string(),
        }
    }

    pub fn content(section: &str, subsection: &str) -> Self {
        Self::Content {
            section: section.to_string(),
            subsection: subsection.to_string(),
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Title => write!(f, "title"),
            Self::Outline => write!(f, "outline"),
            Self::Abstract => write!(f, "abstract"),
            Self::SectionRefs { section } => write!(f, "section_refs({section})"),
            Self::SubsectionHeadings { section } => write!(f, "subsection_headings({section})"),
            Self::Content {
                section,
                subsection,
            } => write!(f, "content({section} / {subsection})"),
        }
    }
}
