use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::models::{ReferenceCorpus, ReferenceEntry};

/// Everything a drafting run needs besides the model
#[derive(Debug, Clone)]
pub struct SurveyInput {
    pub subject: String,
    pub corpus: ReferenceCorpus,
}

/// Load a survey input file. `.json` files are read as dataset records,
/// anything else as a `Subjects:` / `References:` text record.
pub fn load_survey_input(path: &Path) -> Result<SurveyInput> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        parse_dataset_json(&content)
    } else {
        parse_text_record(&content)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubjectField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReferenceField {
    Plain(String),
    Titled { reference_title: String },
}

#[derive(Debug, Deserialize)]
struct ReferenceContent {
    reference_num: String,
    #[serde(default)]
    reference_abstract: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatasetRecord {
    subject: SubjectField,
    #[serde(default)]
    reference: Vec<ReferenceField>,
    #[serde(default)]
    reference_content: Vec<ReferenceContent>,
}

/// Parse a dataset JSON record; abstracts are matched to references by `[n]`.
pub fn parse_dataset_json(json: &str) -> Result<SurveyInput> {
    let record: DatasetRecord =
        serde_json::from_str(json).context("Failed to parse survey dataset JSON")?;

    let subjects = match record.subject {
        SubjectField::One(s) => vec![s],
        SubjectField::Many(list) => list,
    };

    let abstracts: HashMap<String, String> = record
        .reference_content
        .into_iter()
        .filter_map(|c| Some((c.reference_num.trim().to_string(), c.reference_abstract?)))
        .collect();

    let entries = record
        .reference
        .into_iter()
        .enumerate()
        .map(|(i, field)| {
            let text = match field {
                ReferenceField::Plain(text) => text,
                ReferenceField::Titled { reference_title } => reference_title,
            };
            ReferenceEntry {
                text,
                abstract_text: abstracts.get(&format!("[{}]", i + 1)).cloned(),
            }
        })
        .collect();

    finish(&subjects, entries)
}

#[derive(Clone, Copy, PartialEq)]
enum Block {
    None,
    Subjects,
    References,
}

/// Parse the text record layout:
///
/// ```text
/// Subjects:
/// Graph neural networks
///
/// References:
/// Number: [1]
/// Title: Semi-supervised classification with GCNs
/// Abstract: ...
/// ```
pub fn parse_text_record(content: &str) -> Result<SurveyInput> {
    let mut block = Block::None;
    let mut subjects: Vec<String> = Vec::new();
    let mut entries: Vec<ReferenceEntry> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "Subjects:" => block = Block::Subjects,
            "References:" => block = Block::References,
            _ if block == Block::Subjects => subjects.push(line.to_string()),
            _ if block == Block::References => {
                if let Some(title) = line.strip_prefix("Title:") {
                    entries.push(ReferenceEntry::new(title.trim()));
                } else if let Some(abstract_text) = line.strip_prefix("Abstract:") {
                    if let Some(last) = entries.last_mut() {
                        last.abstract_text = Some(abstract_text.trim().to_string());
                    }
                }
            }
            _ => {}
        }
    }

    finish(&subjects, entries)
}

/// Several subjects are kept together, joined by "; ", in either format
fn finish(subjects: &[String], entries: Vec<ReferenceEntry>) -> Result<SurveyInput> {
    let subject = subjects
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    if subject.is_empty() {
        bail!("Survey input has no subject");
    }
    if entries.is_empty() {
        bail!("Survey input has no references");
    }

    Ok(SurveyInput {
        subject,
        corpus: ReferenceCorpus::new(entries),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dataset_json() {
        let json = r#"{
            "subject": ["Graph neural networks"],
            "reference": [
                "Semi-supervised classification with GCNs",
                {"reference_title": "Graph attention networks"}
            ],
            "reference_content": [
                {"reference_num": "[2]", "reference_abstract": "Attention over neighbours."}
            ]
        }"#;

        let input = parse_dataset_json(json).unwrap();

        assert_eq!(input.subject, "Graph neural networks");
        assert_eq!(input.corpus.size(), 2);
        let second = input.corpus.get(2).unwrap();
        assert_eq!(second.text, "Graph attention networks");
        assert_eq!(second.abstract_text.as_deref(), Some("Attention over neighbours."));
        assert!(input.corpus.get(1).unwrap().abstract_text.is_none());
    }

    #[test]
    fn test_parse_text_record() {
        let text = "Subjects:\nGraph neural networks\n\nReferences:\n\
                    Number: [1]\nTitle: GCN\nAbstract: Convolutions.\n\n\
                    Number: [2]\nTitle: GAT\nAbstract:\n";

        let input = parse_text_record(text).unwrap();

        assert_eq!(input.subject, "Graph neural networks");
        assert_eq!(input.corpus.size(), 2);
        assert_eq!(
            input.corpus.get(1).unwrap().abstract_text.as_deref(),
            Some("Convolutions.")
        );
        assert!(input.corpus.get(2).unwrap().abstract_text.is_none());
    }

    #[test]
    fn test_several_subjects_agree_across_formats() {
        let json = r#"{"subject": ["Graphs", "", "Learning"], "reference": ["GCN"]}"#;
        let text = "Subjects:\nGraphs\n\nLearning\nReferences:\nTitle: GCN\n";

        let from_json = parse_dataset_json(json).unwrap();
        let from_text = parse_text_record(text).unwrap();

        assert_eq!(from_json.subject, "Graphs; Learning");
        assert_eq!(from_text.subject, from_json.subject);
    }

    #[test]
    fn test_missing_subject_or_references() {
        assert!(parse_text_record("References:\nTitle: GCN\n").is_err());
        assert!(parse_text_record("Subjects:\nGraphs\n").is_err());
        assert!(parse_dataset_json(r#"{"subject": "Graphs", "reference": []}"#).is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("input.json");
        std::fs::write(&json_path, r#"{"subject": "Graphs", "reference": ["GCN"]}"#).unwrap();
        assert_eq!(load_survey_input(&json_path).unwrap().corpus.size(), 1);

        let txt_path = dir.path().join("input.txt");
        std::fs::write(&txt_path, "Subjects:\nGraphs\nReferences:\nTitle: GCN\nTitle: GAT\n")
            .unwrap();
        assert_eq!(load_survey_input(&txt_path).unwrap().corpus.size(), 2);
    }
}
