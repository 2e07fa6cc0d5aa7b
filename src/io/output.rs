use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Document, ReferenceCorpus};

/// Metadata about the run that produced a draft
#[derive(Debug, Clone, Serialize)]
pub struct DraftMetadata {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub model: String,
    pub sections_total: usize,
    pub sections_complete: usize,
}

impl DraftMetadata {
    pub fn for_document(
        run_id: impl Into<String>,
        model: impl Into<String>,
        doc: &Document,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            generated_at: Utc::now(),
            model: model.into(),
            sections_total: doc.sections.len(),
            sections_complete: doc.completed_section_count(),
        }
    }
}

#[derive(Serialize)]
struct DraftFile<'a> {
    metadata: &'a DraftMetadata,
    document: &'a Document,
}

/// Write the document and its run metadata as pretty JSON
pub fn write_document_json(doc: &Document, metadata: &DraftMetadata, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    let draft = DraftFile {
        metadata,
        document: doc,
    };
    serde_json::to_writer_pretty(file, &draft).context("Failed to write JSON")?;
    Ok(())
}

/// Write the document in the `<Literature>` XML layout
pub fn write_document_xml(doc: &Document, corpus: &ReferenceCorpus, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    write!(file, "{}", render_xml(doc, corpus)).context("Failed to write XML")?;
    Ok(())
}

pub fn render_xml(doc: &Document, corpus: &ReferenceCorpus) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Literature>\n");

    push_element(&mut out, "Title", "", &doc.title);
    push_element(
        &mut out,
        "Abstract",
        "",
        doc.abstract_text.as_deref().unwrap_or_default(),
    );

    for (i, section) in doc.sections.iter().enumerate() {
        let n = i + 1;
        let attrs = if section.is_complete() {
            ""
        } else {
            " incomplete=\"true\""
        };
        push_element(&mut out, &format!("Section_{n}_title"), attrs, &section.heading);

        for (j, subsection) in section.subsections.iter().enumerate() {
            let m = j + 1;
            push_element(
                &mut out,
                &format!("Section_{n}.{m}_title"),
                "",
                &subsection.heading,
            );
            push_element(
                &mut out,
                &format!("Section_{n}.{m}_text"),
                "",
                subsection.content.as_deref().unwrap_or_default(),
            );
        }

        if let Some(failure) = &section.failure {
            let text = format!(
                "{} failed after {} attempt(s): {}",
                failure.stage, failure.attempts, failure.reason
            );
            push_element(&mut out, &format!("Section_{n}_failure"), "", &text);
        }
    }

    let references: Vec<String> = corpus
        .iter()
        .map(|r| match &r.abstract_text {
            Some(abstract_text) => {
                format!("[{}] {}\nAbstract: {}", r.id, r.text, abstract_text)
            }
            None => format!("[{}] {}", r.id, r.text),
        })
        .collect();
    push_element(&mut out, "References", "", &references.join("\n\n"));

    out.push_str("</Literature>\n");
    out
}

fn push_element(out: &mut String, name: &str, attrs: &str, text: &str) {
    out.push_str(&format!("  <{name}{attrs}>{}</{name}>\n", xml_escape(text)));
}

pub fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Outline, ReferenceEntry, Section, StageFailure, Subsection, CONCLUSION, INTRODUCTION,
    };

    fn sample_document() -> Document {
        let mut headings = vec![INTRODUCTION.to_string()];
        headings.extend((1..=6).map(|i| format!("Topic {i}")));
        headings.push(CONCLUSION.to_string());
        let outline = Outline::new(headings).unwrap();

        let sections = outline
            .interior()
            .iter()
            .map(|heading| {
                let mut section = Section::new(heading.clone());
                section.accept_refs(vec![1]);
                section.accept_subsection_headings(vec!["A & B".to_string()]);
                section.accept_content(0, "Text citing [1] <here>.".to_string());
                section
            })
            .collect::<Vec<_>>();

        Document {
            subject: "Graphs".to_string(),
            title: "Graphs: A Survey".to_string(),
            abstract_text: Some("Abstract.".to_string()),
            abstract_failure: None,
            outline,
            sections,
        }
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(xml_escape("plain"), "plain");
    }

    #[test]
    fn test_render_xml_layout() {
        let doc = sample_document();
        let corpus = ReferenceCorpus::from_texts(["Alpha", "Beta"]);

        let xml = render_xml(&doc, &corpus);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Literature>\n"));
        assert!(xml.contains("<Title>Graphs: A Survey</Title>"));
        assert!(xml.contains("<Section_1_title>Topic 1</Section_1_title>"));
        assert!(xml.contains("<Section_6.1_title>A &amp; B</Section_6.1_title>"));
        assert!(
            xml.contains("<Section_2.1_text>Text citing [1] &lt;here&gt;.</Section_2.1_text>")
        );
        assert!(xml.contains("<References>[1] Alpha\n\n[2] Beta</References>"));
        assert!(!xml.contains("incomplete"));
    }

    #[test]
    fn test_render_xml_references_carry_abstracts() {
        let corpus = ReferenceCorpus::new(vec![
            ReferenceEntry::with_abstract("GCN", "Spectral convolutions."),
            ReferenceEntry::new("GAT"),
        ]);

        let xml = render_xml(&sample_document(), &corpus);

        assert!(xml.contains(
            "<References>[1] GCN\nAbstract: Spectral convolutions.\n\n[2] GAT</References>"
        ));
    }

    #[test]
    fn test_render_xml_marks_incomplete_section() {
        let mut doc = sample_document();
        doc.sections[2].subsections.push(Subsection::pending("Unwritten"));
        doc.sections[2]
            .mark_incomplete(StageFailure::new("content(Topic 3 / Unwritten)", "no tag"));

        let xml = render_xml(&doc, &ReferenceCorpus::from_texts(["Alpha"]));

        assert!(xml.contains("<Section_3_title incomplete=\"true\">Topic 3</Section_3_title>"));
        assert!(xml.contains("<Section_3.2_text></Section_3.2_text>"));
        assert!(xml.contains("<Section_3_failure>content(Topic 3 / Unwritten) failed"));
    }

    #[test]
    fn test_write_document_json_includes_metadata() {
        let doc = sample_document();
        let metadata = DraftMetadata::for_document("run-1", "test-model", &doc);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");

        write_document_json(&doc, &metadata, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["metadata"]["run_id"], "run-1");
        assert_eq!(value["metadata"]["sections_complete"], 6);
        assert_eq!(value["document"]["abstract"], "Abstract.");
        assert_eq!(value["document"]["outline"][0], "Introduction");
    }
}
