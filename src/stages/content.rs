use tracing::warn;

use crate::error::PipelineError;
use crate::llm::{
    cited_ids, citations_outside, extract_required_tag, format_selected_refs, Bindings, TemplateId,
};
use crate::models::{PaperFrame, ReferenceCorpus, StageId};
use crate::stages::StageRunner;

/// Execute CONTENT(h, s): the prose of one subsection
pub async fn execute_content(
    runner: &StageRunner,
    frame: &PaperFrame,
    corpus: &ReferenceCorpus,
    section: &str,
    subsection: &str,
    selected_refs: &[u32],
) -> Result<String, PipelineError> {
    let bindings = Bindings::new()
        .with("subject", frame.subject.as_str())
        .with("title", frame.title.as_str())
        .with("outline", frame.outline.formatted())
        .with("subsec_heading", subsection)
        .with("section_heading", section)
        .with("section_refs", format_selected_refs(corpus, selected_refs));

    let content = runner
        .run(
            StageId::content(section, subsection),
            TemplateId::Content,
            &bindings,
            parse_content,
        )
        .await?;

    if cited_ids(&content).is_empty() {
        warn!("Subsection {:?}: no citations", subsection);
    } else {
        let stray = citations_outside(&content, selected_refs);
        if !stray.is_empty() {
            warn!(
                "Subsection {:?}: cites {:?} outside the section's references",
                subsection, stray
            );
        }
    }

    Ok(content)
}

pub fn parse_content(raw: &str) -> Result<String, PipelineError> {
    extract_required_tag(raw, TemplateId::Content.output_tag()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_keeps_paragraphs() {
        let raw = "<content>\nFirst [1].\n\nSecond [2].\n</content>";
        assert_eq!(parse_content(raw).unwrap(), "First [1].\n\nSecond [2].");
    }

    #[test]
    fn test_parse_content_empty() {
        assert!(matches!(
            parse_content("<content>\n</content>"),
            Err(PipelineError::MalformedOutput(_))
        ));
    }
}
