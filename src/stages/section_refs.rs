use tracing::{info, warn};

use crate::error::PipelineError;
use crate::llm::{
    extract_bullet_lines, extract_required_tag, format_references, resolve_ids, Bindings,
    ResolvedRefs, TemplateId,
};
use crate::models::{PaperFrame, ReferenceCorpus, StageId};
use crate::stages::StageRunner;

/// Execute SECTION_REFS(h): pick the corpus entries one section will discuss
pub async fn execute_section_refs(
    runner: &StageRunner,
    frame: &PaperFrame,
    corpus: &ReferenceCorpus,
    section: &str,
) -> Result<Vec<u32>, PipelineError> {
    let bindings = Bindings::new()
        .with("subject", frame.subject.as_str())
        .with("title", frame.title.as_str())
        .with("outline", frame.outline.formatted())
        .with("section", section)
        .with("references", format_references(corpus));

    let corpus_size = corpus.size();
    let resolved = runner
        .run(
            StageId::section_refs(section),
            TemplateId::ReferenceSelection,
            &bindings,
            move |raw: &str| parse_section_refs(raw, corpus_size),
        )
        .await?;

    if resolved.discarded > 0 {
        warn!(
            "Section {:?}: discarded {} invalid reference lines",
            section, resolved.discarded
        );
    }
    info!(
        "Section {:?}: selected {} references",
        section,
        resolved.ids.len()
    );

    Ok(resolved.ids)
}

pub fn parse_section_refs(raw: &str, corpus_size: usize) -> Result<ResolvedRefs, PipelineError> {
    let inner = extract_required_tag(raw, TemplateId::ReferenceSelection.output_tag())?;
    let lines = extract_bullet_lines(inner)?;
    resolve_ids(&lines, corpus_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_section_refs() {
        let resolved = parse_section_refs("<refs>\n* [1] A\n* [3] B\n</refs>", 5).unwrap();
        assert_eq!(resolved.ids, vec![1, 3]);
    }

    #[test]
    fn test_parse_section_refs_all_out_of_range() {
        let err = parse_section_refs("<refs>\n* [6] A\n* [7] B\n</refs>", 5).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_parse_section_refs_unterminated() {
        let err = parse_section_refs("<refs>\n* [1] A\n", 5).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedOutput(_)));
    }
}
