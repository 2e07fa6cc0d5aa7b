use crate::error::PipelineError;
use crate::llm::{
    check_subsection_headings, extract_bullet_lines, extract_required_tag, format_selected_refs,
    Bindings, TemplateId,
};
use crate::models::{PaperFrame, ReferenceCorpus, StageId};
use crate::stages::StageRunner;

/// Execute SUBSECTION_HEADINGS(h)
pub async fn execute_subsection_headings(
    runner: &StageRunner,
    frame: &PaperFrame,
    corpus: &ReferenceCorpus,
    section: &str,
    selected_refs: &[u32],
) -> Result<Vec<String>, PipelineError> {
    let bindings = Bindings::new()
        .with("subject", frame.subject.as_str())
        .with("title", frame.title.as_str())
        .with("outline", frame.outline.formatted())
        .with("section", section)
        .with("section_refs", format_selected_refs(corpus, selected_refs));

    runner
        .run(
            StageId::subsection_headings(section),
            TemplateId::SubsectionHeadings,
            &bindings,
            |raw: &str| parse_subsection_headings(raw, section),
        )
        .await
}

pub fn parse_subsection_headings(raw: &str, section: &str) -> Result<Vec<String>, PipelineError> {
    let inner = extract_required_tag(raw, TemplateId::SubsectionHeadings.output_tag())?;
    check_subsection_headings(section, extract_bullet_lines(inner)?)
}
