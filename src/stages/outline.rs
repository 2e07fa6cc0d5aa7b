use crate::error::PipelineError;
use crate::llm::{extract_plain_lines, extract_required_tag, TemplateId};
use crate::models::{Outline, ReferenceCorpus, StageId};
use crate::stages::{subject_bindings, StageRunner};

/// Execute the OUTLINE stage
///
/// Invariant violations (bookends, heading count, duplicates) come back as
/// validation errors, so the model is asked again with a hint.
pub async fn execute_outline(
    runner: &StageRunner,
    subject: &str,
    corpus: &ReferenceCorpus,
) -> Result<Outline, PipelineError> {
    runner
        .run(
            StageId::Outline,
            TemplateId::Outline,
            &subject_bindings(subject, corpus),
            parse_outline,
        )
        .await
}

pub fn parse_outline(raw: &str) -> Result<Outline, PipelineError> {
    let inner = extract_required_tag(raw, TemplateId::Outline.output_tag())?;
    Outline::new(extract_plain_lines(inner))
}
