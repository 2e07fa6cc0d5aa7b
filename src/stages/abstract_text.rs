use tracing::warn;

use crate::error::PipelineError;
use crate::llm::{extract_required_tag, word_count, Bindings, TemplateId, ABSTRACT_WORD_RANGE};
use crate::models::{PaperFrame, StageId};
use crate::stages::StageRunner;

/// Execute the ABSTRACT stage. Depends only on the title and outline.
pub async fn execute_abstract(
    runner: &StageRunner,
    frame: &PaperFrame,
) -> Result<String, PipelineError> {
    let bindings = Bindings::new()
        .with("subject", frame.subject.as_str())
        .with("title", frame.title.as_str())
        .with("outline", frame.outline.formatted());

    let text = runner
        .run(
            StageId::Abstract,
            TemplateId::Abstract,
            &bindings,
            parse_abstract,
        )
        .await?;

    let words = word_count(&text);
    if !ABSTRACT_WORD_RANGE.contains(&words) {
        warn!(
            "Abstract has {} words (expected {}-{})",
            words,
            ABSTRACT_WORD_RANGE.start(),
            ABSTRACT_WORD_RANGE.end()
        );
    }

    Ok(text)
}

pub fn parse_abstract(raw: &str) -> Result<String, PipelineError> {
    extract_required_tag(raw, TemplateId::Abstract.output_tag()).map(str::to_string)
}
