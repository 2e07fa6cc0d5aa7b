use crate::error::PipelineError;
use crate::llm::{extract_required_tag, format_references, Bindings, TemplateId};
use crate::models::{ReferenceCorpus, StageId};
use crate::stages::StageRunner;

/// Execute the TITLE stage
pub async fn execute_title(
    runner: &StageRunner,
    subject: &str,
    corpus: &ReferenceCorpus,
) -> Result<String, PipelineError> {
    runner
        .run(
            StageId::Title,
            TemplateId::Title,
            &subject_bindings(subject, corpus),
            parse_title,
        )
        .await
}

/// Bindings shared by TITLE and OUTLINE, which see only the subject and corpus
pub fn subject_bindings(subject: &str, corpus: &ReferenceCorpus) -> Bindings {
    Bindings::new()
        .with("subject", subject)
        .with("references", format_references(corpus))
}

/// Parse `<title>` into a single-line title
pub fn parse_title(raw: &str) -> Result<String, PipelineError> {
    let title = extract_required_tag(raw, TemplateId::Title.output_tag())?;
    if title.lines().count() > 1 {
        return Err(PipelineError::validation("title must be a single line"));
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_title() {
        let raw = "Here is a title:\n<title> Graph Learning: A Survey </title>";
        assert_eq!(parse_title(raw).unwrap(), "Graph Learning: A Survey");
    }

    #[test]
    fn test_parse_title_rejects_multiline() {
        let err = parse_title("<title>Part one\nPart two</title>").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_parse_title_missing_tag() {
        let err = parse_title("Graph Learning: A Survey").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedOutput(_)));
    }
}
