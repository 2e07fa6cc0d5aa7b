use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::ReferenceCorpus;

/// System prompt sent with every stage request
pub const SYSTEM_PROMPT: &str = r#"You are an experienced academic author drafting a survey paper from a fixed list of references.

Rules:
1. Cite references only by their bracketed numbers from the provided list, e.g. [3].
2. Never invent references that are not in the list.
3. Always wrap your answer in the exact tags requested by the prompt.
4. Output nothing outside the requested tags."#;

const TITLE_TEMPLATE: &str = r#"Based on the following subject and references, propose a concise, informative title for a comprehensive survey paper.

Subject: {subject}

References:
{references}

Requirements:
1. The title must be a single line
2. It should reflect the scope covered by the references
3. Do not cite reference numbers in the title

Format your response as follows:
<title>Your Title Here</title>"#;

const OUTLINE_TEMPLATE: &str = r#"Based on the following subject and references, generate a clear and logical outline of first-level section headings for a comprehensive survey paper.

Subject: {subject}

References:
{references}

Requirements:
1. Generate 6-10 first-level section headings
2. Don't include Introduction and Conclusion in the count
3. Each heading should be concise and academically appropriate
4. Focus on organizing topics logically and coherently
5. Ensure comprehensive coverage of the research area
6. Don't use bullet points or numbers

Format your response as follows:
<outline>
Introduction
[Your 6-10 section headings here, one per line]
Conclusion
</outline>"#;

const ABSTRACT_TEMPLATE: &str = r#"Write the abstract of a survey paper.

Subject: {subject}
Title: {title}

Outline:
{outline}

Requirements:
1. A single paragraph of 200-500 words
2. Summarize the scope, the organization of the survey and its main insights
3. Do not include headings

Format your response as follows:
<abstract>Your abstract here</abstract>"#;

const REFERENCE_SELECTION_TEMPLATE: &str = r#"You are selecting the references to discuss in one section of a survey paper.

Subject: {subject}
Title: {title}

Outline:
{outline}

Section: {section}

Available references:
{references}

Requirements:
1. Select the references relevant to this section only
2. Keep each reference's original number in square brackets
3. Put one reference per line, starting with '*'

Format your response as follows:
<refs>
* [n] reference text
* [m] reference text
</refs>"#;

const SUBSECTION_TEMPLATE: &str = r#"You are organizing one section of a survey paper into subsections.

Subject: {subject}
Title: {title}

Outline:
{outline}

Section: {section}

References selected for this section:
{section_refs}

Requirements:
1. Propose 3-5 subsection headings
2. Each heading must be distinct and grounded in the selected references
3. Put one heading per line, starting with '* '

Format your response as follows:
<subsections>
* First subsection heading
* Second subsection heading
* Third subsection heading
</subsections>"#;

const CONTENT_TEMPLATE: &str = r#"You are writing one subsection of a survey paper.

Subject: {subject}
Title: {title}

Outline:
{outline}

Section: {section_heading}
Subsection: {subsec_heading}

References selected for this section:
{section_refs}

Requirements:
1. Write at least 3 paragraphs in an academic style
2. Cite the selected references by number, e.g. [3]
3. Don't include any headings

Format your response as follows:
<content>
Your paragraphs here
</content>"#;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

/// Prompt templates, one per model-facing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateId {
    Title,
    Outline,
    Abstract,
    ReferenceSelection,
    SubsectionHeadings,
    Content,
}

impl TemplateId {
    pub const ALL: [TemplateId; 6] = [
        TemplateId::Title,
        TemplateId::Outline,
        TemplateId::Abstract,
        TemplateId::ReferenceSelection,
        TemplateId::SubsectionHeadings,
        TemplateId::Content,
    ];

    /// Tag the model must wrap its answer in
    pub fn output_tag(self) -> &'static str {
        match self {
            TemplateId::Title => "title",
            TemplateId::Outline => "outline",
            TemplateId::Abstract => "abstract",
            TemplateId::ReferenceSelection => "refs",
            TemplateId::SubsectionHeadings => "subsections",
            TemplateId::Content => "content",
        }
    }

    fn builtin(self) -> &'static str {
        match self {
            TemplateId::Title => TITLE_TEMPLATE,
            TemplateId::Outline => OUTLINE_TEMPLATE,
            TemplateId::Abstract => ABSTRACT_TEMPLATE,
            TemplateId::ReferenceSelection => REFERENCE_SELECTION_TEMPLATE,
            TemplateId::SubsectionHeadings => SUBSECTION_TEMPLATE,
            TemplateId::Content => CONTENT_TEMPLATE,
        }
    }

    /// Stage-specific reminder appended to a retry prompt
    pub fn correction(self) -> &'static str {
        match self {
            TemplateId::Title => {
                "Please wrap your title in <title> tags, on a single line. \
                 For example: <title>Your Title Here</title>"
            }
            TemplateId::Outline => {
                "Please provide between 6 and 10 sections (excluding Introduction and Conclusion), \
                 one per line, starting with Introduction and ending with Conclusion, \
                 wrapped in <outline> tags."
            }
            TemplateId::Abstract => {
                "Please wrap the abstract in <abstract> tags and write it as a single paragraph."
            }
            TemplateId::ReferenceSelection => {
                "Please wrap the references in <refs> tags. Each reference must be on its own line, \
                 start with '*' and keep its original number in square brackets."
            }
            TemplateId::SubsectionHeadings => {
                "Please wrap 3-5 distinct subsection headings in <subsections> tags, \
                 one per line, each starting with '* '."
            }
            TemplateId::Content => {
                "Please wrap the content in <content> tags, write at least 3 paragraphs \
                 and cite references as [n]. Don't include any headings."
            }
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateId::Title => "title",
            TemplateId::Outline => "outline",
            TemplateId::Abstract => "abstract",
            TemplateId::ReferenceSelection => "reference_selection",
            TemplateId::SubsectionHeadings => "subsection_headings",
            TemplateId::Content => "content",
        };
        f.write_str(name)
    }
}

/// Named values substituted into a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Template overrides as stored on disk
#[derive(Debug, Default, Deserialize)]
struct PromptFile {
    title_prompt: Option<String>,
    outline_prompt: Option<String>,
    abstract_prompt: Option<String>,
    reference_selection_prompt: Option<String>,
    subsection_prompt: Option<String>,
    content_prompt: Option<String>,
}

/// The full set of templates used by a run
#[derive(Debug, Clone)]
pub struct PromptSet {
    templates: BTreeMap<TemplateId, String>,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            templates: TemplateId::ALL
                .iter()
                .map(|&id| (id, id.builtin().to_string()))
                .collect(),
        }
    }
}

impl PromptSet {
    /// Load overrides from a YAML file; keys that are absent keep the built-in template.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file: {:?}", path))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: PromptFile =
            serde_yaml::from_str(yaml).context("Failed to parse prompt YAML")?;

        let mut set = Self::default();
        let overrides = [
            (TemplateId::Title, file.title_prompt),
            (TemplateId::Outline, file.outline_prompt),
            (TemplateId::Abstract, file.abstract_prompt),
            (TemplateId::ReferenceSelection, file.reference_selection_prompt),
            (TemplateId::SubsectionHeadings, file.subsection_prompt),
            (TemplateId::Content, file.content_prompt),
        ];
        for (id, text) in overrides {
            if let Some(text) = text {
                set.templates.insert(id, text);
            }
        }
        Ok(set)
    }

    pub fn template(&self, id: TemplateId) -> &str {
        self.templates
            .get(&id)
            .map(String::as_str)
            .unwrap_or_else(|| id.builtin())
    }

    /// Render a template. Deterministic: the same inputs always give the same text.
    pub fn render(&self, id: TemplateId, bindings: &Bindings) -> Result<String, PipelineError> {
        render_template(id, self.template(id), bindings)
    }
}

/// Substitute every `{name}` placeholder; all other text is kept byte for byte.
pub fn render_template(
    id: TemplateId,
    template: &str,
    bindings: &Bindings,
) -> Result<String, PipelineError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = bindings
            .get(name.as_str())
            .ok_or_else(|| PipelineError::Config {
                template: id,
                placeholder: name.as_str().to_string(),
            })?;
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(value);
        last = whole.end();
    }
    rendered.push_str(&template[last..]);

    Ok(rendered)
}

/// Full corpus as a bracketed list, with abstracts when the corpus has them
pub fn format_references(corpus: &ReferenceCorpus) -> String {
    corpus
        .iter()
        .map(|r| match &r.abstract_text {
            Some(abstract_text) => {
                format!("[{}] {}\n    Abstract: {}", r.id, r.text, abstract_text)
            }
            None => format!("[{}] {}", r.id, r.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Selected references for one section, in selection order
pub fn format_selected_refs(corpus: &ReferenceCorpus, ids: &[u32]) -> String {
    ids.iter()
        .filter_map(|&id| corpus.get(id))
        .map(|r| format!("* [{}] {}", r.id, r.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Retry guidance naming what went wrong with the previous response
pub fn corrective_hint(id: TemplateId, error: &PipelineError) -> String {
    let what = match error {
        PipelineError::MalformedOutput(detail) => format!(
            "Your previous response did not match the required tag format ({detail}); \
             reproduce it exactly."
        ),
        PipelineError::Validation(detail) => {
            format!("Your previous response was rejected: {detail}.")
        }
        other => format!("Your previous response could not be used: {other}."),
    };
    format!("{what}\n{}", id.correction())
}

/// Append a retry hint to an already composed prompt
pub fn with_hint(prompt: &str, hint: Option<&str>) -> String {
    match hint {
        Some(hint) => format!("{prompt}\n\n{hint}"),
        None => prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferenceEntry;

    fn title_bindings() -> Bindings {
        Bindings::new()
            .with("subject", "Graph neural networks")
            .with("references", "[1] GCN\n[2] GAT")
    }

    #[test]
    fn test_render_is_deterministic() {
        let prompts = PromptSet::default();
        let bindings = title_bindings();

        let first = prompts.render(TemplateId::Title, &bindings).unwrap();
        let second = prompts.render(TemplateId::Title, &bindings).unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
        assert!(first.contains("Subject: Graph neural networks"));
        assert!(first.contains("[1] GCN\n[2] GAT"));
    }

    #[test]
    fn test_missing_binding_is_config_error() {
        let prompts = PromptSet::default();
        let bindings = Bindings::new().with("subject", "Graphs");

        let err = prompts.render(TemplateId::Title, &bindings).unwrap_err();
        match err {
            PipelineError::Config {
                template,
                placeholder,
            } => {
                assert_eq!(template, TemplateId::Title);
                assert_eq!(placeholder, "references");
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_literal_text_preserved() {
        let bindings = Bindings::new().with("name", "x");
        let rendered =
            render_template(TemplateId::Title, "  a {name} {Not} {} [n]\n\n", &bindings).unwrap();
        assert_eq!(rendered, "  a x {Not} {} [n]\n\n");
    }

    #[test]
    fn test_each_template_asks_only_for_its_own_tag() {
        let prompts = PromptSet::default();
        for id in TemplateId::ALL {
            let text = prompts.template(id);
            for other in TemplateId::ALL {
                let open = format!("<{}>", other.output_tag());
                assert_eq!(text.contains(&open), other == id, "{id} mentions {open}");
            }
        }
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = "title_prompt: \"Title for {subject}: <title>...</title>\"\n";
        let prompts = PromptSet::from_yaml_str(yaml).unwrap();

        let rendered = prompts
            .render(TemplateId::Title, &Bindings::new().with("subject", "Robots"))
            .unwrap();
        assert_eq!(rendered, "Title for Robots: <title>...</title>");
        assert_eq!(prompts.template(TemplateId::Outline), OUTLINE_TEMPLATE);
    }

    #[test]
    fn test_format_references() {
        let corpus = ReferenceCorpus::new(vec![
            ReferenceEntry::new("GCN"),
            ReferenceEntry::with_abstract("GAT", "Attention on graphs."),
        ]);

        assert_eq!(
            format_references(&corpus),
            "[1] GCN\n[2] GAT\n    Abstract: Attention on graphs."
        );
        assert_eq!(format_selected_refs(&corpus, &[2, 1]), "* [2] GAT\n* [1] GCN");
    }

    #[test]
    fn test_corrective_hint() {
        let hint = corrective_hint(
            TemplateId::ReferenceSelection,
            &PipelineError::malformed("missing closing tag </refs>"),
        );
        assert!(hint.contains("missing closing tag </refs>"));
        assert!(hint.contains("<refs> tags"));

        assert_eq!(with_hint("prompt", None), "prompt");
        assert_eq!(with_hint("prompt", Some("fix it")), "prompt\n\nfix it");
    }
}
