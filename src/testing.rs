use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::llm::{ModelGateway, TemplateId};

type Responder = dyn Fn(&str) -> Result<String, GatewayError> + Send + Sync;

/// Answers each prompt with a closure and records what it was asked
pub struct ScriptedGateway {
    respond: Box<Responder>,
    jitter: bool,
    prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Result<String, GatewayError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            jitter: false,
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Well-formed answers for every stage
    pub fn well_behaved() -> Self {
        Self::new(|prompt| Ok(standard_response(prompt)))
    }

    /// Delay each answer by a few milliseconds derived from the prompt
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Prompts sent for one template, optionally narrowed to a `Section:` value
    pub fn prompts_for(&self, template: TemplateId, section: Option<&str>) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| requested_template(p) == Some(template))
            .filter(|p| section.is_none() || line_value(p, "Section:") == section)
            .collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = if self.jitter {
            Duration::from_millis(1 + (prompt.len() % 7) as u64)
        } else {
            Duration::from_millis(1)
        };
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.respond)(prompt)
    }
}

/// Which template produced a prompt, judged by the output tag it asks for
pub fn requested_template(prompt: &str) -> Option<TemplateId> {
    [
        TemplateId::Content,
        TemplateId::SubsectionHeadings,
        TemplateId::ReferenceSelection,
        TemplateId::Abstract,
        TemplateId::Outline,
        TemplateId::Title,
    ]
    .into_iter()
    .find(|id| prompt.contains(&format!("<{}>", id.output_tag())))
}

/// Value of the first line starting with `prefix`
pub fn line_value<'a>(prompt: &'a str, prefix: &str) -> Option<&'a str> {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
        .map(str::trim)
}

pub fn valid_outline() -> String {
    let topics: Vec<String> = (1..=6).map(|i| format!("Topic {i}")).collect();
    format!(
        "<outline>\nIntroduction\n{}\nConclusion\n</outline>",
        topics.join("\n")
    )
}

pub fn expected_content(section: &str, subsection: &str) -> String {
    format!("Prose for {section} / {subsection}, see [1] and [2].")
}

pub fn standard_response(prompt: &str) -> String {
    let section = line_value(prompt, "Section:").unwrap_or_default();
    match requested_template(prompt) {
        Some(TemplateId::Title) => "<title>Graph Learning: A Survey</title>".to_string(),
        Some(TemplateId::Outline) => valid_outline(),
        Some(TemplateId::Abstract) => {
            "<abstract>This survey reviews graph learning.</abstract>".to_string()
        }
        Some(TemplateId::ReferenceSelection) => {
            "<refs>\n* [1] Alpha\n* [2] Beta\n</refs>".to_string()
        }
        Some(TemplateId::SubsectionHeadings) => format!(
            "<subsections>\n* {section} Part A\n* {section} Part B\n* {section} Part C\n</subsections>"
        ),
        Some(TemplateId::Content) => {
            let subsection = line_value(prompt, "Subsection:").unwrap_or_default();
            format!("<content>\n{}\n</content>", expected_content(section, subsection))
        }
        None => "I am not sure what you are asking.".to_string(),
    }
}
