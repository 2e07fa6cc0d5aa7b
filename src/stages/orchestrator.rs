use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::llm::{ModelGateway, PromptSet, RetryPolicy, ThrottledGateway};
use crate::models::{Document, PaperFrame, ReferenceCorpus, Section, StageFailure, StageId};
use crate::stages::{
    execute_abstract, execute_content, execute_outline, execute_section_refs,
    execute_subsection_headings, execute_title, StageRunner,
};

/// Configuration for a drafting run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    /// Maximum gateway calls in flight at once
    pub concurrency: usize,
    pub prompts: PromptSet,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency: 4,
            prompts: PromptSet::default(),
        }
    }
}

/// Drives TITLE → OUTLINE → (ABSTRACT ∥ per-section chains) → Document.
///
/// TITLE and OUTLINE run in order and abort the run if exhausted. After that,
/// the abstract and every section chain run as separate tasks; each task owns
/// the `Section` it builds and hands it back when done, so no state is shared
/// for writing.
pub struct SurveyPipeline {
    runner: StageRunner,
    corpus: Arc<ReferenceCorpus>,
}

impl SurveyPipeline {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        corpus: Arc<ReferenceCorpus>,
        config: PipelineConfig,
    ) -> Self {
        let throttled: Arc<dyn ModelGateway> =
            Arc::new(ThrottledGateway::new(gateway, config.concurrency));
        Self {
            runner: StageRunner::new(throttled, Arc::new(config.prompts), config.retry),
            corpus,
        }
    }

    pub async fn run(&self, subject: &str) -> Result<Document, PipelineError> {
        info!(
            "Drafting survey on {:?} from {} references",
            subject,
            self.corpus.size()
        );

        let title = execute_title(&self.runner, subject, &self.corpus).await?;
        info!("Title: {}", title);

        let outline = execute_outline(&self.runner, subject, &self.corpus).await?;
        info!("Outline: {} sections", outline.interior().len());

        let frame = Arc::new(PaperFrame {
            subject: subject.to_string(),
            title,
            outline,
        });

        let abstract_task = {
            let runner = self.runner.clone();
            let frame = frame.clone();
            tokio::spawn(async move { execute_abstract(&runner, &frame).await })
        };

        let mut tasks = JoinSet::new();
        for (index, heading) in frame.outline.interior().iter().enumerate() {
            let runner = self.runner.clone();
            let frame = frame.clone();
            let corpus = self.corpus.clone();
            let heading = heading.clone();
            tasks.spawn(async move {
                let section = build_section(&runner, &frame, &corpus, heading).await;
                (index, section)
            });
        }

        let mut slots: Vec<Option<Section>> = vec![None; frame.outline.interior().len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(section))) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(section);
                    }
                }
                Ok((_, Err(fatal))) => {
                    tasks.abort_all();
                    abstract_task.abort();
                    return Err(fatal);
                }
                Err(e) => warn!("Section task did not finish: {}", e),
            }
        }

        let sections: Vec<Section> = slots
            .into_iter()
            .zip(frame.outline.interior())
            .map(|(slot, heading)| slot.unwrap_or_else(|| unfinished_section(heading)))
            .collect();

        let (abstract_text, abstract_failure) = match abstract_task.await {
            Ok(Ok(text)) => (Some(text), None),
            Ok(Err(e)) if matches!(e, PipelineError::Fatal { .. }) => return Err(e),
            Ok(Err(e)) => {
                warn!("Abstract incomplete: {}", e);
                (None, Some(StageFailure::from_error(&e)))
            }
            Err(e) => (
                None,
                Some(StageFailure::new(
                    StageId::Abstract.to_string(),
                    format!("abstract task did not finish: {e}"),
                )),
            ),
        };

        let document = Document {
            subject: frame.subject.clone(),
            title: frame.title.clone(),
            abstract_text,
            abstract_failure,
            outline: frame.outline.clone(),
            sections,
        };

        info!(
            "Draft assembled: {}/{} sections complete",
            document.completed_section_count(),
            document.sections.len()
        );
        Ok(document)
    }
}

/// Run one section's chain: SECTION_REFS → SUBSECTION_HEADINGS → CONTENT per subsection.
///
/// An exhausted stage stops the chain and marks the section incomplete; the
/// outputs accepted before it are kept. Only non-retryable errors escape.
pub async fn build_section(
    runner: &StageRunner,
    frame: &PaperFrame,
    corpus: &ReferenceCorpus,
    heading: String,
) -> Result<Section, PipelineError> {
    let mut section = Section::new(heading.as_str());

    match execute_section_refs(runner, frame, corpus, &heading).await {
        Ok(ids) => section.accept_refs(ids),
        Err(e) => return abandon(section, e),
    }

    match execute_subsection_headings(runner, frame, corpus, &heading, &section.selected_refs).await
    {
        Ok(headings) => section.accept_subsection_headings(headings),
        Err(e) => return abandon(section, e),
    }

    for index in 0..section.subsections.len() {
        let subheading = section.subsections[index].heading.clone();
        match execute_content(
            runner,
            frame,
            corpus,
            &heading,
            &subheading,
            &section.selected_refs,
        )
        .await
        {
            Ok(content) => section.accept_content(index, content),
            Err(e) => return abandon(section, e),
        }
    }

    info!(
        "Section {:?}: {} subsections written",
        heading,
        section.subsections.len()
    );
    Ok(section)
}

/// Placeholder for a section whose task panicked or was cancelled
fn unfinished_section(heading: &str) -> Section {
    let mut section = Section::new(heading);
    section.mark_incomplete(StageFailure::new(
        "section task",
        "section task did not finish",
    ));
    section
}

fn abandon(mut section: Section, error: PipelineError) -> Result<Section, PipelineError> {
    if matches!(error, PipelineError::Fatal { .. }) {
        return Err(error);
    }
    warn!("Section {:?} incomplete: {}", section.heading, error);
    section.mark_incomplete(StageFailure::from_error(&error));
    Ok(section)
}
