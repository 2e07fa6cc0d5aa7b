use std::sync::Arc;

use tracing::{debug, info};

use crate::error::PipelineError;
use crate::llm::{
    corrective_hint, with_hint, Bindings, ModelGateway, PromptSet, RetryPolicy, TemplateId,
};
use crate::models::StageId;

/// Composes, calls and parses one stage under the retry policy.
///
/// Cheap to clone; every section task gets its own copy.
#[derive(Clone)]
pub struct StageRunner {
    gateway: Arc<dyn ModelGateway>,
    prompts: Arc<PromptSet>,
    retry: RetryPolicy,
}

impl StageRunner {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        prompts: Arc<PromptSet>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            prompts,
            retry,
        }
    }

    /// Render `template` once, then call the gateway and `parse` the response
    /// until it is accepted or the retry policy gives up.
    pub async fn run<T, P>(
        &self,
        stage: StageId,
        template: TemplateId,
        bindings: &Bindings,
        parse: P,
    ) -> Result<T, PipelineError>
    where
        P: Fn(&str) -> Result<T, PipelineError> + Sync,
        T: Send,
    {
        let prompt = self
            .prompts
            .render(template, bindings)
            .map_err(|e| PipelineError::Fatal {
                stage: stage.clone(),
                attempts: 0,
                source: Box::new(e),
            })?;

        debug!("Stage {}: prompt is {} bytes", stage, prompt.len());

        let gateway = self.gateway.as_ref();
        let prompt = prompt.as_str();
        let parse = &parse;

        let value = self
            .retry
            .attempt(
                &stage,
                |error| corrective_hint(template, error),
                move |attempt| async move {
                    let request = with_hint(prompt, attempt.hint.as_deref());
                    let raw = gateway.complete(&request).await?;
                    parse(&raw)
                },
            )
            .await?;

        info!("Stage {}: accepted", stage);
        Ok(value)
    }
}
