pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{GatewayError, PipelineError};
pub use io::{
    load_survey_input, write_document_json, write_document_xml, DraftMetadata, SurveyInput,
};
pub use llm::{AnthropicClient, AnthropicConfig, ModelGateway, PromptSet, RetryPolicy, TemplateId};
pub use models::{Document, Outline, Reference, ReferenceCorpus, Section, StageId, Subsection};
pub use stages::{PipelineConfig, SurveyPipeline};
