use thiserror::Error;

use crate::llm::TemplateId;
use crate::models::StageId;

/// A failed model call. Always treated as transient by the retry policy.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct GatewayError {
    pub message: String,
    /// HTTP status, when the failure came back from the API
    pub status: Option<u16>,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A template names a placeholder that the stage did not bind
    #[error("Template {template} references unbound placeholder `{placeholder}`")]
    Config {
        template: TemplateId,
        placeholder: String,
    },

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Stage {stage} exhausted after {attempts} attempts: {last_error}")]
    StageExhausted {
        stage: StageId,
        attempts: u32,
        last_error: Box<PipelineError>,
    },

    /// A non-retryable error, tagged with where it happened
    #[error("Stage {stage} failed on attempt {attempts}: {source}")]
    Fatal {
        stage: StageId,
        attempts: u32,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedOutput(detail.into())
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }

    /// Errors caused by the shape of a model response; retried with a hint.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::MalformedOutput(_) | Self::Validation(_))
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }

    /// Stage the error is attributed to, if it has been through a stage.
    pub fn stage(&self) -> Option<&StageId> {
        match self {
            Self::StageExhausted { stage, .. } | Self::Fatal { stage, .. } => Some(stage),
            _ => None,
        }
    }

    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::StageExhausted { attempts, .. } | Self::Fatal { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// The innermost error, past any stage wrapping.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            Self::StageExhausted { last_error, .. } => last_error.root_cause(),
            Self::Fatal { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
