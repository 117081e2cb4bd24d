use crate::core::state::Stage;

/// Failures of a single generation call or credential update.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("API 키가 설정되지 않았습니다. API 키를 먼저 입력해주세요.")]
    MissingCredential,

    #[error("API 키를 입력해주세요.")]
    EmptyCredential,

    #[error("model returned no text")]
    EmptyResponse,

    #[error("model returned malformed JSON: {0}")]
    MalformedResponse(String),

    #[error("generation failed: {0:#}")]
    GenerationFailed(#[source] anyhow::Error),

    #[error("failed to persist credential: {0:#}")]
    Storage(#[source] anyhow::Error),
}

/// Transitions the workflow refuses to start.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("another request is still in progress")]
    Busy,

    #[error("cannot {action} while in stage {stage}")]
    InvalidTransition { stage: Stage, action: &'static str },

    #[error("source text is empty")]
    EmptySource,

    #[error("no idea at position {0}")]
    NoSuchIdea(usize),
}
