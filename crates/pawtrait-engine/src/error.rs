/// Failure taxonomy for one stylize run.
///
/// Retryable errors are transient transport failures and provider 429/5xx
/// responses; everything else fails the current step immediately. Upload
/// transfer degradation and parse fallbacks are warnings, not errors.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("{0} is not set")]
    MissingCredential(&'static str),

    #[error("provider request failed ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("generation still pending after {polls} polls")]
    Timeout { polls: u32 },

    #[error("a stylize run is already in progress")]
    RunInProgress,

    #[error("unreadable source image: {0}")]
    InvalidImage(String),
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Transport(err) => {
                err.is_timeout() || err.is_connect() || err.is_request()
            }
            PipelineError::Provider { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        PipelineError::Provider {
            status,
            message: message.into(),
        }
    }
}
