use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Anthropic API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Anthropic API key is not configured")]
    MissingApiKey,

    #[error("response contained no text content")]
    EmptyResponse,
}
