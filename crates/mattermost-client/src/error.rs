use thiserror::Error;

#[derive(Debug, Error)]
pub enum MattermostError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mattermost API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid Mattermost URL '{0}'")]
    InvalidUrl(String),
}

impl MattermostError {
    pub fn status(&self) -> Option<u16> {
        match self {
            MattermostError::Api { status, .. } => Some(*status),
            MattermostError::Http(e) => e.status().map(|s| s.as_u16()),
            MattermostError::InvalidUrl(_) => None,
        }
    }
}
