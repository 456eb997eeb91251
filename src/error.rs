use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("git error: {0}")]
    Vcs(String),

    #[error("missing credential: {0}")]
    Auth(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("review rejected ({status}): {body}")]
    Publish { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReviewError>;
