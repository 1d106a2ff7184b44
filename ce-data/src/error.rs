use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory request timed out: {0}")]
    Timeout(String),

    #[error("directory http error: {0}")]
    Http(String),

    #[error("directory returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected directory response format: {0}")]
    ResponseFormat(String),

    #[error("directory misconfigured: {0}")]
    Misconfigured(String),
}

impl From<reqwest::Error> for DirectoryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request timed out: {0}")]
    Timeout(String),

    #[error("registry http error: {0}")]
    Http(String),

    #[error("registry returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected registry response format: {0}")]
    ResponseFormat(String),

    #[error("agent with cedula {cedula} is already registered")]
    Duplicate { cedula: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}
