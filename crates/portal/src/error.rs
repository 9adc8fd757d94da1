use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Why a retrieval stopped. Every variant is terminal: the session has
/// already been logged out when the caller sees it.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Login rejected: check username and password")]
    CredentialRejected,
    #[error("Strong authentication denied at step '{stage}'")]
    ChallengeDenied { stage: String },
    #[error("Strong authentication not confirmed after {attempts} status checks and manual fallback not completed")]
    Timeout { attempts: u32 },
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),
    #[error("Portal page not as expected (format changed?): {0}")]
    UnexpectedPage(String),
    #[error("Operator prompt failed: {0}")]
    Prompt(#[source] std::io::Error),
    #[error("Failed to write export: {0}")]
    Export(#[source] std::io::Error),
}
