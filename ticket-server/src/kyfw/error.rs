//! kyfw client error types.

use std::fmt;

/// Errors from the kyfw HTTP client.
#[derive(Debug)]
pub enum KyfwError {
    /// HTTP request failed (network error, timeout, etc.)
    Http(reqwest::Error),

    /// Server answered with a non-success status code
    Status { status: u16, url: String },

    /// An HTML page came back where JSON was expected (anti-crawl page)
    AntiCrawl { snippet: String },

    /// JSON deserialization failed
    Json {
        message: String,
        body: Option<String>,
    },

    /// The query API reported `status: false`
    Api { message: String },

    /// The response was well-formed but not usable
    InvalidResponse(String),
}

impl KyfwError {
    /// Whether the failure is worth another attempt with a fresh session.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KyfwError::Http(_) | KyfwError::Status { .. })
    }
}

impl fmt::Display for KyfwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KyfwError::Http(e) => write!(f, "HTTP error: {e}"),
            KyfwError::Status { status, url } => write!(f, "HTTP status {status} from {url}"),
            KyfwError::AntiCrawl { snippet } => {
                write!(f, "blocked by anti-crawl page (body: {snippet})")
            }
            KyfwError::Json { message, body } => {
                write!(f, "JSON parse error: {message}")?;
                if let Some(body) = body {
                    write!(f, " (body: {body})")?;
                }
                Ok(())
            }
            KyfwError::Api { message } => write!(f, "query rejected: {message}"),
            KyfwError::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for KyfwError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KyfwError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for KyfwError {
    fn from(err: reqwest::Error) -> Self {
        KyfwError::Http(err)
    }
}
