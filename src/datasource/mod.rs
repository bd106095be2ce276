//! Quote source abstraction for fetching NAV snapshots from external sources.

use crate::domain::Quote;
use async_trait::async_trait;
use std::fmt;

pub mod mock;
pub mod nav_api;

pub use mock::MockQuoteSource;
pub use nav_api::NavApiSource;

/// Quote source trait for fetching the latest NAV.
///
/// Implementations must handle retry/backoff and convert the reported value into ledger units.
#[async_trait]
pub trait QuoteSource: Send + Sync + fmt::Debug {
    /// Fetch the most recent NAV snapshot.
    async fn fetch_quote(&self) -> Result<Quote, QuoteSourceError>;
}

/// Error type for quote source operations.
#[derive(Debug, Clone)]
pub enum QuoteSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 401 bad key, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed NAV value)
    ParseError(String),
    /// No quote available yet
    Empty,
}

impl fmt::Display for QuoteSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            QuoteSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            QuoteSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            QuoteSourceError::Empty => write!(f, "No quote available"),
        }
    }
}

impl std::error::Error for QuoteSourceError {}
