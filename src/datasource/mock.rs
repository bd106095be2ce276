//! Mock quote source for testing without network calls.

use super::{QuoteSource, QuoteSourceError};
use crate::domain::Quote;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Mock quote source that hands out predefined quotes in order.
///
/// Once the queue is drained the last quote is repeated; an empty source returns
/// [`QuoteSourceError::Empty`].
#[derive(Debug, Default)]
pub struct MockQuoteSource {
    quotes: Mutex<VecDeque<Quote>>,
    last: Mutex<Option<Quote>>,
}

impl MockQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a quote.
    pub fn with_quote(self, quote: Quote) -> Self {
        self.push(quote);
        self
    }

    /// Queue a quote after construction.
    pub fn push(&self, quote: Quote) {
        self.quotes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(quote);
    }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    async fn fetch_quote(&self) -> Result<Quote, QuoteSourceError> {
        let next = self
            .quotes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(quote) = next {
            *last = Some(quote);
        }
        (*last).ok_or(QuoteSourceError::Empty)
    }
}
