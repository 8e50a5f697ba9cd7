//! Fetcher: batch resolution and raw content retrieval over a provider

use crate::case::{BatchSelector, CaseIdentifier};
use crate::provider::{CIProvider, CaseListing, FetchError, FetchedContent};
use std::collections::HashSet;
use std::sync::Arc;

pub struct Fetcher {
    provider: Arc<dyn CIProvider>,
}

impl Fetcher {
    pub fn new(provider: Arc<dyn CIProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    pub async fn fetch(&self, case: &CaseIdentifier) -> Result<FetchedContent, FetchError> {
        let content = self.provider.fetch(case).await?;
        tracing::debug!(
            provider = self.provider.id(),
            case = %case,
            bytes = content.raw_content.len(),
            "fetched raw content"
        );
        Ok(content)
    }

    /// Cases covered by `selector`, oldest first, each triple once.
    ///
    /// `Single` never reaches the provider.
    pub async fn list(&self, selector: &BatchSelector) -> Result<Vec<CaseIdentifier>, FetchError> {
        let limit = match selector {
            BatchSelector::Single(case) => return Ok(vec![case.clone()]),
            BatchSelector::All { .. } => None,
            BatchSelector::LastN { n, .. } => Some(*n),
        };

        let listings = self.provider.list_cases(selector.workflow()).await?;
        let cases = order_listings(listings, limit);
        tracing::debug!(provider = self.provider.id(), selector = %selector, cases = cases.len(), "resolved batch");
        Ok(cases)
    }
}

/// Sort oldest first (ties by triple), drop repeated triples, and keep only
/// the newest `limit` cases if given.
pub fn order_listings(mut listings: Vec<CaseListing>, limit: Option<usize>) -> Vec<CaseIdentifier> {
    listings.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.case.triple().cmp(&b.case.triple()))
    });

    let mut seen = HashSet::new();
    let mut cases: Vec<CaseIdentifier> = listings
        .into_iter()
        .filter(|listing| seen.insert(listing.case.triple()))
        .map(|listing| listing.case)
        .collect();

    if let Some(limit) = limit {
        let skip = cases.len().saturating_sub(limit);
        cases.drain(..skip);
    }
    cases
}
