//! Enumerates record containers on a fully loaded page.

use adscope_browser::{BrowserSession, ElementHandle};
use adscope_core::{Locator, PageSelectors};

/// Two-level lookup: group containers, then record containers inside each
/// group. Lookup failures are logged and treated as "nothing here".
#[derive(Debug, Clone)]
pub struct RecordLocator {
    groups: Locator,
    cards: Locator,
    records: Locator,
}

impl RecordLocator {
    pub fn new(selectors: &PageSelectors) -> Self {
        Self {
            groups: selectors.groups.clone(),
            cards: selectors.cards.clone(),
            records: selectors.records.clone(),
        }
    }

    /// Group containers in document order.
    pub async fn groups<S>(&self, session: &S) -> Vec<ElementHandle>
    where
        S: BrowserSession + ?Sized,
    {
        match session.locate(None, &self.groups).await {
            Ok(groups) => groups,
            Err(e) => {
                tracing::warn!(locator = %self.groups, "group lookup failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Record containers inside one group.
    pub async fn records<S>(&self, session: &S, group: &ElementHandle) -> Vec<ElementHandle>
    where
        S: BrowserSession + ?Sized,
    {
        match session.locate(Some(group), &self.records).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(group = %group, "skipping group, record lookup failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Secondary card containers; only counted for diagnostics.
    pub async fn card_count<S>(&self, session: &S) -> usize
    where
        S: BrowserSession + ?Sized,
    {
        session
            .locate(None, &self.cards)
            .await
            .map(|cards| cards.len())
            .unwrap_or_default()
    }

    /// Every record container on the page, group by group.
    pub async fn all_records<S>(&self, session: &S) -> Vec<ElementHandle>
    where
        S: BrowserSession + ?Sized,
    {
        let groups = self.groups(session).await;
        let cards = self.card_count(session).await;
        tracing::info!(groups = groups.len(), cards, "located ad containers");

        let mut records = Vec::new();
        for group in &groups {
            records.extend(self.records(session, group).await);
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adscope_browser::mock::MockSession;

    #[tokio::test]
    async fn test_records_in_group_order() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let groups = session.add_children(None, &selectors.groups, 2);
        let first = session.add_children(Some(&groups[0]), &selectors.records, 2);
        let second = session.add_children(Some(&groups[1]), &selectors.records, 1);

        let locator = RecordLocator::new(&selectors);
        let records = locator.all_records(&session).await;

        let expected: Vec<_> = first.into_iter().chain(second).collect();
        assert_eq!(records, expected);
    }

    #[tokio::test]
    async fn test_empty_page() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let locator = RecordLocator::new(&selectors);

        assert!(locator.all_records(&session).await.is_empty());
        assert_eq!(locator.card_count(&session).await, 0);
    }

    #[tokio::test]
    async fn test_group_lookup_failure_is_empty() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        session.add_children(None, &selectors.groups, 3);
        session.fail_locator(&selectors.groups);

        let locator = RecordLocator::new(&selectors);
        assert!(locator.groups(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_group_without_records() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let groups = session.add_children(None, &selectors.groups, 2);
        session.add_children(Some(&groups[1]), &selectors.records, 2);

        let locator = RecordLocator::new(&selectors);
        assert!(locator.records(&session, &groups[0]).await.is_empty());
        assert_eq!(locator.all_records(&session).await.len(), 2);
    }

    #[tokio::test]
    async fn test_record_lookup_failure_skips_groups() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let groups = session.add_children(None, &selectors.groups, 2);
        session.add_children(Some(&groups[0]), &selectors.records, 2);
        session.fail_locator(&selectors.records);

        let locator = RecordLocator::new(&selectors);
        assert_eq!(locator.groups(&session).await.len(), 2);
        assert!(locator.all_records(&session).await.is_empty());
    }
}
