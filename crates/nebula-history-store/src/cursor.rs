//! Lazy paging over one instance's history.

use nebula_history_core::{Event, InstanceId};

use crate::error::Result;
use crate::traits::{EventStore, Page};

/// Walks an instance history page by page.
///
/// Holds no store resources between calls: each [`next_page`] is an
/// independent fetch, so dropping the cursor mid-scan has no side effect.
/// Events appended during a scan show up in later pages if they sort after
/// the current offset.
///
/// [`next_page`]: HistoryCursor::next_page
pub struct HistoryCursor<'a, S: EventStore + ?Sized> {
    store: &'a S,
    instance: InstanceId,
    page: Page,
    exhausted: bool,
}

impl<'a, S: EventStore + ?Sized> HistoryCursor<'a, S> {
    pub fn new(store: &'a S, instance: InstanceId, page_size: u32) -> Self {
        Self {
            store,
            instance,
            page: Page::first(page_size),
            exhausted: page_size == 0,
        }
    }

    /// Fetch the next page. `None` once a short page has been returned.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Event>>> {
        if self.exhausted {
            return Ok(None);
        }

        let events = self.store.list_by_instance(&self.instance, self.page).await?;
        if (events.len() as u64) < self.page.limit as u64 {
            self.exhausted = true;
        }
        if events.is_empty() {
            return Ok(None);
        }

        self.page = self.page.next();
        Ok(Some(events))
    }

    /// Start over from the first page.
    pub fn rewind(&mut self) {
        self.page = Page::first(self.page.limit);
        self.exhausted = self.page.limit == 0;
    }

    /// Drain the remaining pages into one vector.
    pub async fn collect_all(&mut self) -> Result<Vec<Event>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use nebula_history_core::{AccessScope, EventType, NewEvent, RegistrationId};

    async fn seeded(count: u64) -> (MemoryStore, InstanceId) {
        let scope = AccessScope::new("acc1").unwrap();
        let reg = RegistrationId::new(&scope, "reg").unwrap();
        let inst = InstanceId::new(&scope, "run").unwrap();
        let store = MemoryStore::new();

        let event = |event_type| NewEvent::new(reg.clone(), inst.clone(), event_type, Vec::new());

        store
            .insert_event(event(EventType::WorkflowScheduled))
            .await
            .unwrap();
        for _ in 1..count {
            store
                .insert_event(event(EventType::SignalReceived))
                .await
                .unwrap();
        }
        (store, inst)
    }

    #[tokio::test]
    async fn test_pages_cover_history_once() {
        let (store, inst) = seeded(7).await;
        let mut cursor = HistoryCursor::new(&store, inst, 3);

        let sizes: Vec<usize> = {
            let mut sizes = Vec::new();
            while let Some(page) = cursor.next_page().await.unwrap() {
                sizes.push(page.len());
            }
            sizes
        };
        assert_eq!(sizes, vec![3, 3, 1]);
        assert!(cursor.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exact_multiple_ends_cleanly() {
        let (store, inst) = seeded(4).await;
        let mut cursor = HistoryCursor::new(&store, inst, 2);

        let all = cursor.collect_all().await.unwrap();
        let seqs: Vec<u64> = all.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_rewind_restarts() {
        let (store, inst) = seeded(3).await;
        let mut cursor = HistoryCursor::new(&store, inst, 2);

        let first = cursor.next_page().await.unwrap().unwrap();
        cursor.rewind();
        let again = cursor.next_page().await.unwrap().unwrap();
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_unknown_instance_is_empty() {
        let (store, _) = seeded(1).await;
        let other = InstanceId::parse("acc1:nobody").unwrap();
        let mut cursor = HistoryCursor::new(&store, other, 5);
        assert!(cursor.next_page().await.unwrap().is_none());
    }
}
