//! Process-local event store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{PlanEvent, PlanEventStore, PlanEventType, matches_filter};
use crate::error::Result;

/// Event logs held in memory. Used by tests and by embedders that persist
/// events elsewhere.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<HashMap<u64, Vec<PlanEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of plans with at least one event.
    pub fn plan_count(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PlanEventStore for InMemoryEventStore {
    fn append_event(&self, plan_id: u64, event: PlanEvent) -> Result<()> {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(plan_id)
            .or_default()
            .push(event);
        Ok(())
    }

    fn get_events(
        &self,
        plan_id: u64,
        event_types: Option<&[PlanEventType]>,
    ) -> Result<Vec<PlanEvent>> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        Ok(events
            .get(&plan_id)
            .map(|log| {
                log.iter()
                    .filter(|e| matches_filter(e, event_types))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::metadata::BlockData;

    #[test]
    fn keeps_insertion_order_per_plan() {
        let store = InMemoryEventStore::new();
        let base = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        // Timestamps deliberately out of order: storage order must win.
        let e1 = PlanEvent::at(PlanEventType::Created, base + Duration::minutes(5), BlockData::new());
        let e2 = PlanEvent::at(PlanEventType::Queued, base, BlockData::new());
        let e3 = PlanEvent::at(PlanEventType::Progress, base + Duration::minutes(1), BlockData::new());

        store.append_event(1, e1.clone()).unwrap();
        store.append_event(2, e2.clone()).unwrap();
        store.append_event(1, e2.clone()).unwrap();
        store.append_event(1, e3.clone()).unwrap();

        assert_eq!(store.get_events(1, None).unwrap(), vec![e1, e2.clone(), e3.clone()]);
        assert_eq!(store.get_latest_event(1, None).unwrap(), Some(e3));
        assert_eq!(
            store.get_latest_event(1, Some(PlanEventType::Queued)).unwrap(),
            Some(e2)
        );
        assert_eq!(store.plan_count(), 2);
    }

    #[test]
    fn unknown_plan_is_empty() {
        let store = InMemoryEventStore::new();
        assert!(store.get_events(99, None).unwrap().is_empty());
        assert_eq!(store.get_latest_event(99, None).unwrap(), None);
    }
}
