//! Publish/subscribe channel for store writes.
use serde::{Deserialize, Serialize};

/// What a successful write changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    RecordWritten { key: String },
    Imported { records: usize },
    HistoryWritten { key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&ChangeEvent)>;

/// Listeners are called in subscription order on the writing thread.
#[derive(Default)]
pub struct ChangeBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
    revision: u64,
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("listeners", &self.listeners.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl ChangeBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ChangeEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Increases by one on every published event. Readers compare against a
    /// remembered value to know their cached view is stale.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub fn publish(&mut self, event: &ChangeEvent) {
        self.revision += 1;
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn listeners_see_events_until_unsubscribed() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = ChangeBus::new();
        let sink = Rc::clone(&seen);
        let id = bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        bus.publish(&ChangeEvent::RecordWritten { key: "a::1".into() });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&ChangeEvent::Imported { records: 2 });

        assert_eq!(
            *seen.borrow(),
            vec![ChangeEvent::RecordWritten { key: "a::1".into() }]
        );
        assert_eq!(bus.revision(), 2);
    }
}
