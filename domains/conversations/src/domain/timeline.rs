//! Message timeline: the merged, deduplicated view of a conversation
//!
//! History pages, live deliveries and optimistic sends all land in one
//! id → message map. The display sequence is rebuilt from that map after
//! every change, sorted ascending by `(timestamp, id)`.
//!
//! Conflict rules per id:
//! - history only fills gaps; it never replaces a live or pending copy, and a
//!   second history copy of the same id is ignored
//! - live always inserts or overwrites
//! - pending entries are replaced on confirm and removed on retract

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::domain::entities::ChatMessage;

/// Where the current copy of a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    History,
    Live,
    Pending,
}

/// What a timeline mutation did to the display sequence.
///
/// `Prepended` lets a consumer keep its visual anchor: `anchor` is the id that
/// was oldest before the page arrived and `count` is how many messages now sit
/// before it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewChange {
    #[default]
    Unchanged,
    /// Seeded from empty or cleared
    Reset,
    Prepended {
        count: usize,
        anchor: String,
    },
    Upserted {
        id: String,
    },
    Confirmed {
        provisional_id: String,
        id: String,
    },
    Retracted {
        id: String,
    },
}

#[derive(Debug, Clone)]
struct TimelineEntry {
    message: ChatMessage,
    origin: Origin,
}

#[derive(Debug, Clone, Default)]
pub struct MessageTimeline {
    entries: HashMap<String, TimelineEntry>,
    view: Vec<ChatMessage>,
}

impl MessageTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages in display order
    pub fn messages(&self) -> &[ChatMessage] {
        &self.view
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn origin(&self, id: &str) -> Option<Origin> {
        self.entries.get(id).map(|entry| entry.origin)
    }

    /// Merge a history page. Pages arrive newest-first.
    pub fn apply_history_page(&mut self, page: Vec<ChatMessage>) -> ViewChange {
        let anchor = self.view.first().map(|message| message.id.clone());

        let mut inserted = 0;
        for message in page.into_iter().rev() {
            if let Entry::Vacant(slot) = self.entries.entry(message.id.clone()) {
                slot.insert(TimelineEntry {
                    message,
                    origin: Origin::History,
                });
                inserted += 1;
            }
        }

        if inserted == 0 {
            return ViewChange::Unchanged;
        }
        self.rebuild();

        match anchor {
            None => ViewChange::Reset,
            Some(anchor) => {
                // History never removes entries, so the anchor is still present
                let count = self
                    .view
                    .iter()
                    .position(|message| message.id == anchor)
                    .unwrap_or(0);
                ViewChange::Prepended { count, anchor }
            }
        }
    }

    /// Merge a live delivery; live is authoritative for its id.
    pub fn apply_live(&mut self, message: ChatMessage) -> ViewChange {
        if let Some(existing) = self.entries.get(&message.id) {
            if existing.origin == Origin::Live && existing.message == message {
                return ViewChange::Unchanged;
            }
        }
        self.upsert(message, Origin::Live)
    }

    /// Insert an optimistic, not yet persisted message.
    pub fn insert_pending(&mut self, message: ChatMessage) -> ViewChange {
        self.upsert(message, Origin::Pending)
    }

    /// Replace a pending entry with the record the store confirmed.
    pub fn confirm(&mut self, provisional_id: &str, confirmed: ChatMessage) -> ViewChange {
        if self.origin(provisional_id) == Some(Origin::Pending) {
            self.entries.remove(provisional_id);
        }
        let id = confirmed.id.clone();
        self.entries.insert(
            id.clone(),
            TimelineEntry {
                message: confirmed,
                origin: Origin::Live,
            },
        );
        self.rebuild();
        ViewChange::Confirmed {
            provisional_id: provisional_id.to_string(),
            id,
        }
    }

    /// Remove a pending entry. Confirmed or received messages are never retracted.
    pub fn retract(&mut self, id: &str) -> ViewChange {
        if self.origin(id) != Some(Origin::Pending) {
            return ViewChange::Unchanged;
        }
        self.entries.remove(id);
        self.rebuild();
        ViewChange::Retracted { id: id.to_string() }
    }

    pub fn clear(&mut self) -> ViewChange {
        if self.entries.is_empty() {
            return ViewChange::Unchanged;
        }
        self.entries.clear();
        self.view.clear();
        ViewChange::Reset
    }

    fn upsert(&mut self, message: ChatMessage, origin: Origin) -> ViewChange {
        let id = message.id.clone();
        self.entries
            .insert(id.clone(), TimelineEntry { message, origin });
        self.rebuild();
        ViewChange::Upserted { id }
    }

    fn rebuild(&mut self) {
        let mut view: Vec<ChatMessage> = self
            .entries
            .values()
            .map(|entry| entry.message.clone())
            .collect();
        view.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        self.view = view;
    }
}
