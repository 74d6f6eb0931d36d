//! Pure queue state machine.
//!
//! No I/O, no async, no locking. Every operation is a synchronous state
//! transition so the rules for the current pointer can be tested in
//! isolation. `readcast-playback::QueueStore` owns an instance behind a lock
//! and schedules persistence after each mutation.
//!
//! # Current pointer
//!
//! The pointer is `None` exactly when the queue is empty. Remove, move and
//! sweep keep it on the same logical item whenever that item survives;
//! otherwise it is clamped into range.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::{ItemId, QueueItem};
use super::snapshot::{ItemSummary, QueueSnapshot};
use crate::errors::QueueError;

/// Where `enqueue` inserts a new item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueuePosition {
    /// At the end of the queue.
    #[default]
    Append,
    /// Directly after the current item ("play next").
    AfterCurrent,
}

/// Result of removing an item.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveOutcome {
    pub removed: QueueItem,
    /// Whether the removed item was the current one.
    pub was_current: bool,
}

/// Ordered queue of items with a current-position pointer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Queue {
    items: Vec<QueueItem>,
    current: Option<usize>,
}

impl Queue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            current: None,
        }
    }

    /// Rebuild a queue from persisted parts.
    ///
    /// Duplicate ids keep their first occurrence. The pointer follows the
    /// item it addressed before de-duplication when that item survives, and
    /// is clamped into range otherwise.
    #[must_use]
    pub fn restore(items: Vec<QueueItem>, current_index: Option<usize>) -> Self {
        let current_id = current_index
            .and_then(|i| items.get(i))
            .map(|item| item.id.clone());

        let mut seen = HashSet::new();
        let items: Vec<QueueItem> = items
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .collect();

        let current = if items.is_empty() {
            None
        } else {
            current_id
                .and_then(|id| items.iter().position(|item| item.id == id))
                .or_else(|| Some(current_index.unwrap_or(0).min(items.len() - 1)))
        };

        Self { items, current }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    #[must_use]
    pub const fn current_index(&self) -> Option<usize> {
        self.current
    }

    #[must_use]
    pub fn current(&self) -> Option<&QueueItem> {
        self.current.and_then(|i| self.items.get(i))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    #[must_use]
    pub fn position_of(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    #[must_use]
    pub fn find(&self, id: &ItemId) -> Option<&QueueItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.position_of(id).is_some()
    }

    // ── Mutations ──────────────────────────────────────────────────────

    /// Insert an item and return its index.
    ///
    /// The first item enqueued into an empty queue becomes current.
    pub fn enqueue(
        &mut self,
        item: QueueItem,
        position: EnqueuePosition,
    ) -> Result<usize, QueueError> {
        if self.contains(&item.id) {
            return Err(QueueError::DuplicateId {
                id: item.id.to_string(),
            });
        }

        let index = match (position, self.current) {
            (EnqueuePosition::AfterCurrent, Some(current)) => current + 1,
            _ => self.items.len(),
        };
        self.items.insert(index, item);

        self.current = match self.current {
            None => Some(0),
            Some(current) if index <= current => Some(current + 1),
            other => other,
        };
        Ok(index)
    }

    /// Remove the item at `at`.
    ///
    /// Removing the current item leaves the pointer on the item that took
    /// its place (or the new last item).
    pub fn remove(&mut self, at: usize) -> Result<RemoveOutcome, QueueError> {
        self.check_index(at)?;
        let removed = self.items.remove(at);
        let was_current = self.current == Some(at);

        self.current = match self.current {
            _ if self.items.is_empty() => None,
            Some(current) if at < current => Some(current - 1),
            Some(current) => Some(current.min(self.items.len() - 1)),
            None => Some(0),
        };

        Ok(RemoveOutcome {
            removed,
            was_current,
        })
    }

    /// Move the item at `from` to index `to`; the pointer follows its item.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), QueueError> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }

        let item = self.items.remove(from);
        self.items.insert(to, item);

        if let Some(current) = self.current {
            self.current = Some(if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            });
        }
        Ok(())
    }

    /// Remove every item. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        self.current = None;
        count
    }

    /// Point the queue at `index`.
    pub fn select(&mut self, index: usize) -> Result<&QueueItem, QueueError> {
        self.check_index(index)?;
        self.current = Some(index);
        Ok(&self.items[index])
    }

    pub fn mark_listened(&mut self, id: &ItemId) -> Result<(), QueueError> {
        self.item_mut(id)?.listened = true;
        Ok(())
    }

    /// Set the stored position outright (seek, pause, stop).
    pub fn update_progress(&mut self, id: &ItemId, position: f64) -> Result<(), QueueError> {
        self.item_mut(id)?.last_position = position.max(0.0);
        Ok(())
    }

    /// Record a progress tick while playing. Positions never move backwards
    /// through this path.
    pub fn record_tick(&mut self, id: &ItemId, position: f64) -> Result<bool, QueueError> {
        let item = self.item_mut(id)?;
        if position > item.last_position {
            item.last_position = position;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn set_kept(&mut self, id: &ItemId, kept: bool) -> Result<(), QueueError> {
        self.item_mut(id)?.kept = kept;
        Ok(())
    }

    /// Remove stream items past their expiry that are neither current nor
    /// kept. Returns the removed items.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<QueueItem> {
        self.sweep_expired_except(now, None)
    }

    /// Like [`sweep_expired`](Self::sweep_expired), also sparing `protected`.
    pub fn sweep_expired_except(
        &mut self,
        now: DateTime<Utc>,
        protected: Option<&ItemId>,
    ) -> Vec<QueueItem> {
        let current_id = self.current().map(|item| item.id.clone());
        let (expired, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.items).into_iter().partition(|item| {
                item.is_stream()
                    && item.is_expired(now)
                    && !item.kept
                    && Some(&item.id) != current_id.as_ref()
                    && Some(&item.id) != protected
            });

        self.items = kept;
        self.current = match current_id {
            Some(id) => self.position_of(&id),
            None if self.items.is_empty() => None,
            None => Some(0),
        };
        expired
    }

    // ── Views ──────────────────────────────────────────────────────────

    /// Distinct feed labels of stream items, in order of first appearance.
    #[must_use]
    pub fn feed_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        for item in &self.items {
            if item.is_stream()
                && let Some(label) = item.feed_label()
                && !groups.iter().any(|g| g == label)
            {
                groups.push(label.to_string());
            }
        }
        groups
    }

    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current_index: self.current,
            items: self.items.iter().map(ItemSummary::from).collect(),
        }
    }

    fn check_index(&self, index: usize) -> Result<(), QueueError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(QueueError::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }

    fn item_mut(&mut self, id: &ItemId) -> Result<&mut QueueItem, QueueError> {
        self.items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| QueueError::NotInQueue { id: id.to_string() })
    }
}

/// Serde helper: `Option<usize>` on the wire as an integer, `-1` for `None`.
pub mod index_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Option<usize>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(index) => ser.serialize_u64(*index as u64),
            None => ser.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<usize>, D::Error> {
        let raw = i64::deserialize(de)?;
        Ok(usize::try_from(raw).ok())
    }
}
