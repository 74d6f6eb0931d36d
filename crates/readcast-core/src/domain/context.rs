//! Playback context and live-feed navigation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::item::{ItemId, QueueItem};
use super::queue::Queue;

/// What "next" means for the item being played.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackContext {
    /// A one-off play; there is no next item.
    #[default]
    Standalone,
    /// Advance through the queue in order, stopping at the end.
    FromQueue,
    /// Round-robin one unlistened stream item per feed group.
    FromLiveFeed {
        #[serde(rename = "feedGroup")]
        feed_group: String,
    },
}

impl PlaybackContext {
    pub fn live_feed(feed_group: impl Into<String>) -> Self {
        Self::FromLiveFeed {
            feed_group: feed_group.into(),
        }
    }

    #[must_use]
    pub const fn is_live_feed(&self) -> bool {
        matches!(self, Self::FromLiveFeed { .. })
    }
}

/// Pick the next live-feed item after `current_group`.
///
/// Groups are the queue's [`Queue::feed_groups`]. Only groups after the
/// current one are considered, so navigation ends once the last group is
/// exhausted. Within a group the most recently added stream item that is
/// unlistened and not in `played` wins. Returns the queue index and the group
/// label of the chosen item.
#[must_use]
pub fn select_next_live_item(
    queue: &Queue,
    current_group: &str,
    played: &HashSet<ItemId>,
) -> Option<(usize, String)> {
    let groups = queue.feed_groups();
    let start = groups
        .iter()
        .position(|g| g == current_group)
        .map_or(0, |i| i + 1);

    groups[start..].iter().find_map(|group| {
        latest_candidate(queue.items(), group, played).map(|index| (index, group.clone()))
    })
}

fn latest_candidate(items: &[QueueItem], group: &str, played: &HashSet<ItemId>) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            item.is_stream()
                && item.feed_label() == Some(group)
                && !item.listened
                && !played.contains(&item.id)
        })
        .max_by(|(ia, a), (ib, b)| a.added_at.cmp(&b.added_at).then(ia.cmp(ib)))
        .map(|(index, _)| index)
}
