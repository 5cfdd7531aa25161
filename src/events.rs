//! Change notifications for the presentation layer.
//!
//! The core never calls out into the UI. It appends [`StationEvent`]s to an
//! [`EventQueue`], and the presentation layer drains the queue once per
//! loop iteration, then re-reads whatever changed.

use std::collections::VecDeque;

use crate::address::TrackKey;
use crate::track::TrackChange;

/// Something observable changed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum StationEvent {
    /// The list of connected device names changed.
    DevicesChanged,
    /// Tracks were added or removed.
    TracksChanged,
    /// One field of one track changed.
    TrackChanged {
        /// Which track.
        key: TrackKey,
        /// Which field.
        change: TrackChange,
    },
}

/// FIFO of pending notifications.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<StationEvent>,
}

impl EventQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&mut self, event: StationEvent) {
        self.events.push_back(event);
    }

    /// Append one `TrackChanged` per field.
    pub fn push_track_changes(&mut self, key: &TrackKey, changes: &[TrackChange]) {
        for &change in changes {
            self.push(StationEvent::TrackChanged {
                key: key.clone(),
                change,
            });
        }
    }

    /// Take every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<StationEvent> {
        self.events.drain(..).collect()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
