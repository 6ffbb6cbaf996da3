//! Change notifications emitted by the [`PalaceStore`][crate::store::PalaceStore].
//!
//! Every command that changes state publishes a [`StoreEvent`] on a
//! [`tokio::sync::broadcast`] channel so views can re-query exactly what
//! changed.  Publishing while nobody is subscribed is normal and silently
//! drops the event.

use palace_types::Mode;
use tokio::sync::broadcast;

/// Default channel capacity (events buffered before slow subscribers lag).
const DEFAULT_CAPACITY: usize = 64;

/// What changed in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A palace was created, loaded, imported or saved.
    PalaceChanged { palace_id: String },
    /// The active room changed.
    RoomChanged { room_id: String },
    /// Objects were added, updated or removed in a room.
    ObjectsChanged { room_id: String },
    SelectionChanged { object_id: Option<String> },
    ModeChanged(Mode),
    PlacingChanged {
        placing: bool,
        object_type: Option<String>,
    },
    /// The running quiz moved to another question or was rescored.
    QuizChanged {
        current_index: usize,
        score: u32,
        mistakes: u32,
    },
    /// A quiz finished and was written to the results log.
    QuizCompleted {
        session_id: String,
        score: u32,
        mistakes: u32,
    },
}

/// Broadcast sender for [`StoreEvent`]s.  Clones share one channel.
#[derive(Clone, Debug)]
pub struct StoreEvents {
    sender: broadcast::Sender<StoreEvent>,
}

impl StoreEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `event`, returning how many subscribers received it.
    pub fn publish(&self, event: StoreEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }
}

impl Default for StoreEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let events = StoreEvents::default();
        assert_eq!(events.publish(StoreEvent::ModeChanged(Mode::Edit)), 0);
    }

    #[test]
    fn every_subscriber_sees_every_event() {
        let events = StoreEvents::default();
        let mut a = events.subscribe();
        let mut b = events.subscribe();
        assert_eq!(events.publish(StoreEvent::ModeChanged(Mode::Quiz)), 2);
        assert_eq!(a.try_recv().unwrap(), StoreEvent::ModeChanged(Mode::Quiz));
        assert_eq!(b.try_recv().unwrap(), StoreEvent::ModeChanged(Mode::Quiz));
    }

    #[test]
    fn clones_share_the_channel() {
        let events = StoreEvents::default();
        let mut rx = events.subscribe();
        let clone = events.clone();
        clone.publish(StoreEvent::SelectionChanged { object_id: None });
        assert_eq!(
            rx.try_recv().unwrap(),
            StoreEvent::SelectionChanged { object_id: None }
        );
    }
}
