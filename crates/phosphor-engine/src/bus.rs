//! The in-process event bus: multi-subscriber pub/sub over
//! crossbeam channels.

use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender};

use phosphor_core::event::{EngineEvent, EventSink};

/// Multi-subscriber event bus.
///
/// Publishing clones the event to every live subscriber; subscribers
/// that dropped their receiver are pruned on the next publish. Channels
/// are unbounded: the core never blocks on a slow observer.
#[derive(Debug, Default)]
pub struct EventBus {
    senders: Mutex<Vec<Sender<EngineEvent>>>,
}

impl EventBus {
    /// A bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Ok(mut senders) = self.senders.lock() {
            senders.push(tx);
        }
        rx
    }

    /// Number of live subscribers (after pruning on the last publish).
    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: EngineEvent) {
        if let Ok(mut senders) = self.senders.lock() {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phosphor_core::id::{CompileId, Revision};

    fn event() -> EngineEvent {
        EngineEvent::CompileStart {
            revision: Revision(1),
            compile: CompileId(1),
        }
    }

    #[test]
    fn all_subscribers_receive() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.emit(event());
        assert_eq!(a.try_recv().unwrap(), event());
        assert_eq!(b.try_recv().unwrap(), event());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        {
            let _dropped = bus.subscribe();
        }
        bus.emit(event());
        assert_eq!(bus.subscriber_count(), 1);
        assert!(a.try_recv().is_ok());
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.emit(event());
    }
}
