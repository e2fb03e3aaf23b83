//! Single-consumer event queue.
//!
//! A thin wrapper over tokio's bounded and unbounded `mpsc` channels so the
//! machine can pick either at construction time. The stop signal travels
//! through the same channel as events, so it is observed only after every
//! event queued before it.

use crate::core::EventId;
use crate::runtime::error::MachineError;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Item carried by the event queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QueueItem {
    Event(EventId),
    Stop,
}

#[derive(Clone)]
pub(crate) enum EventSender {
    Bounded(mpsc::Sender<QueueItem>),
    Unbounded(mpsc::UnboundedSender<QueueItem>),
}

pub(crate) enum EventReceiver {
    Bounded(mpsc::Receiver<QueueItem>),
    Unbounded(mpsc::UnboundedReceiver<QueueItem>),
}

/// Create a queue holding at most `capacity` items, or unbounded for `0`.
pub(crate) fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    if capacity == 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender::Unbounded(tx), EventReceiver::Unbounded(rx))
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (EventSender::Bounded(tx), EventReceiver::Bounded(rx))
    }
}

impl EventSender {
    /// Enqueue an item, waiting for space when the queue is bounded and full.
    pub(crate) async fn send(&self, item: QueueItem) -> Result<(), MachineError> {
        match self {
            Self::Bounded(tx) => tx.send(item).await.map_err(|_| MachineError::QueueClosed),
            Self::Unbounded(tx) => tx.send(item).map_err(|_| MachineError::QueueClosed),
        }
    }

    /// Enqueue an item without waiting.
    pub(crate) fn try_send(&self, item: QueueItem) -> Result<(), MachineError> {
        match self {
            Self::Bounded(tx) => tx.try_send(item).map_err(|e| match e {
                TrySendError::Full(_) => MachineError::QueueFull,
                TrySendError::Closed(_) => MachineError::QueueClosed,
            }),
            Self::Unbounded(tx) => tx.send(item).map_err(|_| MachineError::QueueClosed),
        }
    }
}

impl EventReceiver {
    /// Wait for the next item. `None` once every sender is gone.
    pub(crate) async fn recv(&mut self) -> Option<QueueItem> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Take the next item if one is already queued.
    pub(crate) fn try_recv(&mut self) -> Option<QueueItem> {
        match self {
            Self::Bounded(rx) => rx.try_recv().ok(),
            Self::Unbounded(rx) => rx.try_recv().ok(),
        }
    }

    /// Refuse further items. Producers waiting for space fail with
    /// [`MachineError::QueueClosed`]; items already queued can still be taken.
    pub(crate) fn close(&mut self) {
        match self {
            Self::Bounded(rx) => rx.close(),
            Self::Unbounded(rx) => rx.close(),
        }
    }

    /// Discard everything currently queued, returning how many items were dropped.
    pub(crate) fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.try_recv().is_some() {
            dropped += 1;
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> QueueItem {
        QueueItem::Event(EventId::from(id))
    }

    #[tokio::test]
    async fn items_arrive_in_order() {
        let (tx, mut rx) = event_queue(0);
        tx.send(event("a")).await.unwrap();
        tx.send(event("b")).await.unwrap();
        tx.send(QueueItem::Stop).await.unwrap();

        assert_eq!(rx.recv().await, Some(event("a")));
        assert_eq!(rx.recv().await, Some(event("b")));
        assert_eq!(rx.recv().await, Some(QueueItem::Stop));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn bounded_queue_reports_full() {
        let (tx, mut rx) = event_queue(1);
        tx.try_send(event("a")).unwrap();

        assert!(matches!(tx.try_send(event("b")), Err(MachineError::QueueFull)));

        assert_eq!(rx.try_recv(), Some(event("a")));
        tx.try_send(event("b")).unwrap();
    }

    #[tokio::test]
    async fn drain_empties_queue() {
        let (tx, mut rx) = event_queue(0);
        for id in ["a", "b", "c"] {
            tx.send(event(id)).await.unwrap();
        }

        assert_eq!(rx.drain(), 3);
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn close_wakes_waiting_producer() {
        let (tx, mut rx) = event_queue(1);
        tx.send(event("a")).await.unwrap();

        let waiting = tokio::spawn(async move { tx.send(event("b")).await });
        tokio::task::yield_now().await;
        rx.close();

        assert!(matches!(waiting.await.unwrap(), Err(MachineError::QueueClosed)));
        assert_eq!(rx.drain(), 1);
    }

    #[tokio::test]
    async fn closed_queue_rejects_items() {
        let (tx, rx) = event_queue(2);
        drop(rx);

        assert!(matches!(tx.send(event("a")).await, Err(MachineError::QueueClosed)));
        assert!(matches!(tx.try_send(event("a")), Err(MachineError::QueueClosed)));
    }
}
