//! Lifecycle event queue.
//!
//! The registry appends an `Added` or `Removed` record whenever a tracked
//! entity enters or leaves the registry. The queue is unbounded and owned by
//! the caller: it only grows until the consumer copies it out and calls
//! [`MessageQueue::clear_all`].

use crate::types::{WindowHandle, WindowId};
use serde::Serialize;
use std::sync::Mutex;

/// Kind of lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleKind {
    Added,
    Removed,
}

/// One lifecycle record for a tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifecycleMessage {
    pub kind: LifecycleKind,
    pub window_id: WindowId,
    pub handle: WindowHandle,
}

/// Append-only buffer of lifecycle messages.
///
/// Written by the poll thread, drained by the consumer thread; every
/// operation holds the lock only for the access itself.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: Mutex<Vec<LifecycleMessage>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: LifecycleKind, window_id: WindowId, handle: WindowHandle) {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages.push(LifecycleMessage {
            kind,
            window_id,
            handle,
        });
    }

    /// Number of messages queued since the last clear
    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the queued messages without consuming them.
    ///
    /// The buffer may be cleared or reused after the next cycle, so callers
    /// copy first and call [`MessageQueue::clear_all`] afterwards.
    pub fn snapshot(&self) -> Vec<LifecycleMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Remove every queued message
    pub fn clear_all(&self) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Copy out and clear in one step
    pub fn drain(&self) -> Vec<LifecycleMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_len() {
        let queue = MessageQueue::new();
        assert!(queue.is_empty());

        queue.push(LifecycleKind::Added, 1, WindowHandle::from_raw(0x10));
        queue.push(LifecycleKind::Removed, 1, WindowHandle::from_raw(0x10));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_snapshot_does_not_consume() {
        let queue = MessageQueue::new();
        queue.push(LifecycleKind::Added, 7, WindowHandle::from_raw(0x20));

        let copy = queue.snapshot();
        assert_eq!(copy.len(), 1);
        assert_eq!(copy[0].window_id, 7);
        assert_eq!(copy[0].kind, LifecycleKind::Added);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let queue = MessageQueue::new();
        queue.push(LifecycleKind::Added, 1, WindowHandle::from_raw(0x10));
        queue.clear_all();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain() {
        let queue = MessageQueue::new();
        queue.push(LifecycleKind::Added, 1, WindowHandle::from_raw(0x10));
        queue.push(LifecycleKind::Added, 2, WindowHandle::from_raw(0x20));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }
}
