//! Capture request routing.
//!
//! The tracking core never captures pixels itself; an external collaborator
//! owns the capture and GPU-upload pipeline. This module defines that
//! collaborator's contract and the thin router that validates a window id
//! against the registry before forwarding a request.

use crate::registry::WindowRegistry;
use crate::types::{CapturePriority, WindowId};
use std::sync::Arc;
use tracing::{trace, warn};

/// Contract expected of the external capture/upload collaborator.
///
/// Implementations must be safe to call concurrently from the render thread,
/// must deduplicate so at most one capture is in flight per window id, and
/// must treat priority as a scheduling hint that never blocks the caller.
pub trait CaptureSink: Send + Sync {
    /// Schedule a window capture
    fn request_capture(&self, id: WindowId, priority: CapturePriority);

    /// Schedule an icon capture for a window
    fn request_capture_icon(&self, id: WindowId);

    /// Pump pending capture results into GPU textures
    fn trigger_gpu_upload(&self);
}

/// Sink that only logs, for running the daemon without a capture pipeline.
#[derive(Debug, Default)]
pub struct LoggingCaptureSink;

impl CaptureSink for LoggingCaptureSink {
    fn request_capture(&self, id: WindowId, priority: CapturePriority) {
        trace!("Capture requested: id={} priority={}", id, priority.as_str());
    }

    fn request_capture_icon(&self, id: WindowId) {
        trace!("Icon capture requested: id={}", id);
    }

    fn trigger_gpu_upload(&self) {
        trace!("GPU upload triggered");
    }
}

/// Validating pass-through in front of the capture collaborator.
///
/// Requests naming an untracked id are logged and silently dropped; no
/// error reaches the caller. Holds no scheduling state of its own.
pub struct CaptureRouter {
    sink: Arc<dyn CaptureSink>,
}

impl CaptureRouter {
    pub fn new(sink: Arc<dyn CaptureSink>) -> Self {
        Self { sink }
    }

    pub fn request_capture(
        &self,
        registry: &WindowRegistry,
        id: WindowId,
        priority: CapturePriority,
    ) {
        if !registry.contains(id) {
            warn!("Dropping capture request for unknown window {}", id);
            return;
        }
        self.sink.request_capture(id, priority);
    }

    pub fn request_capture_icon(&self, registry: &WindowRegistry, id: WindowId) {
        if !registry.contains(id) {
            warn!("Dropping icon capture request for unknown window {}", id);
            return;
        }
        self.sink.request_capture_icon(id);
    }

    pub fn trigger_gpu_upload(&self) {
        self.sink.trigger_gpu_upload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MessageQueue;
    use crate::probe::fake::FakeProbe;
    use crate::registry::RegistrySettings;
    use crate::snapshot::SnapshotEntry;
    use crate::types::WindowHandle;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        captures: Mutex<Vec<(WindowId, CapturePriority)>>,
        icons: Mutex<Vec<WindowId>>,
        uploads: Mutex<usize>,
    }

    impl CaptureSink for RecordingSink {
        fn request_capture(&self, id: WindowId, priority: CapturePriority) {
            self.captures.lock().unwrap().push((id, priority));
        }

        fn request_capture_icon(&self, id: WindowId) {
            self.icons.lock().unwrap().push(id);
        }

        fn trigger_gpu_upload(&self) {
            *self.uploads.lock().unwrap() += 1;
        }
    }

    fn tracked_registry() -> (WindowRegistry, WindowId) {
        let mut registry = WindowRegistry::new(RegistrySettings::default());
        let probe = FakeProbe::default();
        let events = MessageQueue::new();
        let entry = SnapshotEntry {
            handle: WindowHandle::from_raw(0x10),
            ..Default::default()
        };
        registry.apply_snapshot(&[entry], &probe, &events);
        let id = registry.entities().next().unwrap().id;
        (registry, id)
    }

    #[test]
    fn test_forwards_requests_for_tracked_ids() {
        let (registry, id) = tracked_registry();
        let sink = Arc::new(RecordingSink::default());
        let router = CaptureRouter::new(sink.clone());

        router.request_capture(&registry, id, CapturePriority::High);
        router.request_capture_icon(&registry, id);
        router.trigger_gpu_upload();

        assert_eq!(
            sink.captures.lock().unwrap().as_slice(),
            &[(id, CapturePriority::High)]
        );
        assert_eq!(sink.icons.lock().unwrap().as_slice(), &[id]);
        assert_eq!(*sink.uploads.lock().unwrap(), 1);
    }

    #[test]
    fn test_drops_requests_for_unknown_ids() {
        let (registry, _id) = tracked_registry();
        let sink = Arc::new(RecordingSink::default());
        let router = CaptureRouter::new(sink.clone());

        router.request_capture(&registry, 9999, CapturePriority::Low);
        router.request_capture_icon(&registry, 9999);

        assert!(sink.captures.lock().unwrap().is_empty());
        assert!(sink.icons.lock().unwrap().is_empty());
    }
}
