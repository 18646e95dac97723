//! Tracker facade and poll loop.
//!
//! [`WindowTracker`] owns the whole per-cycle pipeline: enumerate, commit,
//! diff, classify, emit. The poll thread runs it at a self-correcting fixed
//! cadence; the consumer thread reads tracked entities through a
//! reader-writer lock (the poll thread is the only writer) and forwards
//! capture requests through the validating router.

use crate::capture::{CaptureRouter, CaptureSink};
use crate::config::Config;
use crate::events::{LifecycleMessage, MessageQueue};
use crate::probe::{PlatformProbe, WindowProbe};
use crate::registry::{RegistrySettings, WindowEntity, WindowRegistry};
use crate::snapshot::{
    sort_unowned_first, PlatformSnapshot, SnapshotChannel, SnapshotEntry, SnapshotSource,
};
use crate::types::{CaptureMode, CapturePriority, Point, TrackerError, WindowId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One poll cycle end-to-end, owned by the poll thread.
struct PollWorker {
    source: Box<dyn SnapshotSource>,
    building: Vec<SnapshotEntry>,
    channel: Arc<SnapshotChannel>,
    registry: Arc<RwLock<WindowRegistry>>,
    probe: Arc<dyn WindowProbe>,
    events: Arc<MessageQueue>,
}

impl PollWorker {
    /// enumerate → commit → diff → classify → emit → cursor resolve
    fn cycle(&mut self) {
        let ok = self.source.enumerate(&mut self.building);
        if !ok {
            // A failed walk hides windows; diffing the partial list would
            // fabricate Removed events for all of them. Keep the previous
            // committed snapshot and leave the registry untouched.
            self.building.clear();
            return;
        }

        sort_unowned_first(&mut self.building);
        self.channel.commit(&mut self.building);

        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        self.channel.with_committed(|entries| {
            registry.apply_snapshot(entries, self.probe.as_ref(), &self.events);
        });

        let cursor_id = self.probe.cursor_pos().and_then(|pos| {
            registry
                .resolve_window_at(pos, self.probe.as_ref())
                .map(|entity| entity.id)
        });
        registry.set_cursor_window(cursor_id);
    }

    /// Self-correcting fixed-interval loop: each iteration sleeps only the
    /// remainder of the interval, so cadence tracks the target even under
    /// variable per-cycle cost. Shutdown is cooperative; the in-progress
    /// iteration always completes.
    fn run(mut self, interval: Duration, stop: Arc<AtomicBool>) {
        debug!("Poll thread running at {:?} interval", interval);
        while !stop.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.cycle();
            if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
        debug!("Poll thread stopped");
    }
}

/// Control plane for the capture pipeline: tracks every on-screen window
/// and virtual-desktop monitor, keeps identities stable across cycles, and
/// publishes lifecycle events for the consumer to drain.
pub struct WindowTracker {
    config: Config,
    registry: Arc<RwLock<WindowRegistry>>,
    events: Arc<MessageQueue>,
    channel: Arc<SnapshotChannel>,
    probe: Arc<dyn WindowProbe>,
    router: CaptureRouter,
    source: Option<Box<dyn SnapshotSource>>,
    worker: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl WindowTracker {
    /// Create a tracker backed by the host OS.
    pub fn new(config: Config, sink: Arc<dyn CaptureSink>) -> Self {
        Self::with_backend(
            config,
            Box::new(PlatformSnapshot),
            Arc::new(PlatformProbe),
            sink,
        )
    }

    /// Create a tracker with explicit enumeration and probe backends.
    pub fn with_backend(
        config: Config,
        source: Box<dyn SnapshotSource>,
        probe: Arc<dyn WindowProbe>,
        sink: Arc<dyn CaptureSink>,
    ) -> Self {
        let settings = RegistrySettings::from_config(&config);
        Self {
            config,
            registry: Arc::new(RwLock::new(WindowRegistry::new(settings))),
            events: Arc::new(MessageQueue::new()),
            channel: Arc::new(SnapshotChannel::new()),
            probe,
            router: CaptureRouter::new(sink),
            source: Some(source),
            worker: None,
        }
    }

    /// Start the poll thread.
    pub fn start(&mut self) -> Result<(), TrackerError> {
        if self.worker.is_some() {
            return Err(TrackerError::AlreadyRunning);
        }
        let source = self.source.take().ok_or(TrackerError::AlreadyRunning)?;

        let worker = PollWorker {
            source,
            building: Vec::new(),
            channel: self.channel.clone(),
            registry: self.registry.clone(),
            probe: self.probe.clone(),
            events: self.events.clone(),
        };
        let interval = Duration::from_millis(self.config.polling.interval_ms);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = std::thread::Builder::new()
            .name("window-poll".to_string())
            .spawn(move || worker.run(interval, stop_flag))?;

        info!("Window tracking started ({}ms interval)", interval.as_millis());
        self.worker = Some((stop, handle));
        Ok(())
    }

    /// Stop the poll thread and join it. The current iteration, including
    /// any in-progress sleep, completes first.
    pub fn stop(&mut self) {
        if let Some((stop, handle)) = self.worker.take() {
            stop.store(true, Ordering::Relaxed);
            if handle.join().is_err() {
                debug!("Poll thread panicked before join");
            }
            info!("Window tracking stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, WindowRegistry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, WindowRegistry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Tracked entity by id
    pub fn get_window(&self, id: WindowId) -> Option<WindowEntity> {
        self.read().get(id).cloned()
    }

    pub fn check_existence(&self, id: WindowId) -> bool {
        self.read().contains(id)
    }

    /// All tracked entities, cloned out of the registry
    pub fn windows(&self) -> Vec<WindowEntity> {
        self.read().entities().cloned().collect()
    }

    pub fn window_count(&self) -> usize {
        self.read().len()
    }

    /// Tracked entity under a screen point
    pub fn get_window_from_point(&self, point: Point) -> Option<WindowEntity> {
        self.read()
            .resolve_window_at(point, self.probe.as_ref())
            .cloned()
    }

    /// Tracked entity under the pointer, as cached by the latest cycle
    pub fn get_cursor_window(&self) -> Option<WindowEntity> {
        self.read().cursor_window().cloned()
    }

    /// Forward a capture request for a tracked window; unknown ids are
    /// logged and dropped
    pub fn request_capture(&self, id: WindowId, priority: CapturePriority) {
        self.router.request_capture(&self.read(), id, priority);
    }

    /// Forward an icon capture request for a tracked window
    pub fn request_capture_icon(&self, id: WindowId) {
        self.router.request_capture_icon(&self.read(), id);
    }

    /// Pump the capture collaborator's GPU upload
    pub fn trigger_gpu_upload(&self) {
        self.router.trigger_gpu_upload();
    }

    /// Ask the next cycle to refresh an entity's title
    pub fn request_title_update(&self, id: WindowId) -> bool {
        self.write().request_title_update(id)
    }

    pub fn set_capture_mode(&self, id: WindowId, mode: CaptureMode) -> bool {
        self.write().set_capture_mode(id, mode)
    }

    pub fn set_draw_cursor(&self, id: WindowId, draw_cursor: bool) -> bool {
        self.write().set_draw_cursor(id, draw_cursor)
    }

    /// Number of queued lifecycle messages
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Copy out queued lifecycle messages without consuming them
    pub fn events(&self) -> Vec<LifecycleMessage> {
        self.events.snapshot()
    }

    /// Clear the lifecycle queue
    pub fn clear_events(&self) {
        self.events.clear_all();
    }

    /// Copy out and clear in one step
    pub fn drain_events(&self) -> Vec<LifecycleMessage> {
        self.events.drain()
    }
}

impl Drop for WindowTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
