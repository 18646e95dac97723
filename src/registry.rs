//! Identity registry and snapshot differ.
//!
//! The registry matches each cycle's snapshot entries against the tracked
//! entity set, keeping ids stable for as long as an entity's handle keeps
//! appearing. New entities get their one-time classification and an `Added`
//! message; entities missing from the snapshot are removed the same cycle
//! with a `Removed` message. Lookup is a linear scan over tracked entities,
//! acceptable because live window counts stay in the tens to low hundreds.

use crate::classify;
use crate::config::Config;
use crate::events::{LifecycleKind, MessageQueue};
use crate::probe::WindowProbe;
use crate::snapshot::SnapshotEntry;
use crate::types::{CaptureMode, MonitorHandle, Point, Rect, WindowHandle, WindowId};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

/// Upper bound on the ancestor walk during point resolution, in case the OS
/// reports a malformed parent chain
const MAX_ANCESTOR_DEPTH: usize = 64;

/// Tunables the registry needs from the daemon configuration.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Timeout for the fallback title query
    pub title_timeout: Duration,
    /// Titles longer than this are treated as retrieval failures
    pub title_max_len: usize,
    /// Capture mode for newly tracked windows
    pub window_capture_mode: CaptureMode,
    /// Capture mode for newly tracked desktops
    pub desktop_capture_mode: CaptureMode,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            title_timeout: Duration::from_millis(100),
            title_max_len: 256,
            window_capture_mode: CaptureMode::GraphicsCapture,
            desktop_capture_mode: CaptureMode::BitBlt,
        }
    }
}

impl RegistrySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            title_timeout: Duration::from_millis(config.polling.title_timeout_ms),
            title_max_len: config.polling.title_max_len,
            window_capture_mode: config.capture.window_mode,
            desktop_capture_mode: config.capture.desktop_mode,
        }
    }
}

/// Identity-stable record for one tracked window or desktop.
///
/// Raw fields (rects, z-order, owner and monitor handles) are overwritten
/// from the snapshot every cycle. One-time fields (process/thread ids, class
/// name, the classification flags, the inferred parent) are computed exactly
/// once, when `frame_count == 0`, and never recomputed even if the
/// underlying OS state changes. Only `title` and `is_background` are
/// refreshed per cycle.
#[derive(Debug, Clone)]
pub struct WindowEntity {
    pub id: WindowId,
    pub handle: WindowHandle,
    pub owner_handle: WindowHandle,
    pub raw_parent_handle: WindowHandle,
    /// Set only for desktop entities
    pub monitor_handle: MonitorHandle,
    pub window_rect: Rect,
    pub client_rect: Rect,
    pub z_order: u32,
    pub process_id: u32,
    pub thread_id: u32,
    pub class_name: String,
    pub title: String,
    pub is_desktop: bool,
    pub is_alt_tab: bool,
    pub is_application_frame_window: bool,
    pub is_uwp: bool,
    pub is_background: bool,
    pub inferred_parent_id: Option<WindowId>,
    /// Cycles survived; zero marks "not yet classified"
    pub frame_count: u64,
    pub capture_mode: CaptureMode,
    pub draw_cursor: bool,
    is_alive: bool,
    title_update_requested: bool,
}

impl WindowEntity {
    fn new(id: WindowId, handle: WindowHandle, capture_mode: CaptureMode) -> Self {
        Self {
            id,
            handle,
            owner_handle: WindowHandle::default(),
            raw_parent_handle: WindowHandle::default(),
            monitor_handle: MonitorHandle::default(),
            window_rect: Rect::default(),
            client_rect: Rect::default(),
            z_order: 0,
            process_id: 0,
            thread_id: 0,
            class_name: String::new(),
            title: String::new(),
            is_desktop: false,
            is_alt_tab: false,
            is_application_frame_window: false,
            is_uwp: false,
            is_background: false,
            inferred_parent_id: None,
            frame_count: 0,
            capture_mode,
            draw_cursor: true,
            is_alive: false,
            title_update_requested: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(id: WindowId, handle: WindowHandle) -> Self {
        Self::new(id, handle, CaptureMode::GraphicsCapture)
    }
}

/// Tracked entity set and the per-cycle diff pass.
#[derive(Debug)]
pub struct WindowRegistry {
    windows: HashMap<WindowId, WindowEntity>,
    next_id: WindowId,
    cursor_window_id: Option<WindowId>,
    settings: RegistrySettings,
}

impl WindowRegistry {
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            windows: HashMap::new(),
            next_id: 1,
            cursor_window_id: None,
            settings,
        }
    }

    /// Diff one committed snapshot against the tracked set.
    ///
    /// Entities missing from the snapshot are removed the same cycle they
    /// are first observed absent, with no grace period: one missed
    /// enumeration therefore yields a Removed/Added pair for the same
    /// underlying window.
    pub fn apply_snapshot(
        &mut self,
        entries: &[SnapshotEntry],
        probe: &dyn WindowProbe,
        events: &MessageQueue,
    ) {
        for entity in self.windows.values_mut() {
            entity.is_alive = false;
        }

        for entry in entries {
            let id = self.find_or_add(entry);

            let is_new = {
                let Some(entity) = self.windows.get_mut(&id) else {
                    continue;
                };
                entity.handle = entry.handle;
                entity.owner_handle = entry.owner;
                entity.monitor_handle = entry.monitor;
                entity.window_rect = entry.window_rect;
                entity.client_rect = entry.client_rect;
                entity.z_order = entry.z_order;
                entity.is_desktop = entry.is_desktop;
                entity.is_alive = true;
                entity.frame_count == 0
            };

            if is_new {
                self.classify_new(id, entry, entries, probe);
                if let Some(entity) = self.windows.get(&id) {
                    trace!(
                        "Window added: id={} handle={:?} class={:?}",
                        id,
                        entity.handle,
                        entity.class_name
                    );
                    events.push(LifecycleKind::Added, id, entity.handle);
                }
            } else if let Some(entity) = self.windows.get_mut(&id) {
                if entity.title_update_requested || entity.title.is_empty() {
                    entity.title_update_requested = false;
                    refresh_title(entity, probe, &self.settings);
                }
                if !entity.is_desktop {
                    entity.is_background = probe.is_background(entity.handle);
                }
            }

            if let Some(entity) = self.windows.get_mut(&id) {
                entity.frame_count += 1;
            }
        }

        let dead: Vec<(WindowId, WindowHandle)> = self
            .windows
            .values()
            .filter(|entity| !entity.is_alive)
            .map(|entity| (entity.id, entity.handle))
            .collect();
        for (id, handle) in dead {
            trace!("Window removed: id={} handle={:?}", id, handle);
            events.push(LifecycleKind::Removed, id, handle);
            self.windows.remove(&id);
        }
    }

    /// Locate the tracked entity for a snapshot entry, creating one with the
    /// next id if none exists. Windows match by handle, desktops by monitor
    /// handle (every desktop entry shares the one desktop window handle).
    fn find_or_add(&mut self, entry: &SnapshotEntry) -> WindowId {
        let existing = self.windows.values().find(|entity| {
            if entry.is_desktop {
                entity.is_desktop && entity.monitor_handle == entry.monitor
            } else {
                !entity.is_desktop && entity.handle == entry.handle
            }
        });
        if let Some(entity) = existing {
            return entity.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        let capture_mode = if entry.is_desktop {
            self.settings.desktop_capture_mode
        } else {
            self.settings.window_capture_mode
        };
        self.windows
            .insert(id, WindowEntity::new(id, entry.handle, capture_mode));
        id
    }

    /// One-time classification and hierarchy inference for a new entity.
    fn classify_new(
        &mut self,
        id: WindowId,
        entry: &SnapshotEntry,
        entries: &[SnapshotEntry],
        probe: &dyn WindowProbe,
    ) {
        let subject = {
            let Some(entity) = self.windows.get_mut(&id) else {
                return;
            };

            let (process_id, thread_id) = probe.process_ids(entity.handle);
            entity.process_id = process_id;
            entity.thread_id = thread_id;

            if entity.is_desktop {
                entity.raw_parent_handle = WindowHandle::default();
                entity.class_name = String::new();
                entity.is_alt_tab = false;
                entity.is_application_frame_window = false;
                entity.is_uwp = false;
                entity.is_background = false;
            } else {
                entity.raw_parent_handle = probe.raw_parent(entity.handle);
                entity.class_name = probe.class_name(entity.handle).unwrap_or_default();
                entity.is_application_frame_window =
                    classify::is_shell_wrapper(&entity.class_name);
                entity.is_uwp = probe.is_packaged(process_id);

                let full_screen = monitor_bounds(entries, entry.monitor)
                    .map(|bounds| classify::is_full_screen(entity.client_rect, bounds))
                    .unwrap_or(false);
                entity.is_alt_tab = classify::is_alt_tab(probe.styles(entity.handle), full_screen);
                entity.is_background = probe.is_background(entity.handle);
            }

            refresh_title(entity, probe, &self.settings);
            entity.clone()
        };

        let parent_id = classify::infer_parent(&subject, self.windows.values());
        if let Some(entity) = self.windows.get_mut(&id) {
            entity.inferred_parent_id = parent_id;
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    pub fn get(&self, id: WindowId) -> Option<&WindowEntity> {
        let entity = self.windows.get(&id);
        if entity.is_none() {
            debug!("Window {} does not exist", id);
        }
        entity
    }

    pub fn entities(&self) -> impl Iterator<Item = &WindowEntity> {
        self.windows.values()
    }

    pub fn find_by_handle(&self, handle: WindowHandle) -> Option<&WindowEntity> {
        self.windows.values().find(|entity| entity.handle == handle)
    }

    /// Resolve the tracked entity under a screen point.
    ///
    /// Hit-tests the point, then walks the raw handle's ancestor chain: an
    /// exact handle match wins at each step, otherwise the frontmost tracked
    /// entity sharing the raw handle's process and thread substitutes. The
    /// walk terminates when the chain is exhausted.
    pub fn resolve_window_at(
        &self,
        point: Point,
        probe: &dyn WindowProbe,
    ) -> Option<&WindowEntity> {
        let mut raw = probe.window_at(point)?;

        for _ in 0..MAX_ANCESTOR_DEPTH {
            if let Some(entity) = self.find_by_handle(raw) {
                return Some(entity);
            }

            let (process_id, thread_id) = probe.process_ids(raw);
            let substitute = self
                .windows
                .values()
                .filter(|entity| {
                    entity.process_id == process_id && entity.thread_id == thread_id
                })
                .min_by_key(|entity| entity.z_order);
            if let Some(entity) = substitute {
                return Some(entity);
            }

            raw = probe.ancestor(raw)?;
        }

        None
    }

    /// Cached "window under cursor" from the latest cycle, as an id lookup
    /// so a stale id reads as absent
    pub fn cursor_window(&self) -> Option<&WindowEntity> {
        self.cursor_window_id.and_then(|id| self.windows.get(&id))
    }

    pub fn set_cursor_window(&mut self, id: Option<WindowId>) {
        self.cursor_window_id = id;
    }

    /// Ask the next cycle to refresh an entity's title
    pub fn request_title_update(&mut self, id: WindowId) -> bool {
        match self.windows.get_mut(&id) {
            Some(entity) => {
                entity.title_update_requested = true;
                true
            }
            None => {
                debug!("Window {} does not exist", id);
                false
            }
        }
    }

    pub fn set_capture_mode(&mut self, id: WindowId, mode: CaptureMode) -> bool {
        match self.windows.get_mut(&id) {
            Some(entity) => {
                entity.capture_mode = mode;
                true
            }
            None => {
                debug!("Window {} does not exist", id);
                false
            }
        }
    }

    pub fn set_draw_cursor(&mut self, id: WindowId, draw_cursor: bool) -> bool {
        match self.windows.get_mut(&id) {
            Some(entity) => {
                entity.draw_cursor = draw_cursor;
                true
            }
            None => {
                debug!("Window {} does not exist", id);
                false
            }
        }
    }
}

/// Monitor bounds for the full-screen test, taken from the same cycle's
/// desktop entry for that monitor.
fn monitor_bounds(entries: &[SnapshotEntry], monitor: MonitorHandle) -> Option<Rect> {
    entries
        .iter()
        .find(|entry| entry.is_desktop && entry.monitor == monitor)
        .map(|entry| entry.window_rect)
}

/// Refresh a title, falling back to the bounded-timeout query for slow
/// windows.
fn refresh_title(entity: &mut WindowEntity, probe: &dyn WindowProbe, settings: &RegistrySettings) {
    let title = probe.title(entity.handle).or_else(|| {
        probe.title_with_timeout(entity.handle, settings.title_timeout, settings.title_max_len)
    });
    if let Some(title) = title {
        entity.title = title;
    }
}
