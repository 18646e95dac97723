//! Window Control - Capture control plane
//!
//! This crate tracks every on-screen window and virtual-desktop monitor as a
//! stable-identity entity, diffs the set each poll cycle, and routes capture
//! requests for tracked entities:
//!
//! - **Tracking**: periodic enumeration into a double-buffered snapshot,
//!   diffed against a registry keyed by handle (windows) or monitor
//!   (desktops)
//! - **Classification**: one-time inference of alt-tab eligibility, UWP
//!   detection, and logical parent at first sight of a window
//! - **Events**: `Added`/`Removed` lifecycle messages queued for the
//!   consumer to drain between cycles
//!
//! # Architecture
//!
//! A dedicated poll thread owns enumeration and the registry write path; the
//! consumer thread reads entities through a reader-writer lock and forwards
//! capture requests through a validating router, so a window that vanished
//! mid-frame is dropped at the boundary instead of reaching the capture
//! backend.

pub mod capture;
pub mod classify;
pub mod config;
pub mod events;
pub mod probe;
pub mod registry;
pub mod snapshot;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use capture::{CaptureRouter, CaptureSink, LoggingCaptureSink};
pub use config::Config;
pub use events::{LifecycleKind, LifecycleMessage, MessageQueue};
pub use probe::{PlatformProbe, WindowProbe};
pub use registry::{WindowEntity, WindowRegistry};
pub use snapshot::{PlatformSnapshot, SnapshotEntry, SnapshotSource};
pub use tracker::WindowTracker;
pub use types::{
    CaptureMode, CapturePriority, MonitorHandle, Point, Rect, TrackerError, WindowHandle,
    WindowId,
};
