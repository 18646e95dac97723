//! Core types used throughout the window-control core.
//!
//! This module defines the fundamental data structures for window tracking:
//! opaque platform handles, screen geometry, capture settings, and the
//! crate-wide error type.

use serde::{Deserialize, Serialize};

/// Identifier assigned to a tracked window or desktop.
///
/// Ids are handed out from a monotonically increasing counter and are never
/// reused for the lifetime of a registry.
pub type WindowId = i32;

/// Opaque, equality-comparable reference to an OS window.
///
/// Raw handle bits are kept private to the platform layer; the rest of the
/// crate only compares handles, never interprets them. Serializes as the raw
/// value for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct WindowHandle(isize);

impl WindowHandle {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> isize {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Opaque, equality-comparable reference to an attached monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MonitorHandle(isize);

impl MonitorHandle {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> isize {
        self.0
    }
}

/// A point in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An edge-based screen rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Check if a point is inside this rect
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x < self.right && point.y >= self.top && point.y < self.bottom
    }
}

/// How the capture collaborator should grab an entity's pixels.
///
/// Opaque to the tracking core; stored per entity and forwarded as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// Modern capture path for regular windows
    GraphicsCapture,
    /// Fallback used for desktop entities
    BitBlt,
    /// Legacy per-window capture
    PrintWindow,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::GraphicsCapture => "graphics-capture",
            CaptureMode::BitBlt => "bitblt",
            CaptureMode::PrintWindow => "print-window",
        }
    }
}

/// Scheduling priority for a capture request.
///
/// Orders work inside the capture collaborator; never blocks the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapturePriority {
    Low,
    Middle,
    High,
}

impl CapturePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapturePriority::Low => "low",
            CapturePriority::Middle => "middle",
            CapturePriority::High => "high",
        }
    }
}

/// Errors surfaced by the tracking core.
///
/// Platform-call failures during enumeration are logged and the cycle
/// continues with partial data; only caller-facing operations return these.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("platform call {api} failed with code {code}")]
    PlatformCall { api: &'static str, code: u32 },

    #[error("window not found: {0}")]
    WindowNotFound(WindowId),

    #[error("poll thread already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
