//! Per-cycle enumeration of OS windows and monitors.
//!
//! Once per poll cycle the [`SnapshotSource`] walks every top-level window
//! and every attached monitor, producing a flat list of raw observations.
//! Destroyed, invisible, and unresponsive windows are skipped during the
//! walk so no later query can block on them. The finished list is handed to
//! the diff stage through the double-buffered [`SnapshotChannel`].

use crate::types::{MonitorHandle, Rect, WindowHandle};
use std::sync::Mutex;

/// One observed window or monitor, valid for a single poll cycle.
///
/// Desktop entries are synthesized per monitor with the monitor bounds as
/// both rects and a z-order of zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotEntry {
    pub handle: WindowHandle,
    /// Owner window, null if unowned
    pub owner: WindowHandle,
    pub window_rect: Rect,
    pub client_rect: Rect,
    /// Count of visible, valid windows preceding this one in front-to-back
    /// enumeration order
    pub z_order: u32,
    pub monitor: MonitorHandle,
    pub is_desktop: bool,
}

impl SnapshotEntry {
    pub fn is_owned(&self) -> bool {
        !self.owner.is_null()
    }
}

/// Seam for the per-cycle enumeration walk.
///
/// The platform implementation fails open: a platform-call failure is logged
/// and whatever was collected before it stays in `out`. Returns `false` when
/// an enumeration call itself reported failure, in which case the cycle
/// discards the partial list rather than diffing against it (a failed walk
/// hides windows, and diffing the partial list would fabricate `Removed`
/// events for every window the failure hid).
pub trait SnapshotSource: Send {
    fn enumerate(&mut self, out: &mut Vec<SnapshotEntry>) -> bool;
}

/// Enumeration source backed by the host OS.
#[derive(Debug, Default)]
pub struct PlatformSnapshot;

impl SnapshotSource for PlatformSnapshot {
    fn enumerate(&mut self, out: &mut Vec<SnapshotEntry>) -> bool {
        platform::enumerate(out)
    }
}

/// Stable sort placing unowned entries before owned ones.
///
/// Ownership, not z-order, is the sort key at this stage: z-order was
/// computed during enumeration and is carried as data. Relative order is
/// otherwise preserved so owners are always diffed before the windows they
/// own.
pub fn sort_unowned_first(entries: &mut [SnapshotEntry]) {
    entries.sort_by_key(|entry| entry.is_owned());
}

/// Double-buffered hand-off between the enumeration walk and the diff stage.
///
/// The builder fills its own buffer without any lock; [`commit`] swaps it
/// with the committed buffer under a lock held only for the swap, so lock
/// hold time is O(1) regardless of window count.
///
/// [`commit`]: SnapshotChannel::commit
#[derive(Debug, Default)]
pub struct SnapshotChannel {
    committed: Mutex<Vec<SnapshotEntry>>,
}

impl SnapshotChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a finished enumeration.
    ///
    /// Swaps `building` with the committed buffer and clears `building` for
    /// the next cycle.
    pub fn commit(&self, building: &mut Vec<SnapshotEntry>) {
        {
            let mut committed = self.committed.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::swap(&mut *committed, building);
        }
        building.clear();
    }

    /// Run `f` over the latest committed snapshot.
    ///
    /// Only the poll thread reads the committed buffer (the consumer reads
    /// the registry, never the channel), so this read is uncontended; the
    /// lock exists to bound the commit swap.
    pub fn with_committed<R>(&self, f: impl FnOnce(&[SnapshotEntry]) -> R) -> R {
        let committed = self.committed.lock().unwrap_or_else(|e| e.into_inner());
        f(&committed)
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use super::*;
    use tracing::{error, trace};
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT, TRUE};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, MonitorFromWindow, HDC, HMONITOR, MONITOR_DEFAULTTOPRIMARY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetClientRect, GetDesktopWindow, GetWindow, GetWindowRect, IsHungAppWindow,
        IsWindow, IsWindowVisible, GW_HWNDPREV, GW_OWNER,
    };

    pub fn enumerate(out: &mut Vec<SnapshotEntry>) -> bool {
        let mut ok = true;

        // EnumWindows callback receives a raw pointer to our Vec
        unsafe {
            if let Err(e) = EnumWindows(
                Some(enum_windows_callback),
                LPARAM(out as *mut Vec<SnapshotEntry> as isize),
            ) {
                error!("EnumWindows failed with code {}", e.code().0 as u32);
                ok = false;
            }

            if !EnumDisplayMonitors(
                None,
                None,
                Some(enum_monitors_callback),
                LPARAM(out as *mut Vec<SnapshotEntry> as isize),
            )
            .as_bool()
            {
                error!("EnumDisplayMonitors failed");
                ok = false;
            }
        }

        trace!("Enumerated {} entries", out.len());
        ok
    }

    /// Callback for EnumWindows that filters and records one window.
    unsafe extern "system" fn enum_windows_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let out = &mut *(lparam.0 as *mut Vec<SnapshotEntry>);

        // Skip destroyed, invisible, and unresponsive windows entirely so no
        // later query can block on them
        if !IsWindow(Some(hwnd)).as_bool()
            || !IsWindowVisible(hwnd).as_bool()
            || IsHungAppWindow(hwnd).as_bool()
        {
            return TRUE;
        }

        let owner = GetWindow(hwnd, GW_OWNER).unwrap_or_default();

        let mut window_rect = RECT::default();
        let _ = GetWindowRect(hwnd, &mut window_rect);
        let mut client_rect = RECT::default();
        let _ = GetClientRect(hwnd, &mut client_rect);

        let monitor = MonitorFromWindow(hwnd, MONITOR_DEFAULTTOPRIMARY);

        out.push(SnapshotEntry {
            handle: WindowHandle::from_raw(hwnd.0 as isize),
            owner: WindowHandle::from_raw(owner.0 as isize),
            window_rect: rect_from(window_rect),
            client_rect: rect_from(client_rect),
            z_order: z_order_of(hwnd),
            monitor: MonitorHandle::from_raw(monitor.0 as isize),
            is_desktop: false,
        });

        TRUE
    }

    /// Callback for EnumDisplayMonitors that synthesizes one desktop entry
    /// per monitor.
    unsafe extern "system" fn enum_monitors_callback(
        hmonitor: HMONITOR,
        _hdc: HDC,
        lprc_clip: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let out = &mut *(lparam.0 as *mut Vec<SnapshotEntry>);

        let bounds = rect_from(*lprc_clip);
        let desktop = GetDesktopWindow();

        out.push(SnapshotEntry {
            handle: WindowHandle::from_raw(desktop.0 as isize),
            owner: WindowHandle::default(),
            window_rect: bounds,
            client_rect: bounds,
            z_order: 0,
            monitor: MonitorHandle::from_raw(hmonitor.0 as isize),
            is_desktop: true,
        });

        TRUE
    }

    /// Count of visible, valid windows preceding `hwnd` front-to-back.
    unsafe fn z_order_of(hwnd: HWND) -> u32 {
        let mut z = 0;
        let mut walk = hwnd;
        loop {
            walk = match GetWindow(walk, GW_HWNDPREV) {
                Ok(prev) if !prev.is_invalid() => prev,
                _ => break,
            };
            if IsWindowVisible(walk).as_bool() && IsWindow(Some(walk)).as_bool() {
                z += 1;
            }
        }
        z
    }

    fn rect_from(rect: RECT) -> Rect {
        Rect::new(rect.left, rect.top, rect.right, rect.bottom)
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::SnapshotEntry;

    pub fn enumerate(_out: &mut Vec<SnapshotEntry>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(handle: isize, owner: isize) -> SnapshotEntry {
        SnapshotEntry {
            handle: WindowHandle::from_raw(handle),
            owner: WindowHandle::from_raw(owner),
            ..Default::default()
        }
    }

    #[test]
    fn test_sort_unowned_first_is_stable() {
        let mut entries = vec![
            entry(1, 10),
            entry(2, 0),
            entry(3, 10),
            entry(4, 0),
            entry(5, 2),
        ];
        sort_unowned_first(&mut entries);

        let order: Vec<isize> = entries.iter().map(|e| e.handle.as_raw()).collect();
        // Unowned keep their relative order, then owned keep theirs
        assert_eq!(order, vec![2, 4, 1, 3, 5]);
    }

    #[test]
    fn test_channel_commit_publishes_latest() {
        let channel = SnapshotChannel::new();
        let mut building = vec![entry(1, 0)];

        channel.commit(&mut building);
        assert!(building.is_empty());
        channel.with_committed(|committed| {
            assert_eq!(committed.len(), 1);
            assert_eq!(committed[0].handle.as_raw(), 1);
        });

        building.push(entry(2, 0));
        building.push(entry(3, 0));
        channel.commit(&mut building);
        channel.with_committed(|committed| {
            let handles: Vec<isize> = committed.iter().map(|e| e.handle.as_raw()).collect();
            assert_eq!(handles, vec![2, 3]);
        });
    }

    #[test]
    fn test_channel_retains_last_commit_when_skipped() {
        let channel = SnapshotChannel::new();
        let mut building = vec![entry(1, 0)];
        channel.commit(&mut building);

        // A failed cycle never commits; the committed buffer is untouched
        channel.with_committed(|committed| assert_eq!(committed.len(), 1));
    }
}
