//! Per-window OS queries behind the [`WindowProbe`] seam.
//!
//! One-time classification (process/thread resolution, packaged-app probing,
//! style walks) and the per-cycle refresh both go through this trait so the
//! registry's diff logic stays independent of the host OS. The platform
//! implementation mirrors the enumeration layer: Win32 behind a cfg gate,
//! inert stubs elsewhere.

use crate::types::{Point, WindowHandle};
use std::time::Duration;

/// Style bits feeding the alt-tab decision table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleFlags {
    /// Window is currently visible
    pub visible: bool,
    /// Window is the last active visible popup of its root owner chain
    pub topmost_popup: bool,
    /// Window carries the tool-window style
    pub tool_window: bool,
    /// Title bar reports itself as invisible (task-tray programs)
    pub titlebar_hidden: bool,
}

/// OS queries for a single window, used by classification and cursor
/// resolution.
///
/// Implementations must be cheap and non-blocking; the bounded-timeout title
/// query is the only call allowed to wait, and only up to its timeout.
pub trait WindowProbe: Send + Sync {
    /// Style bits for the alt-tab eligibility decision
    fn styles(&self, handle: WindowHandle) -> StyleFlags;

    /// (process id, thread id) of the window's owning thread
    fn process_ids(&self, handle: WindowHandle) -> (u32, u32);

    /// Window class name; `None` when retrieval fails
    fn class_name(&self, handle: WindowHandle) -> Option<String>;

    /// Plain title query; `None` for empty titles or failures
    fn title(&self, handle: WindowHandle) -> Option<String>;

    /// Bounded-timeout title query, second line of defense against slow
    /// windows. Returns failure rather than blocking past `timeout`; titles
    /// longer than `max_len` are treated as failures.
    fn title_with_timeout(
        &self,
        handle: WindowHandle,
        timeout: Duration,
        max_len: usize,
    ) -> Option<String>;

    /// Whether the owning process is a packaged application
    fn is_packaged(&self, process_id: u32) -> bool;

    /// Raw parent handle, null when the window has none
    fn raw_parent(&self, handle: WindowHandle) -> WindowHandle;

    /// Cheap per-cycle background check (cloaked packaged-app frames)
    fn is_background(&self, handle: WindowHandle) -> bool;

    /// Hit-test: the raw window under a screen point
    fn window_at(&self, point: Point) -> Option<WindowHandle>;

    /// Next ancestor in the OS parent chain, `None` when exhausted
    fn ancestor(&self, handle: WindowHandle) -> Option<WindowHandle>;

    /// Current pointer position in screen coordinates
    fn cursor_pos(&self) -> Option<Point>;
}

/// Probe backed by the host OS.
#[derive(Debug, Default)]
pub struct PlatformProbe;

impl WindowProbe for PlatformProbe {
    fn styles(&self, handle: WindowHandle) -> StyleFlags {
        platform::styles(handle)
    }

    fn process_ids(&self, handle: WindowHandle) -> (u32, u32) {
        platform::process_ids(handle)
    }

    fn class_name(&self, handle: WindowHandle) -> Option<String> {
        platform::class_name(handle)
    }

    fn title(&self, handle: WindowHandle) -> Option<String> {
        platform::title(handle)
    }

    fn title_with_timeout(
        &self,
        handle: WindowHandle,
        timeout: Duration,
        max_len: usize,
    ) -> Option<String> {
        platform::title_with_timeout(handle, timeout, max_len)
    }

    fn is_packaged(&self, process_id: u32) -> bool {
        platform::is_packaged(process_id)
    }

    fn raw_parent(&self, handle: WindowHandle) -> WindowHandle {
        platform::raw_parent(handle)
    }

    fn is_background(&self, handle: WindowHandle) -> bool {
        platform::is_background(handle)
    }

    fn window_at(&self, point: Point) -> Option<WindowHandle> {
        platform::window_at(point)
    }

    fn ancestor(&self, handle: WindowHandle) -> Option<WindowHandle> {
        platform::ancestor(handle)
    }

    fn cursor_pos(&self) -> Option<Point> {
        platform::cursor_pos()
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use super::StyleFlags;
    use crate::types::{Point, WindowHandle};
    use std::ffi::c_void;
    use std::time::Duration;
    use tracing::trace;
    use windows::core::PWSTR;
    use windows::Win32::Foundation::{
        CloseHandle, ERROR_INSUFFICIENT_BUFFER, HWND, LPARAM, POINT, WPARAM,
    };
    use windows::Win32::Graphics::Dwm::{DwmGetWindowAttribute, DWMWA_CLOAKED};
    use windows::Win32::Storage::Packaging::Appx::GetPackageFamilyName;
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_INFORMATION};
    use windows::Win32::UI::WindowsAndMessaging::{
        GetAncestor, GetClassNameW, GetCursorPos, GetLastActivePopup, GetParent, GetTitleBarInfo,
        GetWindowLongW, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
        IsWindowVisible, SendMessageTimeoutW, WindowFromPoint, GA_PARENT, GA_ROOTOWNER,
        GWL_EXSTYLE, SMTO_ABORTIFHUNG, SMTO_BLOCK, TITLEBARINFO, WM_GETTEXT, WM_GETTEXTLENGTH,
        WS_EX_TOOLWINDOW,
    };

    // Title-bar state bit not exposed by windows-rs
    const STATE_SYSTEM_INVISIBLE: u32 = 0x0000_8000;

    fn hwnd(handle: WindowHandle) -> HWND {
        HWND(handle.as_raw() as *mut c_void)
    }

    fn wrap(raw: HWND) -> WindowHandle {
        WindowHandle::from_raw(raw.0 as isize)
    }

    pub fn styles(handle: WindowHandle) -> StyleFlags {
        let hwnd = hwnd(handle);
        unsafe {
            let visible = IsWindowVisible(hwnd).as_bool();

            // Only the topmost visible popup in an owner chain shows in the
            // task switcher. Ref:
            // https://devblogs.microsoft.com/oldnewthing/20071008-00/?p=24863
            let mut walk = HWND::default();
            let mut try_hwnd = GetAncestor(hwnd, GA_ROOTOWNER);
            while try_hwnd != walk {
                walk = try_hwnd;
                try_hwnd = GetLastActivePopup(walk);
                if IsWindowVisible(try_hwnd).as_bool() {
                    break;
                }
            }
            let topmost_popup = walk == hwnd;

            let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as u32;
            let tool_window = ex_style & WS_EX_TOOLWINDOW.0 != 0;

            let mut title_bar = TITLEBARINFO {
                cbSize: std::mem::size_of::<TITLEBARINFO>() as u32,
                ..Default::default()
            };
            let _ = GetTitleBarInfo(hwnd, &mut title_bar);
            let titlebar_hidden = title_bar.rgstate[0] & STATE_SYSTEM_INVISIBLE != 0;

            StyleFlags {
                visible,
                topmost_popup,
                tool_window,
                titlebar_hidden,
            }
        }
    }

    pub fn process_ids(handle: WindowHandle) -> (u32, u32) {
        let mut process_id = 0u32;
        let thread_id =
            unsafe { GetWindowThreadProcessId(hwnd(handle), Some(&mut process_id)) };
        (process_id, thread_id)
    }

    pub fn class_name(handle: WindowHandle) -> Option<String> {
        let mut buf = [0u16; 128];
        let len = unsafe { GetClassNameW(hwnd(handle), &mut buf) };
        if len <= 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&buf[..len as usize]))
    }

    pub fn title(handle: WindowHandle) -> Option<String> {
        let hwnd = hwnd(handle);
        let length = unsafe { GetWindowTextLengthW(hwnd) };
        if length <= 0 {
            return None;
        }

        let mut buf = vec![0u16; length as usize + 1];
        let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
        if copied <= 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&buf[..copied as usize]))
    }

    pub fn title_with_timeout(
        handle: WindowHandle,
        timeout: Duration,
        max_len: usize,
    ) -> Option<String> {
        let hwnd = hwnd(handle);
        let flags = SMTO_ABORTIFHUNG | SMTO_BLOCK;
        let timeout_ms = timeout.as_millis() as u32;

        unsafe {
            let mut length: usize = 0;
            let sent = SendMessageTimeoutW(
                hwnd,
                WM_GETTEXTLENGTH,
                WPARAM(0),
                LPARAM(0),
                flags,
                timeout_ms,
                Some(&mut length),
            );
            if sent.0 == 0 || length == 0 || length > max_len {
                return None;
            }

            let mut buf = vec![0u16; length + 1];
            let mut copied: usize = 0;
            let sent = SendMessageTimeoutW(
                hwnd,
                WM_GETTEXT,
                WPARAM(buf.len()),
                LPARAM(buf.as_mut_ptr() as isize),
                flags,
                timeout_ms,
                Some(&mut copied),
            );
            if sent.0 == 0 {
                return None;
            }

            let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
            Some(String::from_utf16_lossy(&buf[..end]))
        }
    }

    pub fn is_packaged(process_id: u32) -> bool {
        unsafe {
            let process = match OpenProcess(PROCESS_QUERY_INFORMATION, false, process_id) {
                Ok(handle) => handle,
                Err(e) => {
                    trace!("OpenProcess({}) failed: {}", process_id, e);
                    return false;
                }
            };

            // A packaged process answers the family-name query with
            // "insufficient buffer" for a zero-length probe
            let mut len = 0u32;
            let result = GetPackageFamilyName(process, &mut len, PWSTR::null());
            let _ = CloseHandle(process);

            result == ERROR_INSUFFICIENT_BUFFER
        }
    }

    pub fn raw_parent(handle: WindowHandle) -> WindowHandle {
        unsafe { GetParent(hwnd(handle)).map(wrap).unwrap_or_default() }
    }

    pub fn is_background(handle: WindowHandle) -> bool {
        let mut cloaked = 0u32;
        let result = unsafe {
            DwmGetWindowAttribute(
                hwnd(handle),
                DWMWA_CLOAKED,
                &mut cloaked as *mut u32 as *mut c_void,
                std::mem::size_of::<u32>() as u32,
            )
        };
        result.is_ok() && cloaked != 0
    }

    pub fn window_at(point: Point) -> Option<WindowHandle> {
        let raw = unsafe {
            WindowFromPoint(POINT {
                x: point.x,
                y: point.y,
            })
        };
        if raw.is_invalid() {
            None
        } else {
            Some(wrap(raw))
        }
    }

    pub fn ancestor(handle: WindowHandle) -> Option<WindowHandle> {
        let raw = unsafe { GetAncestor(hwnd(handle), GA_PARENT) };
        if raw.is_invalid() {
            None
        } else {
            Some(wrap(raw))
        }
    }

    pub fn cursor_pos() -> Option<Point> {
        let mut pos = POINT::default();
        unsafe { GetCursorPos(&mut pos).ok()? };
        Some(Point::new(pos.x, pos.y))
    }
}

/// Scripted probe shared by the registry and tracker tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::{StyleFlags, WindowProbe};
    use crate::types::{Point, WindowHandle};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    pub(crate) struct FakeProbeState {
        pub styles: HashMap<WindowHandle, StyleFlags>,
        pub process_ids: HashMap<WindowHandle, (u32, u32)>,
        pub class_names: HashMap<WindowHandle, String>,
        pub titles: HashMap<WindowHandle, String>,
        pub slow_titles: HashMap<WindowHandle, String>,
        pub packaged: HashSet<u32>,
        pub parents: HashMap<WindowHandle, WindowHandle>,
        pub background: HashSet<WindowHandle>,
        pub hit: Option<WindowHandle>,
        pub ancestors: HashMap<WindowHandle, WindowHandle>,
        pub cursor: Option<Point>,
        pub class_name_calls: usize,
        pub packaged_calls: usize,
    }

    #[derive(Debug, Default)]
    pub(crate) struct FakeProbe {
        state: Mutex<FakeProbeState>,
    }

    impl FakeProbe {
        pub fn with<R>(&self, f: impl FnOnce(&mut FakeProbeState) -> R) -> R {
            f(&mut self.state.lock().unwrap())
        }
    }

    impl WindowProbe for FakeProbe {
        fn styles(&self, handle: WindowHandle) -> StyleFlags {
            self.with(|s| s.styles.get(&handle).copied().unwrap_or_default())
        }

        fn process_ids(&self, handle: WindowHandle) -> (u32, u32) {
            self.with(|s| s.process_ids.get(&handle).copied().unwrap_or_default())
        }

        fn class_name(&self, handle: WindowHandle) -> Option<String> {
            self.with(|s| {
                s.class_name_calls += 1;
                s.class_names.get(&handle).cloned()
            })
        }

        fn title(&self, handle: WindowHandle) -> Option<String> {
            self.with(|s| s.titles.get(&handle).cloned())
        }

        fn title_with_timeout(
            &self,
            handle: WindowHandle,
            _timeout: Duration,
            max_len: usize,
        ) -> Option<String> {
            self.with(|s| {
                s.slow_titles
                    .get(&handle)
                    .filter(|title| title.len() <= max_len)
                    .cloned()
            })
        }

        fn is_packaged(&self, process_id: u32) -> bool {
            self.with(|s| {
                s.packaged_calls += 1;
                s.packaged.contains(&process_id)
            })
        }

        fn raw_parent(&self, handle: WindowHandle) -> WindowHandle {
            self.with(|s| s.parents.get(&handle).copied().unwrap_or_default())
        }

        fn is_background(&self, handle: WindowHandle) -> bool {
            self.with(|s| s.background.contains(&handle))
        }

        fn window_at(&self, _point: Point) -> Option<WindowHandle> {
            self.with(|s| s.hit)
        }

        fn ancestor(&self, handle: WindowHandle) -> Option<WindowHandle> {
            self.with(|s| s.ancestors.get(&handle).copied())
        }

        fn cursor_pos(&self) -> Option<Point> {
            self.with(|s| s.cursor)
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::StyleFlags;
    use crate::types::{Point, WindowHandle};
    use std::time::Duration;

    pub fn styles(_handle: WindowHandle) -> StyleFlags {
        StyleFlags::default()
    }

    pub fn process_ids(_handle: WindowHandle) -> (u32, u32) {
        (0, 0)
    }

    pub fn class_name(_handle: WindowHandle) -> Option<String> {
        None
    }

    pub fn title(_handle: WindowHandle) -> Option<String> {
        None
    }

    pub fn title_with_timeout(
        _handle: WindowHandle,
        _timeout: Duration,
        _max_len: usize,
    ) -> Option<String> {
        None
    }

    pub fn is_packaged(_process_id: u32) -> bool {
        false
    }

    pub fn raw_parent(_handle: WindowHandle) -> WindowHandle {
        WindowHandle::default()
    }

    pub fn is_background(_handle: WindowHandle) -> bool {
        false
    }

    pub fn window_at(_point: Point) -> Option<WindowHandle> {
        None
    }

    pub fn ancestor(_handle: WindowHandle) -> Option<WindowHandle> {
        None
    }

    pub fn cursor_pos() -> Option<Point> {
        None
    }
}
