//! Hierarchy and classification inference.
//!
//! Everything here is pure over already-collected data: style bits come from
//! the probe, geometry and z-order from the snapshot, candidate sets from
//! the registry. Each decision runs once per newly observed window.

use crate::probe::StyleFlags;
use crate::registry::WindowEntity;
use crate::types::{Rect, WindowId};

/// Class name of the system frame window hosting packaged-app content
pub const SHELL_WRAPPER_CLASS: &str = "ApplicationFrameWindow";

/// A window is full screen iff its client rect exactly covers its monitor's
/// bounds, all four edges matching.
pub fn is_full_screen(client_rect: Rect, monitor_bounds: Rect) -> bool {
    client_rect.left == 0
        && client_rect.top == 0
        && client_rect.right == monitor_bounds.width()
        && client_rect.bottom == monitor_bounds.height()
}

/// Task-switcher eligibility.
///
/// Decision order matters: invisibility and the popup walk disqualify first,
/// tool windows are excluded, full-screen windows are included before the
/// title-bar state can exclude them, and task-tray programs with hidden
/// title bars are excluded last.
pub fn is_alt_tab(styles: StyleFlags, full_screen: bool) -> bool {
    if !styles.visible {
        return false;
    }
    if !styles.topmost_popup {
        return false;
    }
    if styles.tool_window {
        return false;
    }
    if full_screen {
        return true;
    }
    if styles.titlebar_hidden {
        return false;
    }
    true
}

/// Whether a class name identifies the shell's packaged-app frame wrapper
pub fn is_shell_wrapper(class_name: &str) -> bool {
    class_name == SHELL_WRAPPER_CLASS
}

/// Infer the logical parent of a newly observed entity.
///
/// An exact match on the raw owner or parent handle wins outright. The
/// fallback walks entities sharing the subject's process and thread that are
/// alt-tab eligible or have no raw parent, picking the one the smallest
/// positive z-order step behind the subject. The fallback is approximate:
/// the OS exposes no true logical parent for unrelated top-level windows,
/// and sibling windows sharing a thread can be misattributed.
pub fn infer_parent<'a>(
    subject: &WindowEntity,
    others: impl Iterator<Item = &'a WindowEntity>,
) -> Option<WindowId> {
    let mut best = None;
    let mut best_delta = i64::MAX;

    for other in others {
        if other.id == subject.id {
            continue;
        }

        if (!subject.owner_handle.is_null() && other.handle == subject.owner_handle)
            || (!subject.raw_parent_handle.is_null() && other.handle == subject.raw_parent_handle)
        {
            return Some(other.id);
        }

        if other.process_id == subject.process_id
            && other.thread_id == subject.thread_id
            && (other.is_alt_tab || other.raw_parent_handle.is_null())
        {
            let delta = i64::from(other.z_order) - i64::from(subject.z_order);
            if delta > 0 && delta < best_delta {
                best_delta = delta;
                best = Some(other.id);
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WindowHandle;

    fn styles(visible: bool, topmost_popup: bool, tool_window: bool, titlebar_hidden: bool) -> StyleFlags {
        StyleFlags {
            visible,
            topmost_popup,
            tool_window,
            titlebar_hidden,
        }
    }

    fn entity(id: WindowId, handle: isize) -> WindowEntity {
        WindowEntity::new_for_tests(id, WindowHandle::from_raw(handle))
    }

    #[test]
    fn test_full_screen_exact_match() {
        let monitor = Rect::new(0, 0, 1920, 1080);
        assert!(is_full_screen(Rect::new(0, 0, 1920, 1080), monitor));
        assert!(!is_full_screen(Rect::new(0, 0, 1920, 1079), monitor));
        assert!(!is_full_screen(Rect::new(0, 0, 1280, 720), monitor));

        // Monitor origin does not matter, only its dimensions
        let secondary = Rect::new(1920, 0, 3840, 1080);
        assert!(is_full_screen(Rect::new(0, 0, 1920, 1080), secondary));
    }

    #[test]
    fn test_alt_tab_decision_order() {
        // Plain visible top-level window
        assert!(is_alt_tab(styles(true, true, false, false), false));
        // Invisible disqualifies
        assert!(!is_alt_tab(styles(false, true, false, false), false));
        // Not the topmost popup of its owner chain
        assert!(!is_alt_tab(styles(true, false, false, false), false));
        // Tool windows excluded even when full screen
        assert!(!is_alt_tab(styles(true, true, true, false), true));
        // Full screen short-circuits the title-bar exclusion
        assert!(is_alt_tab(styles(true, true, false, true), true));
        // Hidden title bar excludes task-tray programs
        assert!(!is_alt_tab(styles(true, true, false, true), false));
    }

    #[test]
    fn test_shell_wrapper_class() {
        assert!(is_shell_wrapper("ApplicationFrameWindow"));
        assert!(!is_shell_wrapper("Chrome_WidgetWin_1"));
        assert!(!is_shell_wrapper("applicationframewindow"));
    }

    #[test]
    fn test_infer_parent_exact_owner_match() {
        let mut subject = entity(1, 0x10);
        subject.owner_handle = WindowHandle::from_raw(0x20);
        subject.z_order = 0;

        let owner = entity(2, 0x20);
        // A heuristic candidate closer in z-order must not beat the exact match
        let mut sibling = entity(3, 0x30);
        sibling.z_order = 1;

        let others = [sibling, owner];
        assert_eq!(infer_parent(&subject, others.iter()), Some(2));
    }

    #[test]
    fn test_infer_parent_exact_raw_parent_match() {
        let mut subject = entity(1, 0x10);
        subject.raw_parent_handle = WindowHandle::from_raw(0x40);

        let parent = entity(5, 0x40);
        assert_eq!(infer_parent(&subject, [parent].iter()), Some(5));
    }

    #[test]
    fn test_infer_parent_heuristic_smallest_positive_delta() {
        let mut subject = entity(1, 0x10);
        subject.process_id = 100;
        subject.thread_id = 200;
        subject.z_order = 2;

        let mut near = entity(2, 0x20);
        near.process_id = 100;
        near.thread_id = 200;
        near.z_order = 4;
        near.is_alt_tab = true;

        let mut far = entity(3, 0x30);
        far.process_id = 100;
        far.thread_id = 200;
        far.z_order = 9;
        far.is_alt_tab = true;

        // In front of the subject, negative delta, never a parent
        let mut in_front = entity(4, 0x40);
        in_front.process_id = 100;
        in_front.thread_id = 200;
        in_front.z_order = 1;
        in_front.is_alt_tab = true;

        let others = [far, in_front, near];
        assert_eq!(infer_parent(&subject, others.iter()), Some(2));
    }

    #[test]
    fn test_infer_parent_candidate_filter() {
        let mut subject = entity(1, 0x10);
        subject.process_id = 100;
        subject.thread_id = 200;
        subject.z_order = 0;

        // Same process/thread but neither alt-tab nor parentless
        let mut excluded = entity(2, 0x20);
        excluded.process_id = 100;
        excluded.thread_id = 200;
        excluded.z_order = 3;
        excluded.raw_parent_handle = WindowHandle::from_raw(0x99);

        // Different thread
        let mut other_thread = entity(3, 0x30);
        other_thread.process_id = 100;
        other_thread.thread_id = 201;
        other_thread.z_order = 1;
        other_thread.is_alt_tab = true;

        let others = [excluded, other_thread];
        assert_eq!(infer_parent(&subject, others.iter()), None);
    }

    #[test]
    fn test_infer_parent_top_level() {
        let subject = entity(1, 0x10);
        assert_eq!(infer_parent(&subject, [].iter()), None);
    }
}
