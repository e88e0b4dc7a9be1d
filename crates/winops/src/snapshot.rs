//! The window enumerator: one synchronous pass over all visible top-level
//! windows, producing best-effort metadata snapshots.

use tracing::{debug, trace};

use crate::{
    error::Result,
    geom::Rect,
    ops::{NativeOps, WindowHandle},
};

/// Windows narrower or shorter than this are junk (ghost tool windows,
/// tray artifacts) and are skipped.
pub const MIN_WINDOW_EDGE: i32 = 8;

/// Point-in-time capture of one window's metadata and geometry.
///
/// The handle is only usable until the next enumeration pass; everything
/// else is plain data. Fields the OS refused to reveal are empty/zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Ephemeral window handle.
    pub handle: WindowHandle,
    /// Window title.
    pub title: String,
    /// Window class name.
    pub class_name: String,
    /// Owning process id.
    pub pid: u32,
    /// Resolved executable path, or `PID:<n>` when the process refused a
    /// query handle (elevated/system processes).
    pub executable: String,
    /// Style bits.
    pub style: u32,
    /// Extended-style bits.
    pub ex_style: u32,
    /// Client-area rectangle (window-relative).
    pub client_rect: Rect,
    /// Window rectangle (screen coordinates).
    pub window_rect: Rect,
}

/// Enumerate all qualifying visible top-level windows.
///
/// Qualifying means: visible, non-empty title, and both edges longer than
/// [`MIN_WINDOW_EDGE`]. Per-field failures degrade that field; only a
/// failure of the enumeration primitive itself is an error.
pub fn enumerate_windows(ops: &dyn NativeOps) -> Result<Vec<WindowSnapshot>> {
    let handles = ops.enum_windows()?;
    trace!(count = handles.len(), "enumerated top-level handles");

    let mut out = Vec::new();
    for handle in handles {
        if !ops.is_window(handle) || !ops.is_visible(handle) {
            continue;
        }
        let snap = snapshot_window(ops, handle);
        if snap.title.is_empty() {
            continue;
        }
        if snap.window_rect.w <= MIN_WINDOW_EDGE || snap.window_rect.h <= MIN_WINDOW_EDGE {
            continue;
        }
        debug!(
            handle = %snap.handle,
            title = %snap.title,
            class = %snap.class_name,
            "snapshotted window"
        );
        out.push(snap);
    }
    Ok(out)
}

/// Collect one window's fields, best-effort. The handle is re-validated
/// between sub-queries; if the window dies mid-pass the fields collected
/// so far are kept and the rest stay at their defaults.
fn snapshot_window(ops: &dyn NativeOps, handle: WindowHandle) -> WindowSnapshot {
    let mut snap = WindowSnapshot {
        handle,
        title: String::new(),
        class_name: String::new(),
        pid: 0,
        executable: String::new(),
        style: 0,
        ex_style: 0,
        client_rect: Rect::default(),
        window_rect: Rect::default(),
    };

    if let Some(title) = ops.window_title(handle) {
        snap.title = title;
    }
    if ops.is_window(handle)
        && let Some(class) = ops.window_class(handle)
    {
        snap.class_name = class;
    }
    if ops.is_window(handle)
        && let Some((_thread, pid)) = ops.window_thread_process(handle)
    {
        snap.pid = pid;
    }
    if snap.pid != 0 {
        snap.executable = match ops.process_image_path(snap.pid) {
            Ok(path) => path,
            Err(err) => {
                // Common for elevated/system processes; keep a stable
                // placeholder so the identity stays derivable.
                debug!(pid = snap.pid, %err, "executable path unavailable");
                format!("PID:{}", snap.pid)
            }
        };
    }
    if ops.is_window(handle)
        && let Some((style, ex_style)) = ops.window_styles(handle)
    {
        snap.style = style;
        snap.ex_style = ex_style;
    }
    if ops.is_window(handle)
        && let Ok(client) = ops.client_rect(handle)
    {
        snap.client_rect = client;
    }
    if ops.is_window(handle)
        && let Ok(rect) = ops.window_rect(handle)
    {
        snap.window_rect = rect;
    }
    snap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{MockOps, MockWindow};

    #[test]
    fn filters_untitled_and_tiny_windows() {
        let ops = MockOps::new();
        ops.set_windows(vec![
            MockWindow::new(1, "Editor", Rect::new(0, 0, 800, 600)),
            MockWindow::new(2, "", Rect::new(0, 0, 800, 600)),
            MockWindow::new(3, "Tiny", Rect::new(0, 0, 8, 8)),
            MockWindow {
                visible: false,
                ..MockWindow::new(4, "Hidden", Rect::new(0, 0, 800, 600))
            },
        ]);

        let snaps = enumerate_windows(&ops).unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].title, "Editor");
    }

    #[test]
    fn denied_process_query_degrades_to_pid_placeholder() {
        let ops = MockOps::new();
        ops.set_windows(vec![MockWindow {
            exe: None,
            pid: 999,
            ..MockWindow::new(1, "Elevated", Rect::new(10, 10, 400, 300))
        }]);

        let snaps = enumerate_windows(&ops).unwrap();
        assert_eq!(snaps[0].executable, "PID:999");
    }

    #[test]
    fn enumeration_primitive_failure_is_an_error() {
        let ops = MockOps::new();
        ops.set_fail_enum(true);
        assert!(enumerate_windows(&ops).is_err());
    }

    #[test]
    fn window_destroyed_mid_pass_keeps_collected_fields() {
        let ops = MockOps::new();
        let win = MockWindow::new(5, "Fleeting", Rect::new(0, 0, 640, 480));
        let handle = win.handle;
        ops.set_windows(vec![win]);
        // Valid through the class and pid re-validations, gone for the
        // style and rect queries.
        ops.invalidate_after(handle, 2);

        let snap = snapshot_window(&ops, handle);
        assert_eq!(snap.title, "Fleeting");
        assert_eq!(snap.class_name, "MockWindowClass");
        assert_eq!(snap.pid, 4100);
        // Queries after the invalidation degraded to defaults.
        assert_eq!(snap.style, 0);
        assert_eq!(snap.window_rect, Rect::default());
    }
}
