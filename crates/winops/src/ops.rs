//! The `NativeOps` seam between the strategy chains and the OS.
//!
//! Everything the enumerator, the placement engine, and the raise engine
//! need from Win32 goes through this trait, so the chains can be exercised
//! against [`MockOps`] on any platform.

use std::{fmt, time::Duration};

use parking_lot::Mutex;

use crate::{
    error::{Error, Result},
    geom::{Point, Rect},
};

/// A top-level window handle, valid only for the enumeration pass that
/// produced it. This is a plain value, never an owned resource: the window
/// may be destroyed by its owner at any moment, so implementations
/// re-validate before acting on it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(isize);

impl WindowHandle {
    /// Wrap a raw HWND value.
    pub const fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    /// The raw HWND value.
    pub const fn raw(self) -> isize {
        self.0
    }
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WindowHandle(0x{:08X})", self.0)
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

// Show commands, matching the Win32 SW_* values.
/// Show the window in its normal state.
pub const SW_SHOWNORMAL: u32 = 1;
/// The window is currently shown minimized.
pub const SW_SHOWMINIMIZED: u32 = 2;
/// Show the window maximized.
pub const SW_SHOWMAXIMIZED: u32 = 3;
/// Show the window in its current state.
pub const SW_SHOW: u32 = 5;
/// Minimize the window.
pub const SW_MINIMIZE: u32 = 6;
/// Restore the window from minimized or maximized state.
pub const SW_RESTORE: u32 = 9;

/// The always-on-top extended window style bit.
pub const WS_EX_TOPMOST: u32 = 0x0000_0008;

/// Where to insert a window in the z-order on a positioning call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZOrder {
    /// Top of the non-topmost band (`HWND_TOP`).
    Top,
    /// Into the topmost band (`HWND_TOPMOST`).
    Topmost,
    /// Out of the topmost band (`HWND_NOTOPMOST`).
    NoTopmost,
}

/// Flag set for positioning calls, mirroring the `SWP_*` bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PosFlags(u32);

impl PosFlags {
    /// Keep the current size.
    pub const NOSIZE: Self = Self(0x0001);
    /// Keep the current position.
    pub const NOMOVE: Self = Self(0x0002);
    /// Keep the current z-order.
    pub const NOZORDER: Self = Self(0x0004);
    /// Do not activate the window.
    pub const NOACTIVATE: Self = Self(0x0010);
    /// Show the window as part of the call.
    pub const SHOW: Self = Self(0x0040);
    /// Post the request to the owning thread instead of blocking on it.
    pub const ASYNC: Self = Self(0x4000);

    /// Raw `SWP_*` bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when all bits of `other` are set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for PosFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for PosFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        if self.contains(Self::NOSIZE) {
            parts.push("nosize");
        }
        if self.contains(Self::NOMOVE) {
            parts.push("nomove");
        }
        if self.contains(Self::NOZORDER) {
            parts.push("nozorder");
        }
        if self.contains(Self::NOACTIVATE) {
            parts.push("noactivate");
        }
        if self.contains(Self::SHOW) {
            parts.push("show");
        }
        if self.contains(Self::ASYNC) {
            parts.push("async");
        }
        if parts.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", parts.join("+"))
        }
    }
}

/// A window's placement record: show state plus the minimized, maximized
/// and normal position rectangles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Placement {
    /// Current show command (`SW_*`).
    pub show_cmd: u32,
    /// Position when minimized.
    pub min_pos: Point,
    /// Position when maximized.
    pub max_pos: Point,
    /// The normal (restored) position rectangle.
    pub normal: Rect,
}

impl Placement {
    /// True when the placement records a minimized window.
    pub const fn is_minimized(&self) -> bool {
        self.show_cmd == SW_SHOWMINIMIZED
    }
}

/// Trait abstraction over the Win32 primitives used by the engines.
///
/// Field queries return `Option`/`Result` so callers can degrade
/// per-field instead of aborting; see the enumerator for the policy.
pub trait NativeOps: Send + Sync {
    /// List all top-level window handles. Fails only if the enumeration
    /// primitive itself refuses to start; the returned handles are a
    /// point-in-time sample and may be stale immediately.
    fn enum_windows(&self) -> Result<Vec<WindowHandle>>;

    /// True when the handle still refers to a live window.
    fn is_window(&self, win: WindowHandle) -> bool;

    /// True when the window is visible.
    fn is_visible(&self, win: WindowHandle) -> bool;

    /// The window title, if it can be read.
    fn window_title(&self, win: WindowHandle) -> Option<String>;

    /// The window class name, if it can be read.
    fn window_class(&self, win: WindowHandle) -> Option<String>;

    /// The owning thread and process ids.
    fn window_thread_process(&self, win: WindowHandle) -> Option<(u32, u32)>;

    /// The full image path of a process. Access-denied is common for
    /// elevated and system processes and surfaces as `Error::Os`.
    fn process_image_path(&self, pid: u32) -> Result<String>;

    /// The window's style and extended-style bits.
    fn window_styles(&self, win: WindowHandle) -> Option<(u32, u32)>;

    /// The window rectangle in screen coordinates.
    fn window_rect(&self, win: WindowHandle) -> Result<Rect>;

    /// The client-area rectangle.
    fn client_rect(&self, win: WindowHandle) -> Result<Rect>;

    /// Move and/or resize the window.
    fn set_window_pos(
        &self,
        win: WindowHandle,
        after: ZOrder,
        rect: Rect,
        flags: PosFlags,
    ) -> Result<()>;

    /// Issue a show command; returns false when the OS refused it.
    fn show_window(&self, win: WindowHandle, cmd: u32) -> bool;

    /// Read the full placement record.
    fn placement(&self, win: WindowHandle) -> Result<Placement>;

    /// Write back a placement record.
    fn set_placement(&self, win: WindowHandle, placement: &Placement) -> Result<()>;

    /// Attach (or detach) the calling thread's input queue to the given
    /// thread. Callers must pair every successful attach with a detach;
    /// see [`AttachGuard`].
    fn attach_thread_input(&self, thread: u32, attach: bool) -> bool;

    /// Post a restore system-command to the window's message queue.
    fn post_restore(&self, win: WindowHandle) -> Result<()>;

    /// Send a restore system-command synchronously.
    fn send_restore(&self, win: WindowHandle);

    /// Bring the window to the foreground; returns false when refused.
    fn set_foreground(&self, win: WindowHandle) -> bool;

    /// Ask the OS to let the given process take the foreground.
    fn allow_set_foreground(&self, pid: u32) -> Result<()>;

    /// Acquire and immediately release the window's accessibility object.
    /// Side-effecting probe: proves the window is reachable through the
    /// assistive-technology surface.
    fn accessible_probe(&self, win: WindowHandle) -> Result<()>;

    /// Bounding rectangle of the combined virtual screen.
    fn virtual_screen(&self) -> Rect;

    /// Bounding rectangle of the primary display.
    fn primary_screen(&self) -> Rect;

    /// Blocking settle delay, local to the executing thread. The mock
    /// records instead of sleeping.
    fn settle(&self, delay: Duration);
}

/// RAII scope for thread-input attachment: detaches on every exit path.
pub struct AttachGuard<'a> {
    ops: &'a dyn NativeOps,
    thread: u32,
}

impl<'a> AttachGuard<'a> {
    /// Attach the calling thread's input queue to `thread`. Returns `None`
    /// when the OS refuses the attachment.
    pub fn attach(ops: &'a dyn NativeOps, thread: u32) -> Option<Self> {
        if ops.attach_thread_input(thread, true) {
            Some(Self { ops, thread })
        } else {
            None
        }
    }
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        if !self.ops.attach_thread_input(self.thread, false) {
            tracing::warn!(thread = self.thread, "thread input detach failed");
        }
    }
}

/// One window known to [`MockOps`].
#[derive(Clone, Debug)]
pub struct MockWindow {
    /// Handle the mock hands out for this window.
    pub handle: WindowHandle,
    /// Window title.
    pub title: String,
    /// Window class name.
    pub class_name: String,
    /// Owning process id.
    pub pid: u32,
    /// Owning thread id.
    pub thread: u32,
    /// Executable path; `None` simulates access-denied.
    pub exe: Option<String>,
    /// Style bits.
    pub style: u32,
    /// Extended-style bits.
    pub ex_style: u32,
    /// Window rectangle.
    pub rect: Rect,
    /// Client rectangle.
    pub client: Rect,
    /// Current show command.
    pub show_cmd: u32,
    /// Whether the window is visible.
    pub visible: bool,
}

impl MockWindow {
    /// A plain visible window with the given handle, title and rect.
    pub fn new(handle: isize, title: &str, rect: Rect) -> Self {
        Self {
            handle: WindowHandle::from_raw(handle),
            title: title.to_string(),
            class_name: "MockWindowClass".to_string(),
            pid: 4100,
            thread: 7,
            exe: Some(r"C:\Program Files\Mock\mock.exe".to_string()),
            style: 0x1400_0000,
            ex_style: 0,
            rect,
            client: Rect::new(0, 0, rect.w, rect.h),
            show_cmd: SW_SHOWNORMAL,
            visible: true,
        }
    }
}

#[derive(Default)]
struct MockState {
    windows: Vec<MockWindow>,
    calls: Vec<String>,
    fail_enum: bool,
    fail_set_pos: usize,
    fail_foreground: usize,
    fail_attach: bool,
    fail_show: bool,
    fail_placement_write: bool,
    // Remaining is_window() checks that report true for this handle;
    // simulates a window destroyed mid-pass.
    valid_checks_left: Option<(WindowHandle, usize)>,
}

/// Recording fake for tests: applies positioning calls to its in-memory
/// windows and keeps an ordered call ledger.
#[derive(Default)]
pub struct MockOps {
    state: Mutex<MockState>,
}

impl MockOps {
    /// An empty mock with no windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the window list.
    pub fn set_windows(&self, windows: Vec<MockWindow>) {
        self.state.lock().windows = windows;
    }

    /// Current state of one window.
    pub fn window(&self, win: WindowHandle) -> Option<MockWindow> {
        self.state
            .lock()
            .windows
            .iter()
            .find(|w| w.handle == win)
            .cloned()
    }

    /// Make `enum_windows` fail.
    pub fn set_fail_enum(&self, fail: bool) {
        self.state.lock().fail_enum = fail;
    }

    /// Fail the next `n` `set_window_pos` calls.
    pub fn fail_set_pos_times(&self, n: usize) {
        self.state.lock().fail_set_pos = n;
    }

    /// Fail the next `n` `set_foreground` calls.
    pub fn fail_foreground_times(&self, n: usize) {
        self.state.lock().fail_foreground = n;
    }

    /// Refuse thread-input attachment.
    pub fn set_fail_attach(&self, fail: bool) {
        self.state.lock().fail_attach = fail;
    }

    /// Refuse show commands.
    pub fn set_fail_show(&self, fail: bool) {
        self.state.lock().fail_show = fail;
    }

    /// Refuse placement writes.
    pub fn set_fail_placement_write(&self, fail: bool) {
        self.state.lock().fail_placement_write = fail;
    }

    /// Report `win` as valid for the next `checks` validity queries only,
    /// then as destroyed.
    pub fn invalidate_after(&self, win: WindowHandle, checks: usize) {
        self.state.lock().valid_checks_left = Some((win, checks));
    }

    /// The ordered ledger of recorded calls.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// True when some recorded call contains `needle`.
    pub fn calls_contain(&self, needle: &str) -> bool {
        self.state.lock().calls.iter().any(|c| c.contains(needle))
    }

    /// Number of recorded calls whose name is `needle`. Calls are recorded
    /// as `name(args)`; matching on the name token (rather than a raw
    /// substring) keeps `set_foreground` from also counting
    /// `allow_set_foreground`.
    pub fn call_count(&self, needle: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.split('(').next() == Some(needle))
            .count()
    }

    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }
}

impl NativeOps for MockOps {
    fn enum_windows(&self) -> Result<Vec<WindowHandle>> {
        let st = self.state.lock();
        if st.fail_enum {
            return Err(Error::Os {
                call: "EnumWindows",
                code: 5,
            });
        }
        Ok(st.windows.iter().map(|w| w.handle).collect())
    }

    fn is_window(&self, win: WindowHandle) -> bool {
        let mut st = self.state.lock();
        if let Some((limited_win, remaining)) = &mut st.valid_checks_left
            && *limited_win == win
        {
            if *remaining == 0 {
                return false;
            }
            *remaining -= 1;
            return true;
        }
        st.windows.iter().any(|w| w.handle == win)
    }

    fn is_visible(&self, win: WindowHandle) -> bool {
        self.state
            .lock()
            .windows
            .iter()
            .any(|w| w.handle == win && w.visible)
    }

    fn window_title(&self, win: WindowHandle) -> Option<String> {
        self.window(win).map(|w| w.title)
    }

    fn window_class(&self, win: WindowHandle) -> Option<String> {
        self.window(win).map(|w| w.class_name)
    }

    fn window_thread_process(&self, win: WindowHandle) -> Option<(u32, u32)> {
        self.window(win).map(|w| (w.thread, w.pid))
    }

    fn process_image_path(&self, pid: u32) -> Result<String> {
        let st = self.state.lock();
        let win = st.windows.iter().find(|w| w.pid == pid);
        match win.and_then(|w| w.exe.clone()) {
            Some(exe) => Ok(exe),
            None => Err(Error::Os {
                call: "OpenProcess",
                code: 5,
            }),
        }
    }

    fn window_styles(&self, win: WindowHandle) -> Option<(u32, u32)> {
        self.window(win).map(|w| (w.style, w.ex_style))
    }

    fn window_rect(&self, win: WindowHandle) -> Result<Rect> {
        self.window(win).map(|w| w.rect).ok_or(Error::WindowGone)
    }

    fn client_rect(&self, win: WindowHandle) -> Result<Rect> {
        self.window(win).map(|w| w.client).ok_or(Error::WindowGone)
    }

    fn set_window_pos(
        &self,
        win: WindowHandle,
        after: ZOrder,
        rect: Rect,
        flags: PosFlags,
    ) -> Result<()> {
        let mut st = self.state.lock();
        st.calls.push(format!(
            "set_window_pos({win}, {after:?}, {},{} {}x{}, {flags})",
            rect.x, rect.y, rect.w, rect.h
        ));
        if st.fail_set_pos > 0 {
            st.fail_set_pos -= 1;
            return Err(Error::Os {
                call: "SetWindowPos",
                code: 5,
            });
        }
        let Some(w) = st.windows.iter_mut().find(|w| w.handle == win) else {
            return Err(Error::WindowGone);
        };
        if !flags.contains(PosFlags::NOMOVE) {
            w.rect.x = rect.x;
            w.rect.y = rect.y;
        }
        if !flags.contains(PosFlags::NOSIZE) {
            w.rect.w = rect.w;
            w.rect.h = rect.h;
        }
        if after == ZOrder::NoTopmost {
            w.ex_style &= !WS_EX_TOPMOST;
        }
        Ok(())
    }

    fn show_window(&self, win: WindowHandle, cmd: u32) -> bool {
        let mut st = self.state.lock();
        st.calls.push(format!("show_window({win}, {cmd})"));
        if st.fail_show {
            return false;
        }
        if let Some(w) = st.windows.iter_mut().find(|w| w.handle == win) {
            w.show_cmd = match cmd {
                SW_MINIMIZE => SW_SHOWMINIMIZED,
                SW_RESTORE => SW_SHOWNORMAL,
                other => other,
            };
            true
        } else {
            false
        }
    }

    fn placement(&self, win: WindowHandle) -> Result<Placement> {
        self.window(win)
            .map(|w| Placement {
                show_cmd: w.show_cmd,
                min_pos: Point::default(),
                max_pos: Point::default(),
                normal: w.rect,
            })
            .ok_or(Error::WindowGone)
    }

    fn set_placement(&self, win: WindowHandle, placement: &Placement) -> Result<()> {
        let mut st = self.state.lock();
        st.calls.push(format!(
            "set_placement({win}, cmd={}, normal={},{} {}x{})",
            placement.show_cmd,
            placement.normal.x,
            placement.normal.y,
            placement.normal.w,
            placement.normal.h
        ));
        if st.fail_placement_write {
            return Err(Error::Os {
                call: "SetWindowPlacement",
                code: 5,
            });
        }
        let Some(w) = st.windows.iter_mut().find(|w| w.handle == win) else {
            return Err(Error::WindowGone);
        };
        w.rect = placement.normal;
        w.show_cmd = placement.show_cmd;
        Ok(())
    }

    fn attach_thread_input(&self, thread: u32, attach: bool) -> bool {
        let mut st = self.state.lock();
        st.calls.push(format!("attach_thread_input({thread}, {attach})"));
        !st.fail_attach
    }

    fn post_restore(&self, win: WindowHandle) -> Result<()> {
        self.record(format!("post_restore({win})"));
        Ok(())
    }

    fn send_restore(&self, win: WindowHandle) {
        self.record(format!("send_restore({win})"));
    }

    fn set_foreground(&self, win: WindowHandle) -> bool {
        let mut st = self.state.lock();
        st.calls.push(format!("set_foreground({win})"));
        if st.fail_foreground > 0 {
            st.fail_foreground -= 1;
            return false;
        }
        st.windows.iter().any(|w| w.handle == win)
    }

    fn allow_set_foreground(&self, pid: u32) -> Result<()> {
        self.record(format!("allow_set_foreground({pid})"));
        Ok(())
    }

    fn accessible_probe(&self, win: WindowHandle) -> Result<()> {
        self.record(format!("accessible_probe({win})"));
        Ok(())
    }

    fn virtual_screen(&self) -> Rect {
        Rect::new(0, 0, 3840, 1080)
    }

    fn primary_screen(&self) -> Rect {
        Rect::new(0, 0, 1920, 1080)
    }

    fn settle(&self, delay: Duration) {
        self.record(format!("settle({}ms)", delay.as_millis()));
    }
}
