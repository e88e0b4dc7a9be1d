//! The foreground engine: bring a window to the front.
//!
//! Shorter escalation than placement — foreground changes are gated by
//! input-focus ownership rules rather than geometry, so fewer workarounds
//! apply. Before any attempt, a window stranded entirely outside the
//! virtual screen (a monitor was unplugged) is recentered onto the primary
//! display.

use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    geom::Rect,
    ops::{AttachGuard, NativeOps, PosFlags, SW_MINIMIZE, SW_RESTORE, WindowHandle, ZOrder},
};

const MINIMIZE_SETTLE: Duration = Duration::from_millis(250);

/// One technique for bringing a window to the foreground.
pub trait RaiseStrategy: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Try to bring `win` to the front.
    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle) -> bool;
}

/// Bring `win` to the foreground, escalating through the default chain.
pub fn raise_window(ops: &dyn NativeOps, win: WindowHandle) -> Result<()> {
    if !ops.is_window(win) {
        return Err(Error::WindowGone);
    }
    recenter_if_offscreen(ops, win);
    raise_window_with(ops, default_strategies(), win)
}

/// Chain runner: attempt each strategy in order until one succeeds.
pub fn raise_window_with(
    ops: &dyn NativeOps,
    strategies: &[&dyn RaiseStrategy],
    win: WindowHandle,
) -> Result<()> {
    for strategy in strategies {
        if strategy.attempt(ops, win) {
            debug!(%win, strategy = strategy.name(), "window raised");
            return Ok(());
        }
        debug!(%win, strategy = strategy.name(), "raise strategy failed, escalating");
    }
    Err(Error::RaiseExhausted {
        attempted: strategies.len(),
    })
}

/// The built-in escalation chain.
pub fn default_strategies() -> &'static [&'static dyn RaiseStrategy] {
    static CHAIN: [&dyn RaiseStrategy; 4] = [
        &DirectForeground,
        &AttachInputForeground,
        &MinimizeRestoreForeground,
        &AllowForeground,
    ];
    &CHAIN
}

/// A window whose rectangle lies entirely outside the combined virtual
/// screen cannot be meaningfully focused; move it to the middle of the
/// primary display first. Failure here is logged and ignored — the raise
/// chain still runs.
fn recenter_if_offscreen(ops: &dyn NativeOps, win: WindowHandle) {
    let Ok(rect) = ops.window_rect(win) else {
        return;
    };
    let virtual_screen = ops.virtual_screen();
    if rect.overlaps(&virtual_screen) {
        return;
    }
    let target = rect.centered_in(&ops.primary_screen());
    debug!(%win, ?rect, ?target, "window is outside every display, recentering");
    if let Err(err) = ops.set_window_pos(win, ZOrder::Top, target, PosFlags::SHOW) {
        warn!(%win, %err, "recenter onto primary display failed");
    }
}

/// Plain `SetForegroundWindow`.
struct DirectForeground;

impl RaiseStrategy for DirectForeground {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle) -> bool {
        ops.set_foreground(win)
    }
}

/// Thread-input attachment around the foreground call. If activation is
/// still refused, fall back to a non-activating z-order bump — the window
/// becomes visible on top without taking focus.
struct AttachInputForeground;

impl RaiseStrategy for AttachInputForeground {
    fn name(&self) -> &'static str {
        "attach-input"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle) -> bool {
        let Some((thread, _pid)) = ops.window_thread_process(win) else {
            return false;
        };
        let Some(_guard) = AttachGuard::attach(ops, thread) else {
            return false;
        };
        if ops.set_foreground(win) {
            return true;
        }
        ops.set_window_pos(
            win,
            ZOrder::Top,
            Rect::default(),
            PosFlags::NOSIZE | PosFlags::NOMOVE | PosFlags::NOACTIVATE,
        )
        .is_ok()
    }
}

/// Bounce through the minimized state, then take the foreground.
struct MinimizeRestoreForeground;

impl RaiseStrategy for MinimizeRestoreForeground {
    fn name(&self) -> &'static str {
        "minimize-restore"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle) -> bool {
        let Ok(placement) = ops.placement(win) else {
            return false;
        };
        if placement.is_minimized() {
            if !ops.show_window(win, SW_RESTORE) {
                return false;
            }
        } else {
            if !ops.show_window(win, SW_MINIMIZE) {
                return false;
            }
            ops.settle(MINIMIZE_SETTLE);
            if !ops.show_window(win, SW_RESTORE) {
                return false;
            }
        }
        ops.set_foreground(win)
    }
}

/// Ask the OS to grant the target's process the right to take the
/// foreground, then retry.
struct AllowForeground;

impl RaiseStrategy for AllowForeground {
    fn name(&self) -> &'static str {
        "allow-foreground"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle) -> bool {
        let Some((_thread, pid)) = ops.window_thread_process(win) else {
            return false;
        };
        if let Err(err) = ops.allow_set_foreground(pid) {
            debug!(%win, pid, %err, "foreground permission grant refused");
            return false;
        }
        ops.set_foreground(win)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{MockOps, MockWindow};

    fn mock_with_window(rect: Rect) -> (MockOps, WindowHandle) {
        let ops = MockOps::new();
        let win = MockWindow::new(11, "Raise me", rect);
        let handle = win.handle;
        ops.set_windows(vec![win]);
        (ops, handle)
    }

    #[test]
    fn direct_foreground_succeeds_without_escalation() {
        let (ops, handle) = mock_with_window(Rect::new(10, 10, 800, 600));

        raise_window(&ops, handle).unwrap();

        assert_eq!(ops.call_count("set_foreground"), 1);
        assert_eq!(ops.call_count("attach_thread_input"), 0);
    }

    #[test]
    fn offscreen_window_is_recentered_before_any_foreground_attempt() {
        // Mock virtual screen is 3840x1080 at the origin; park the window
        // far outside it.
        let (ops, handle) = mock_with_window(Rect::new(-9000, -9000, 800, 600));

        raise_window(&ops, handle).unwrap();

        let calls = ops.calls();
        let recenter = calls
            .iter()
            .position(|c| c.starts_with("set_window_pos"))
            .expect("recenter call missing");
        let foreground = calls
            .iter()
            .position(|c| c.starts_with("set_foreground"))
            .expect("foreground call missing");
        assert!(recenter < foreground, "recenter must precede foreground");
        // Centered on the 1920x1080 primary display.
        assert_eq!(
            ops.window(handle).unwrap().rect,
            Rect::new(560, 240, 800, 600)
        );
    }

    #[test]
    fn onscreen_window_is_not_moved() {
        let (ops, handle) = mock_with_window(Rect::new(10, 10, 800, 600));

        raise_window(&ops, handle).unwrap();

        assert_eq!(ops.call_count("set_window_pos"), 0);
    }

    #[test]
    fn attach_fallback_bumps_z_order_without_activation() {
        let (ops, handle) = mock_with_window(Rect::new(10, 10, 800, 600));
        // Direct refusal, then the attached retry also refused.
        ops.fail_foreground_times(2);

        raise_window(&ops, handle).unwrap();

        assert!(ops.calls_contain("attach_thread_input(7, true)"));
        assert!(ops.calls_contain("attach_thread_input(7, false)"));
        assert!(ops.calls_contain("nosize+nomove+noactivate"));
    }

    #[test]
    fn permission_grant_is_the_last_resort() {
        let (ops, handle) = mock_with_window(Rect::new(10, 10, 800, 600));
        // Refuse the direct attempt and the attached retry.
        ops.fail_foreground_times(2);
        // Refuse the z-order bump so the attach strategy fails outright.
        ops.fail_set_pos_times(1);
        // Refuse show commands so minimize/restore never gets to retry.
        ops.set_fail_show(true);

        raise_window(&ops, handle).unwrap();

        assert!(ops.calls_contain("allow_set_foreground(4100)"));
        // Two refused attempts plus the final granted one.
        assert_eq!(ops.call_count("set_foreground"), 3);
    }

    #[test]
    fn exhaustion_is_terminal() {
        let (ops, handle) = mock_with_window(Rect::new(10, 10, 800, 600));
        ops.fail_foreground_times(10);
        ops.fail_set_pos_times(10);
        ops.set_fail_show(true);

        let err = raise_window(&ops, handle).unwrap_err();
        assert!(matches!(err, Error::RaiseExhausted { attempted: 4 }));
    }
}
