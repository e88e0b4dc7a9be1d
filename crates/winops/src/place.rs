//! The positioning engine: force a window to a target rectangle.
//!
//! A single `SetWindowPos` is refused for windows owned by
//! higher-privilege processes, for minimized windows, and in some
//! input-focus-restricted states. The engine therefore runs an ordered
//! chain of strategies, sequentially, first success wins. Each strategy is
//! one known workaround; exhaustion is the only terminal error.

use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    geom::Rect,
    ops::{
        AttachGuard, NativeOps, PosFlags, SW_MINIMIZE, SW_RESTORE, WS_EX_TOPMOST, WindowHandle,
        ZOrder,
    },
};

// Settle delays: long enough for the window manager to finish the state
// transition, short enough not to stall a multi-window pass.
const MINIMIZE_SETTLE: Duration = Duration::from_millis(100);
const RESTORE_MSG_SETTLE: Duration = Duration::from_millis(100);
const TOPMOST_CLEAR_SETTLE: Duration = Duration::from_millis(50);

/// One technique for moving a window to a target rectangle.
///
/// Strategies are stateless; `attempt` returns true on success. Failures
/// are expected and non-fatal — the chain simply escalates.
pub trait PlaceStrategy: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Try to make `win` occupy `target`.
    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool;
}

/// Move `win` to `target`, escalating through the default strategy chain.
///
/// Returns [`Error::WindowGone`] if the handle is already dead, and
/// [`Error::PlaceExhausted`] when every strategy failed.
pub fn place_window(ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> Result<()> {
    if !ops.is_window(win) {
        return Err(Error::WindowGone);
    }
    place_window_with(ops, default_strategies(), win, target)
}

/// Chain runner: attempt each strategy in order until one succeeds.
pub fn place_window_with(
    ops: &dyn NativeOps,
    strategies: &[&dyn PlaceStrategy],
    win: WindowHandle,
    target: Rect,
) -> Result<()> {
    for strategy in strategies {
        if strategy.attempt(ops, win, target) {
            debug!(%win, strategy = strategy.name(), "window placed");
            return Ok(());
        }
        debug!(%win, strategy = strategy.name(), "placement strategy failed, escalating");
    }
    Err(Error::PlaceExhausted {
        attempted: strategies.len(),
    })
}

/// The built-in escalation chain, cheapest first.
pub fn default_strategies() -> &'static [&'static dyn PlaceStrategy] {
    static CHAIN: [&dyn PlaceStrategy; 9] = [
        &DirectSet,
        &AttachInputSet,
        &MinimizeRestoreSet,
        &PlacementSet,
        &AsyncSet,
        &RestoreMessageSet,
        &TopmostToggleSet,
        &AccessibleProbeSet,
        &FinalAsyncSet,
    ];
    &CHAIN
}

/// Plain `SetWindowPos`. Short-circuits with zero OS mutation when the
/// window already occupies the target (re-reads the current geometry
/// first), which makes repeated reconciliation passes idempotent.
struct DirectSet;

impl PlaceStrategy for DirectSet {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool {
        if let Ok(current) = ops.window_rect(win)
            && current == target
        {
            debug!(%win, "already at target geometry");
            return true;
        }
        ops.set_window_pos(win, ZOrder::Top, target, PosFlags::SHOW)
            .is_ok()
    }
}

/// Attach the caller's input queue to the window's owning thread for the
/// duration of the call. Sidesteps some focus-ownership refusals.
struct AttachInputSet;

impl PlaceStrategy for AttachInputSet {
    fn name(&self) -> &'static str {
        "attach-input"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool {
        let Some((thread, _pid)) = ops.window_thread_process(win) else {
            return false;
        };
        let Some(_guard) = AttachGuard::attach(ops, thread) else {
            return false;
        };
        ops.set_window_pos(win, ZOrder::Top, target, PosFlags::SHOW)
            .is_ok()
    }
}

/// Bounce the window through the minimized state. Forces the OS to
/// recompute layout, which sometimes clears a stuck restriction.
struct MinimizeRestoreSet;

impl PlaceStrategy for MinimizeRestoreSet {
    fn name(&self) -> &'static str {
        "minimize-restore"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool {
        let Ok(placement) = ops.placement(win) else {
            return false;
        };
        if placement.is_minimized() {
            // Restore, place, and return to the minimized state the user
            // left the window in.
            if !ops.show_window(win, SW_RESTORE) {
                return false;
            }
            if ops
                .set_window_pos(win, ZOrder::Top, target, PosFlags::SHOW)
                .is_err()
            {
                if !ops.show_window(win, SW_MINIMIZE) {
                    warn!(%win, "could not re-minimize after failed placement");
                }
                return false;
            }
            ops.show_window(win, SW_MINIMIZE)
        } else {
            if !ops.show_window(win, SW_MINIMIZE) {
                return false;
            }
            ops.settle(MINIMIZE_SETTLE);
            if !ops.show_window(win, placement.show_cmd) {
                warn!(%win, "could not restore prior show state");
                return false;
            }
            ops.set_window_pos(win, ZOrder::Top, target, PosFlags::SHOW)
                .is_ok()
        }
    }
}

/// Rewrite the normal-position rectangle through the placement record
/// instead of a positioning call.
struct PlacementSet;

impl PlaceStrategy for PlacementSet {
    fn name(&self) -> &'static str {
        "placement"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool {
        let Ok(mut placement) = ops.placement(win) else {
            return false;
        };
        let was_minimized = placement.is_minimized();
        placement.normal = target;
        if was_minimized {
            // SetWindowPlacement applies the normal rect on restore.
            placement.show_cmd = SW_RESTORE;
        }
        if ops.set_placement(win, &placement).is_err() {
            return false;
        }
        if was_minimized && !ops.show_window(win, SW_MINIMIZE) {
            warn!(%win, "could not re-minimize after placement write");
            return false;
        }
        true
    }
}

/// Non-blocking positioning: posts the request to the owning thread, so a
/// hung or restricted owner cannot wedge the call.
struct AsyncSet;

impl PlaceStrategy for AsyncSet {
    fn name(&self) -> &'static str {
        "async"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool {
        if ops
            .set_window_pos(win, ZOrder::Top, target, PosFlags::SHOW | PosFlags::ASYNC)
            .is_ok()
        {
            return true;
        }
        ops.set_window_pos(
            win,
            ZOrder::Top,
            target,
            PosFlags::SHOW | PosFlags::ASYNC | PosFlags::NOZORDER,
        )
        .is_ok()
    }
}

/// Nudge the window with restore system-commands through its message
/// queue (which bypasses some privilege checks), then retry the direct
/// set.
struct RestoreMessageSet;

impl PlaceStrategy for RestoreMessageSet {
    fn name(&self) -> &'static str {
        "restore-message"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool {
        if let Err(err) = ops.post_restore(win) {
            debug!(%win, %err, "restore post refused");
        }
        ops.send_restore(win);
        ops.settle(RESTORE_MSG_SETTLE);
        ops.set_window_pos(win, ZOrder::Top, target, PosFlags::SHOW)
            .is_ok()
    }
}

/// Clear the always-on-top style if present, then retry with
/// non-activating, non-reordering flags.
struct TopmostToggleSet;

impl PlaceStrategy for TopmostToggleSet {
    fn name(&self) -> &'static str {
        "topmost-toggle"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool {
        let Some((_style, ex_style)) = ops.window_styles(win) else {
            return false;
        };
        if ex_style & WS_EX_TOPMOST != 0 {
            if ops
                .set_window_pos(
                    win,
                    ZOrder::NoTopmost,
                    Rect::default(),
                    PosFlags::NOMOVE | PosFlags::NOSIZE,
                )
                .is_err()
            {
                return false;
            }
            ops.settle(TOPMOST_CLEAR_SETTLE);
        }
        if ops
            .set_window_pos(
                win,
                ZOrder::Top,
                target,
                PosFlags::NOZORDER | PosFlags::NOACTIVATE | PosFlags::ASYNC,
            )
            .is_ok()
        {
            return true;
        }
        ops.set_window_pos(
            win,
            ZOrder::Top,
            target,
            PosFlags::SHOW | PosFlags::NOZORDER | PosFlags::ASYNC,
        )
        .is_ok()
    }
}

/// Touch the window through the assistive-technology surface (acquire and
/// release its accessibility object), then retry the asynchronous set.
struct AccessibleProbeSet;

impl PlaceStrategy for AccessibleProbeSet {
    fn name(&self) -> &'static str {
        "accessible-probe"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool {
        if let Err(err) = ops.accessible_probe(win) {
            debug!(%win, %err, "accessibility probe failed");
            return false;
        }
        async_retry(ops, win, target)
    }
}

/// Last resort: the asynchronous retry without the probe.
struct FinalAsyncSet;

impl PlaceStrategy for FinalAsyncSet {
    fn name(&self) -> &'static str {
        "final-async"
    }

    fn attempt(&self, ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool {
        async_retry(ops, win, target)
    }
}

fn async_retry(ops: &dyn NativeOps, win: WindowHandle, target: Rect) -> bool {
    if ops
        .set_window_pos(
            win,
            ZOrder::Top,
            target,
            PosFlags::ASYNC | PosFlags::NOZORDER | PosFlags::NOACTIVATE,
        )
        .is_ok()
    {
        return true;
    }
    ops.set_window_pos(
        win,
        ZOrder::Top,
        target,
        PosFlags::ASYNC | PosFlags::SHOW,
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::ops::{MockOps, MockWindow, SW_SHOWMINIMIZED, SW_SHOWNORMAL};

    fn mock_with_window(rect: Rect) -> (MockOps, WindowHandle) {
        let ops = MockOps::new();
        let win = MockWindow::new(42, "Target", rect);
        let handle = win.handle;
        ops.set_windows(vec![win]);
        (ops, handle)
    }

    #[test]
    fn window_already_at_target_issues_no_mutation() {
        let target = Rect::new(100, 100, 800, 600);
        let (ops, handle) = mock_with_window(target);

        place_window(&ops, handle, target).unwrap();

        assert_eq!(ops.call_count("set_window_pos"), 0);
        assert_eq!(ops.call_count("show_window"), 0);
        assert_eq!(ops.call_count("set_placement"), 0);
    }

    #[test]
    fn direct_set_moves_the_window() {
        let (ops, handle) = mock_with_window(Rect::new(0, 0, 640, 480));
        let target = Rect::new(100, 100, 800, 600);

        place_window(&ops, handle, target).unwrap();

        assert_eq!(ops.window(handle).unwrap().rect, target);
        assert_eq!(ops.call_count("set_window_pos"), 1);
    }

    #[test]
    fn dead_handle_is_reported_before_any_strategy() {
        let ops = MockOps::new();
        let gone = WindowHandle::from_raw(0xDEAD);
        assert!(matches!(
            place_window(&ops, gone, Rect::new(0, 0, 100, 100)),
            Err(Error::WindowGone)
        ));
        assert!(ops.calls().is_empty());
    }

    #[test]
    fn escalation_stops_at_first_success() {
        struct Scripted {
            name: &'static str,
            succeed: bool,
            hits: &'static AtomicUsize,
        }
        impl PlaceStrategy for Scripted {
            fn name(&self) -> &'static str {
                self.name
            }
            fn attempt(&self, _: &dyn NativeOps, _: WindowHandle, _: Rect) -> bool {
                self.hits.fetch_add(1, Ordering::SeqCst);
                self.succeed
            }
        }

        static FIRST: AtomicUsize = AtomicUsize::new(0);
        static SECOND: AtomicUsize = AtomicUsize::new(0);
        static THIRD: AtomicUsize = AtomicUsize::new(0);
        static FOURTH: AtomicUsize = AtomicUsize::new(0);

        let chain: [&dyn PlaceStrategy; 4] = [
            &Scripted { name: "a", succeed: false, hits: &FIRST },
            &Scripted { name: "b", succeed: false, hits: &SECOND },
            &Scripted { name: "c", succeed: true, hits: &THIRD },
            &Scripted { name: "d", succeed: true, hits: &FOURTH },
        ];

        let (ops, handle) = mock_with_window(Rect::new(0, 0, 640, 480));
        place_window_with(&ops, &chain, handle, Rect::new(5, 5, 100, 100)).unwrap();

        assert_eq!(FIRST.load(Ordering::SeqCst), 1);
        assert_eq!(SECOND.load(Ordering::SeqCst), 1);
        assert_eq!(THIRD.load(Ordering::SeqCst), 1);
        // The strategy after the first success is never consulted.
        assert_eq!(FOURTH.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exhaustion_yields_one_terminal_error() {
        struct Refuse;
        impl PlaceStrategy for Refuse {
            fn name(&self) -> &'static str {
                "refuse"
            }
            fn attempt(&self, _: &dyn NativeOps, _: WindowHandle, _: Rect) -> bool {
                false
            }
        }

        let chain: [&dyn PlaceStrategy; 3] = [&Refuse, &Refuse, &Refuse];
        let (ops, handle) = mock_with_window(Rect::new(0, 0, 640, 480));

        let err = place_window_with(&ops, &chain, handle, Rect::new(5, 5, 100, 100)).unwrap_err();
        assert!(matches!(err, Error::PlaceExhausted { attempted: 3 }));
    }

    #[test]
    fn attach_input_detaches_even_when_the_set_fails() {
        let (ops, handle) = mock_with_window(Rect::new(0, 0, 640, 480));
        ops.fail_set_pos_times(1);

        assert!(!AttachInputSet.attempt(&ops, handle, Rect::new(5, 5, 100, 100)));

        assert!(ops.calls_contain("attach_thread_input(7, true)"));
        assert!(ops.calls_contain("attach_thread_input(7, false)"));
    }

    #[test]
    fn minimize_restore_returns_window_to_prior_state() {
        let (ops, handle) = mock_with_window(Rect::new(0, 0, 640, 480));
        let target = Rect::new(50, 50, 800, 600);

        assert!(MinimizeRestoreSet.attempt(&ops, handle, target));

        let after = ops.window(handle).unwrap();
        assert_eq!(after.rect, target);
        assert_eq!(after.show_cmd, SW_SHOWNORMAL);
        assert!(ops.calls_contain("settle(100ms)"));
    }

    #[test]
    fn minimized_window_is_placed_and_re_minimized() {
        let ops = MockOps::new();
        let win = MockWindow {
            show_cmd: SW_SHOWMINIMIZED,
            ..MockWindow::new(9, "Minimized", Rect::new(0, 0, 640, 480))
        };
        let handle = win.handle;
        ops.set_windows(vec![win]);
        let target = Rect::new(50, 50, 800, 600);

        assert!(MinimizeRestoreSet.attempt(&ops, handle, target));

        let after = ops.window(handle).unwrap();
        assert_eq!(after.rect, target);
        assert_eq!(after.show_cmd, SW_SHOWMINIMIZED);
    }

    #[test]
    fn placement_write_updates_normal_rect() {
        let (ops, handle) = mock_with_window(Rect::new(0, 0, 640, 480));
        let target = Rect::new(-1920, 0, 1024, 768);

        assert!(PlacementSet.attempt(&ops, handle, target));
        assert_eq!(ops.window(handle).unwrap().rect, target);
    }

    #[test]
    fn topmost_toggle_clears_the_style_before_placing() {
        let ops = MockOps::new();
        let win = MockWindow {
            ex_style: WS_EX_TOPMOST,
            ..MockWindow::new(3, "OnTop", Rect::new(0, 0, 640, 480))
        };
        let handle = win.handle;
        ops.set_windows(vec![win]);

        assert!(TopmostToggleSet.attempt(&ops, handle, Rect::new(5, 5, 100, 100)));

        assert_eq!(ops.window(handle).unwrap().ex_style & WS_EX_TOPMOST, 0);
        assert!(ops.calls_contain("NoTopmost"));
        assert!(ops.calls_contain("settle(50ms)"));
    }

    #[test]
    fn full_chain_reaches_the_accessibility_probe() {
        let (ops, handle) = mock_with_window(Rect::new(0, 0, 640, 480));
        // direct(1) + attach(1) + async(2) + restore-message(1) +
        // topmost(2) = 7 positioning refusals before the probe, plus the
        // probe's first async retry; its second retry then succeeds.
        ops.fail_set_pos_times(8);
        ops.set_fail_show(true);
        ops.set_fail_placement_write(true);

        place_window(&ops, handle, Rect::new(5, 5, 100, 100)).unwrap();

        assert!(ops.calls_contain("accessible_probe"));
    }
}
