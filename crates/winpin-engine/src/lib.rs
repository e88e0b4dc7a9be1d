//! The reconciliation loop.
//!
//! One pass = enumerate, derive each window's identity, look up its saved
//! position, and drive the positioning engine for every match. Passes run
//! on demand and on a periodic tick; both entry points share one
//! non-reentrant critical section so the store and window list are never
//! read mid-mutation. A failing window never aborts the rest of its pass.

use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;
use store::{PositionStore, ident};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use winops::{NativeOps, Rect, WindowSnapshot};

/// Timing knobs for the loop.
#[derive(Clone, Copy, Debug)]
pub struct EngineCfg {
    /// Interval between periodic passes.
    pub tick: Duration,
    /// Startup grace delay before the first pass, giving other
    /// applications time to finish restoring their own layouts.
    pub grace: Duration,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            grace: Duration::from_secs(2),
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Windows whose identity had a saved position.
    pub matched: usize,
    /// Matches successfully driven to their saved position.
    pub applied: usize,
    /// Matches whose strategy chain was exhausted this pass; retried on
    /// the next tick.
    pub failed: usize,
}

/// Drives enumerator + store + positioning engine.
///
/// Also owns the presentation layer's cached window list: [`Self::refresh`]
/// replaces it from a fresh enumeration, [`Self::cached_windows`] reads it.
/// The cache is distinct from the working set a pass enumerates for
/// itself.
pub struct Reconciler {
    ops: Arc<dyn NativeOps>,
    positions: Arc<PositionStore>,
    cfg: EngineCfg,
    pass_lock: tokio::sync::Mutex<()>,
    cache: RwLock<Vec<WindowSnapshot>>,
}

impl Reconciler {
    /// Build a reconciler over the given backend and store.
    pub fn new(ops: Arc<dyn NativeOps>, positions: Arc<PositionStore>, cfg: EngineCfg) -> Self {
        Self {
            ops,
            positions,
            cfg,
            pass_lock: tokio::sync::Mutex::new(()),
            cache: RwLock::new(Vec::new()),
        }
    }

    /// Run one reconciliation pass now.
    ///
    /// Blocks (asynchronously) while a concurrent pass is in progress;
    /// the pass body itself runs on the blocking pool because strategy
    /// settle delays are blocking sleeps. A panicking pass is contained
    /// here: it is logged and reported as an empty pass.
    pub async fn reconcile_now(self: Arc<Self>) -> PassReport {
        let _guard = self.pass_lock.lock().await;
        let this = Arc::clone(&self);
        match tokio::task::spawn_blocking(move || this.run_pass()).await {
            Ok(report) => report,
            Err(err) => {
                if err.is_panic() {
                    error!("reconciliation pass panicked; will retry on the next tick");
                } else {
                    error!(%err, "reconciliation pass was aborted");
                }
                PassReport::default()
            }
        }
    }

    /// Run the periodic loop until `cancel` fires: one pass after the
    /// startup grace delay, then one per tick. Cancellation is observed
    /// within one tick; an in-flight pass is never interrupted.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            tick_ms = self.cfg.tick.as_millis(),
            grace_ms = self.cfg.grace.as_millis(),
            "reconciliation loop starting"
        );
        tokio::select! {
            () = time::sleep(self.cfg.grace) => {}
            () = cancel.cancelled() => {
                info!("reconciliation loop cancelled during startup grace");
                return;
            }
        }
        let report = Arc::clone(&self).reconcile_now().await;
        debug!(?report, "startup pass complete");

        let mut ticker = time::interval(self.cfg.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick fires immediately; the startup pass
        // already covered it.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("reconciliation loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let report = Arc::clone(&self).reconcile_now().await;
                    if report.matched > 0 {
                        debug!(?report, "periodic pass complete");
                    }
                }
            }
        }
    }

    /// One pass over the current windows. Every per-window failure is
    /// contained and logged; only counts leave this function.
    fn run_pass(&self) -> PassReport {
        let mut report = PassReport::default();

        let positions = match self.positions.list() {
            Ok(map) => map,
            Err(err) => {
                warn!(%err, "could not load saved positions; nothing to reconcile");
                return report;
            }
        };
        if positions.is_empty() {
            return report;
        }

        let windows = match winops::enumerate_windows(self.ops.as_ref()) {
            Ok(windows) => windows,
            Err(err) => {
                warn!(%err, "window enumeration failed; skipping this pass");
                return report;
            }
        };

        for win in &windows {
            let key = ident::window_key(
                &win.title,
                &win.class_name,
                &win.executable,
                win.style,
                win.ex_style,
            );
            let Some(pos) = positions.get(&key) else {
                continue;
            };
            report.matched += 1;
            let target = Rect::new(pos.x, pos.y, pos.width, pos.height);
            match winops::place_window(self.ops.as_ref(), win.handle, target) {
                Ok(()) => {
                    report.applied += 1;
                    debug!(key = %key, ?target, "window reconciled");
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(key = %key, %err, "window could not be reconciled");
                }
            }
        }
        report
    }

    /// Re-enumerate and replace the cached window list. On enumeration
    /// failure the previous cache is left untouched and the error is
    /// returned.
    pub fn refresh(&self) -> winops::Result<Vec<WindowSnapshot>> {
        let windows = winops::enumerate_windows(self.ops.as_ref())?;
        *self.cache.write() = windows.clone();
        Ok(windows)
    }

    /// The cached window list from the last successful [`Self::refresh`].
    /// Handles inside are only valid for that refresh cycle.
    pub fn cached_windows(&self) -> Vec<WindowSnapshot> {
        self.cache.read().clone()
    }
}
