//! Win32 window operations for winpin.
//!
//! Three engines over one trait seam:
//!
//! - [`enumerate_windows`]: snapshot all qualifying visible top-level
//!   windows with best-effort metadata.
//! - [`place_window`]: force a window to a target rectangle through an
//!   escalating chain of workarounds (elevated owners, minimized windows,
//!   focus-restricted states).
//! - [`raise_window`]: bring a window to the foreground through a shorter
//!   chain, recentering stranded off-screen windows first.
//!
//! All OS access goes through [`NativeOps`]; [`MockOps`] exercises the
//! engines in tests on any platform. The production backend is compiled
//! per-target: real Win32 on Windows, an `Unsupported`-reporting stub
//! elsewhere.

use std::sync::Arc;

mod error;
mod geom;
mod ops;
pub mod place;
pub mod raise;
mod snapshot;

#[cfg(windows)]
mod win32;
#[cfg(not(windows))]
#[path = "unsupported.rs"]
mod win32;

pub use error::{Error, Result};
pub use geom::{Point, Rect};
pub use ops::{
    AttachGuard, MockOps, MockWindow, NativeOps, Placement, PosFlags, SW_MINIMIZE, SW_RESTORE,
    SW_SHOW, SW_SHOWMAXIMIZED, SW_SHOWMINIMIZED, SW_SHOWNORMAL, WS_EX_TOPMOST, WindowHandle,
    ZOrder,
};
pub use place::{PlaceStrategy, place_window, place_window_with};
pub use raise::{RaiseStrategy, raise_window, raise_window_with};
pub use snapshot::{MIN_WINDOW_EDGE, WindowSnapshot, enumerate_windows};
pub use win32::RealOps;

/// The production backend for the current target, behind the trait seam.
pub fn native() -> Arc<dyn NativeOps> {
    Arc::new(RealOps)
}
