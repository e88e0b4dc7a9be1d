//! Stub backend for non-Windows hosts: every primitive reports
//! [`Error::Unsupported`] so the crate builds and the mock-driven tests run
//! anywhere, while the binary degrades to a clear error message.

use std::time::Duration;

use crate::{
    error::{Error, Result},
    geom::Rect,
    ops::{NativeOps, Placement, PosFlags, WindowHandle, ZOrder},
};

/// Backend used when compiled for anything that is not Windows.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealOps;

impl NativeOps for RealOps {
    fn enum_windows(&self) -> Result<Vec<WindowHandle>> {
        Err(Error::Unsupported)
    }

    fn is_window(&self, _win: WindowHandle) -> bool {
        false
    }

    fn is_visible(&self, _win: WindowHandle) -> bool {
        false
    }

    fn window_title(&self, _win: WindowHandle) -> Option<String> {
        None
    }

    fn window_class(&self, _win: WindowHandle) -> Option<String> {
        None
    }

    fn window_thread_process(&self, _win: WindowHandle) -> Option<(u32, u32)> {
        None
    }

    fn process_image_path(&self, _pid: u32) -> Result<String> {
        Err(Error::Unsupported)
    }

    fn window_styles(&self, _win: WindowHandle) -> Option<(u32, u32)> {
        None
    }

    fn window_rect(&self, _win: WindowHandle) -> Result<Rect> {
        Err(Error::Unsupported)
    }

    fn client_rect(&self, _win: WindowHandle) -> Result<Rect> {
        Err(Error::Unsupported)
    }

    fn set_window_pos(
        &self,
        _win: WindowHandle,
        _after: ZOrder,
        _rect: Rect,
        _flags: PosFlags,
    ) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn show_window(&self, _win: WindowHandle, _cmd: u32) -> bool {
        false
    }

    fn placement(&self, _win: WindowHandle) -> Result<Placement> {
        Err(Error::Unsupported)
    }

    fn set_placement(&self, _win: WindowHandle, _placement: &Placement) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn attach_thread_input(&self, _thread: u32, _attach: bool) -> bool {
        false
    }

    fn post_restore(&self, _win: WindowHandle) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn send_restore(&self, _win: WindowHandle) {}

    fn set_foreground(&self, _win: WindowHandle) -> bool {
        false
    }

    fn allow_set_foreground(&self, _pid: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn accessible_probe(&self, _win: WindowHandle) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn virtual_screen(&self) -> Rect {
        Rect::default()
    }

    fn primary_screen(&self) -> Rect {
        Rect::default()
    }

    fn settle(&self, _delay: Duration) {}
}
