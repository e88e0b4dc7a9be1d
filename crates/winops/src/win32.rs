//! Production [`NativeOps`] backed by the `windows` crate.
//!
//! Handles are re-validated before use but never owned: the window can die
//! between any two calls, which surfaces as an OS error the callers treat
//! as transient.

use std::{ffi::c_void, thread, time::Duration};

use tracing::trace;
use windows::{
    Win32::{
        Foundation::{BOOL, CloseHandle, FALSE, HWND, LPARAM, POINT, RECT, TRUE, WPARAM},
        System::{
            Com::{CoInitialize, CoUninitialize},
            Threading::{
                GetCurrentThreadId, OpenProcess, PROCESS_NAME_FORMAT,
                PROCESS_QUERY_LIMITED_INFORMATION, QueryFullProcessImageNameW,
            },
        },
        UI::{
            Accessibility::{AccessibleObjectFromWindow, IAccessible},
            Input::KeyboardAndMouse::AttachThreadInput,
            WindowsAndMessaging::{
                AllowSetForegroundWindow, EnumWindows, GWL_EXSTYLE, GWL_STYLE, GetClassNameW,
                GetClientRect, GetSystemMetrics, GetWindowPlacement, GetWindowRect,
                GetWindowTextW, GetWindowThreadProcessId, HWND_NOTOPMOST, HWND_TOP, HWND_TOPMOST,
                IsWindow, IsWindowVisible, OBJID_WINDOW, PostMessageW, SC_RESTORE,
                SET_WINDOW_POS_FLAGS, SHOW_WINDOW_CMD, SM_CXSCREEN, SM_CXVIRTUALSCREEN,
                SM_CYSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN,
                SendMessageW, SetForegroundWindow, SetWindowPlacement, SetWindowPos, ShowWindow,
                WINDOW_LONG_PTR_INDEX, WINDOWPLACEMENT, WINDOWPLACEMENT_FLAGS, WM_SYSCOMMAND,
            },
        },
    },
    core::{Interface, PWSTR},
};

use crate::{
    error::{Error, Result},
    geom::{Point, Rect},
    ops::{NativeOps, Placement, PosFlags, WindowHandle, ZOrder},
};

const MAX_NAME: usize = 512;
const MAX_PATH_WIDE: usize = 1024;

/// The real Win32 backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealOps;

fn hwnd(win: WindowHandle) -> HWND {
    HWND(win.raw() as *mut c_void)
}

fn os_err(call: &'static str, err: &windows::core::Error) -> Error {
    Error::Os {
        call,
        code: err.code().0,
    }
}

fn rect_from(rc: RECT) -> Rect {
    Rect::from_edges(rc.left, rc.top, rc.right, rc.bottom)
}

fn rect_to(r: Rect) -> RECT {
    RECT {
        left: r.left(),
        top: r.top(),
        right: r.right(),
        bottom: r.bottom(),
    }
}

#[cfg(target_pointer_width = "64")]
fn window_long(h: HWND, index: WINDOW_LONG_PTR_INDEX) -> isize {
    use windows::Win32::UI::WindowsAndMessaging::GetWindowLongPtrW;
    unsafe { GetWindowLongPtrW(h, index) }
}

#[cfg(target_pointer_width = "32")]
fn window_long(h: HWND, index: WINDOW_LONG_PTR_INDEX) -> isize {
    use windows::Win32::UI::WindowsAndMessaging::GetWindowLongW;
    unsafe { GetWindowLongW(h, index) as isize }
}

unsafe extern "system" fn enum_cb(h: HWND, lparam: LPARAM) -> BOOL {
    // The accumulator lives on the enumerating thread's stack for the
    // duration of the EnumWindows call; no state survives the call.
    let acc = unsafe { &mut *(lparam.0 as *mut Vec<WindowHandle>) };
    acc.push(WindowHandle::from_raw(h.0 as isize));
    TRUE
}

impl NativeOps for RealOps {
    fn enum_windows(&self) -> Result<Vec<WindowHandle>> {
        trace!("enum_windows");
        let mut acc: Vec<WindowHandle> = Vec::new();
        unsafe { EnumWindows(Some(enum_cb), LPARAM(&mut acc as *mut _ as isize)) }
            .map_err(|e| os_err("EnumWindows", &e))?;
        Ok(acc)
    }

    fn is_window(&self, win: WindowHandle) -> bool {
        win.raw() != 0 && unsafe { IsWindow(hwnd(win)) }.as_bool()
    }

    fn is_visible(&self, win: WindowHandle) -> bool {
        unsafe { IsWindowVisible(hwnd(win)) }.as_bool()
    }

    fn window_title(&self, win: WindowHandle) -> Option<String> {
        let mut buf = [0u16; MAX_NAME];
        let len = unsafe { GetWindowTextW(hwnd(win), &mut buf) };
        (len > 0).then(|| String::from_utf16_lossy(&buf[..len as usize]))
    }

    fn window_class(&self, win: WindowHandle) -> Option<String> {
        let mut buf = [0u16; MAX_NAME];
        let len = unsafe { GetClassNameW(hwnd(win), &mut buf) };
        (len > 0).then(|| String::from_utf16_lossy(&buf[..len as usize]))
    }

    fn window_thread_process(&self, win: WindowHandle) -> Option<(u32, u32)> {
        let mut pid = 0u32;
        let thread = unsafe { GetWindowThreadProcessId(hwnd(win), Some(&mut pid)) };
        (thread != 0).then_some((thread, pid))
    }

    fn process_image_path(&self, pid: u32) -> Result<String> {
        if pid == 0 {
            return Err(Error::Os {
                call: "OpenProcess",
                code: 0,
            });
        }
        let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) }
            .map_err(|e| os_err("OpenProcess", &e))?;
        let mut buf = [0u16; MAX_PATH_WIDE];
        let mut len = buf.len() as u32;
        let res = unsafe {
            QueryFullProcessImageNameW(
                process,
                PROCESS_NAME_FORMAT(0),
                PWSTR(buf.as_mut_ptr()),
                &mut len,
            )
        };
        let _ = unsafe { CloseHandle(process) };
        res.map_err(|e| os_err("QueryFullProcessImageNameW", &e))?;
        Ok(String::from_utf16_lossy(&buf[..len as usize]))
    }

    fn window_styles(&self, win: WindowHandle) -> Option<(u32, u32)> {
        if !self.is_window(win) {
            return None;
        }
        let style = window_long(hwnd(win), GWL_STYLE);
        let ex_style = window_long(hwnd(win), GWL_EXSTYLE);
        Some((style as u32, ex_style as u32))
    }

    fn window_rect(&self, win: WindowHandle) -> Result<Rect> {
        let mut rc = RECT::default();
        unsafe { GetWindowRect(hwnd(win), &mut rc) }.map_err(|e| os_err("GetWindowRect", &e))?;
        Ok(rect_from(rc))
    }

    fn client_rect(&self, win: WindowHandle) -> Result<Rect> {
        let mut rc = RECT::default();
        unsafe { GetClientRect(hwnd(win), &mut rc) }.map_err(|e| os_err("GetClientRect", &e))?;
        Ok(rect_from(rc))
    }

    fn set_window_pos(
        &self,
        win: WindowHandle,
        after: ZOrder,
        rect: Rect,
        flags: PosFlags,
    ) -> Result<()> {
        let insert_after = match after {
            ZOrder::Top => HWND_TOP,
            ZOrder::Topmost => HWND_TOPMOST,
            ZOrder::NoTopmost => HWND_NOTOPMOST,
        };
        unsafe {
            SetWindowPos(
                hwnd(win),
                insert_after,
                rect.x,
                rect.y,
                rect.w,
                rect.h,
                SET_WINDOW_POS_FLAGS(flags.bits()),
            )
        }
        .map_err(|e| os_err("SetWindowPos", &e))
    }

    fn show_window(&self, win: WindowHandle, cmd: u32) -> bool {
        unsafe { ShowWindow(hwnd(win), SHOW_WINDOW_CMD(cmd as i32)) }.as_bool()
    }

    fn placement(&self, win: WindowHandle) -> Result<Placement> {
        let mut wp = WINDOWPLACEMENT {
            length: size_of::<WINDOWPLACEMENT>() as u32,
            ..Default::default()
        };
        unsafe { GetWindowPlacement(hwnd(win), &mut wp) }
            .map_err(|e| os_err("GetWindowPlacement", &e))?;
        Ok(Placement {
            show_cmd: wp.showCmd.0 as u32,
            min_pos: Point {
                x: wp.ptMinPosition.x,
                y: wp.ptMinPosition.y,
            },
            max_pos: Point {
                x: wp.ptMaxPosition.x,
                y: wp.ptMaxPosition.y,
            },
            normal: rect_from(wp.rcNormalPosition),
        })
    }

    fn set_placement(&self, win: WindowHandle, placement: &Placement) -> Result<()> {
        let wp = WINDOWPLACEMENT {
            length: size_of::<WINDOWPLACEMENT>() as u32,
            flags: WINDOWPLACEMENT_FLAGS(0),
            showCmd: SHOW_WINDOW_CMD(placement.show_cmd as i32),
            ptMinPosition: POINT {
                x: placement.min_pos.x,
                y: placement.min_pos.y,
            },
            ptMaxPosition: POINT {
                x: placement.max_pos.x,
                y: placement.max_pos.y,
            },
            rcNormalPosition: rect_to(placement.normal),
        };
        unsafe { SetWindowPlacement(hwnd(win), &wp) }
            .map_err(|e| os_err("SetWindowPlacement", &e))
    }

    fn attach_thread_input(&self, thread: u32, attach: bool) -> bool {
        let current = unsafe { GetCurrentThreadId() };
        if current == thread {
            // Attaching a thread to itself is an error; nothing to do.
            return false;
        }
        unsafe { AttachThreadInput(current, thread, BOOL::from(attach)) }.as_bool()
    }

    fn post_restore(&self, win: WindowHandle) -> Result<()> {
        unsafe {
            PostMessageW(
                hwnd(win),
                WM_SYSCOMMAND,
                WPARAM(SC_RESTORE as usize),
                LPARAM(0),
            )
        }
        .map_err(|e| os_err("PostMessageW", &e))
    }

    fn send_restore(&self, win: WindowHandle) {
        unsafe {
            SendMessageW(
                hwnd(win),
                WM_SYSCOMMAND,
                WPARAM(SC_RESTORE as usize),
                LPARAM(0),
            );
        }
    }

    fn set_foreground(&self, win: WindowHandle) -> bool {
        unsafe { SetForegroundWindow(hwnd(win)) }.as_bool()
    }

    fn allow_set_foreground(&self, pid: u32) -> Result<()> {
        unsafe { AllowSetForegroundWindow(pid) }
            .map_err(|e| os_err("AllowSetForegroundWindow", &e))
    }

    fn accessible_probe(&self, win: WindowHandle) -> Result<()> {
        unsafe {
            let _ = CoInitialize(None);
            let mut raw: *mut c_void = std::ptr::null_mut();
            let res = AccessibleObjectFromWindow(
                hwnd(win),
                OBJID_WINDOW.0 as u32,
                &IAccessible::IID,
                &mut raw,
            );
            let out = match res {
                Ok(()) if !raw.is_null() => {
                    // Wrap and drop: the release is the whole point.
                    drop(IAccessible::from_raw(raw));
                    Ok(())
                }
                Ok(()) => Err(Error::Os {
                    call: "AccessibleObjectFromWindow",
                    code: 0,
                }),
                Err(e) => Err(os_err("AccessibleObjectFromWindow", &e)),
            };
            CoUninitialize();
            out
        }
    }

    fn virtual_screen(&self) -> Rect {
        unsafe {
            let x = GetSystemMetrics(SM_XVIRTUALSCREEN);
            let y = GetSystemMetrics(SM_YVIRTUALSCREEN);
            let w = GetSystemMetrics(SM_CXVIRTUALSCREEN);
            let h = GetSystemMetrics(SM_CYVIRTUALSCREEN);
            Rect::new(x, y, w, h)
        }
    }

    fn primary_screen(&self) -> Rect {
        unsafe {
            Rect::new(
                0,
                0,
                GetSystemMetrics(SM_CXSCREEN),
                GetSystemMetrics(SM_CYSCREEN),
            )
        }
    }

    fn settle(&self, delay: Duration) {
        thread::sleep(delay);
    }
}
