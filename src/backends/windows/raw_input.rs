//! Windows Raw Input parsing (mouse).
//!
//! Parses `WM_INPUT` payloads into [`MousePacket`]s. Device bookkeeping and translation to
//! raw events live in [`RawInputFeeder`](super::RawInputFeeder).
//!
//! ## Conventions
//! - Mouse deltas are reported in **raw OS units** (counts) as provided by Raw Input.
//! - Wheel deltas are reported in **raw WHEEL_DELTA units** (typically ±120 per notch).
//! - The Raw Input device handle is kept as a `usize` key so packets can cross threads.

#![cfg(target_os = "windows")]

use crate::backends::raw_mouse::{MousePacket, RI_MOUSE_HWHEEL, RI_MOUSE_WHEEL};
use core::ffi::c_void;
use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::UI::Input::*;

/// `RAWMOUSE::usFlags` bit: coordinates are absolute.
const MOUSE_MOVE_ABSOLUTE: u16 = 0x0001;

/// One mouse packet and the device that produced it.
#[derive(Clone, Copy, Debug)]
pub struct RawMouseInput {
    /// Raw Input device handle, as an opaque key.
    pub device: usize,
    pub packet: MousePacket,
}

/// Parses a `WM_INPUT` lparam. Non-mouse input yields `None`.
pub fn read_wm_input(lparam: isize) -> Option<RawMouseInput> {
    unsafe {
        let mut size: u32 = 0;
        let r0 = GetRawInputData(
            lparam as _,
            RID_INPUT,
            core::ptr::null_mut(),
            &mut size,
            core::mem::size_of::<RAWINPUTHEADER>() as u32,
        );
        if r0 == u32::MAX || size == 0 {
            return None;
        }

        let mut buf = vec![0u8; size as usize];
        let r1 = GetRawInputData(
            lparam as _,
            RID_INPUT,
            buf.as_mut_ptr() as *mut c_void,
            &mut size,
            core::mem::size_of::<RAWINPUTHEADER>() as u32,
        );
        if r1 == u32::MAX {
            return None;
        }

        read_raw_input_bytes(&buf)
    }
}

/// Parses a `RID_INPUT` payload copied out during `WM_INPUT`.
pub fn read_raw_input_bytes(buf: &[u8]) -> Option<RawMouseInput> {
    let hdr_sz = core::mem::size_of::<RAWINPUTHEADER>();
    if buf.len() < hdr_sz {
        return None;
    }

    unsafe {
        let hdr: RAWINPUTHEADER = core::ptr::read_unaligned(buf.as_ptr() as *const RAWINPUTHEADER);
        if hdr.dwType != RIM_TYPEMOUSE {
            return None;
        }
        let need = hdr_sz + core::mem::size_of::<RAWMOUSE>();
        if buf.len() < need {
            return None;
        }

        let m: RAWMOUSE = core::ptr::read_unaligned(buf.as_ptr().add(hdr_sz) as *const RAWMOUSE);
        let button_flags: u16 = m.Anonymous.Anonymous.usButtonFlags;
        let button_data: u16 = m.Anonymous.Anonymous.usButtonData;

        let wheel = |flag: u16| {
            if button_flags & flag != 0 {
                button_data as i16
            } else {
                0
            }
        };

        Some(RawMouseInput {
            device: hdr.hDevice as usize,
            packet: MousePacket {
                dx: m.lLastX,
                dy: m.lLastY,
                absolute: (m.usFlags as u16) & MOUSE_MOVE_ABSOLUTE != 0,
                button_flags,
                wheel_delta: wheel(RI_MOUSE_WHEEL),
                hwheel_delta: wheel(RI_MOUSE_HWHEEL),
            },
        })
    }
}

/// Raw Input device interface path (`RIDI_DEVICENAME`).
pub fn device_name(device: usize) -> Option<String> {
    let hdev = device as HANDLE;
    unsafe {
        let mut size: u32 = 0;
        let r0 = GetRawInputDeviceInfoW(hdev, RIDI_DEVICENAME, core::ptr::null_mut(), &mut size);
        if r0 == u32::MAX || size == 0 {
            return None;
        }

        let mut wide: Vec<u16> = vec![0u16; size as usize];
        let r1 = GetRawInputDeviceInfoW(
            hdev,
            RIDI_DEVICENAME,
            wide.as_mut_ptr() as *mut c_void,
            &mut size,
        );
        if r1 == u32::MAX {
            return None;
        }

        while wide.last() == Some(&0) {
            wide.pop();
        }
        Some(String::from_utf16_lossy(&wide))
    }
}
