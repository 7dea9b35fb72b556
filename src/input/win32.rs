use super::InputBackend;
use anyhow::Context;
use crate::control::ScreenPoint;
use crate::input::hook::INJECT_TAG;
use crate::keys::{is_extended_key, MouseButton, WheelDirection};
use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, MapVirtualKeyW, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE,
    KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, MAPVK_VK_TO_VSC,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL, MOUSEEVENTF_XDOWN,
    MOUSEEVENTF_XUP, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetSystemMetrics, SetCursorPos, SM_CXSCREEN, SM_CYSCREEN,
};

const WHEEL_DELTA: i32 = 120;
const XBUTTON1: i32 = 0x0001;
const XBUTTON2: i32 = 0x0002;

/// `SendInput`/`GetAsyncKeyState` backed injection. Every event carries
/// [`INJECT_TAG`] so the mouse hook can tell it apart from real input.
#[derive(Debug, Default)]
pub struct Win32InputBackend;

impl Win32InputBackend {
    fn send(inputs: &[INPUT]) -> anyhow::Result<()> {
        let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            anyhow::bail!(
                "SendInput injected {sent} of {} events: {}",
                inputs.len(),
                windows::core::Error::from_win32()
            );
        }
        Ok(())
    }

    fn mouse_input(flags: MOUSE_EVENT_FLAGS, mouse_data: i32) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: 0,
                    dy: 0,
                    mouseData: mouse_data,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: INJECT_TAG,
                },
            },
        }
    }
}

impl InputBackend for Win32InputBackend {
    fn send_key(&self, vk: u16, down: bool) -> anyhow::Result<()> {
        // Games commonly read scan codes, so send both.
        let scan = unsafe { MapVirtualKeyW(vk as u32, MAPVK_VK_TO_VSC) } as u16;
        let mut flags = KEYBD_EVENT_FLAGS(0);
        if is_extended_key(vk) {
            flags = flags | KEYEVENTF_EXTENDEDKEY;
        }
        if !down {
            flags = flags | KEYEVENTF_KEYUP;
        }
        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: scan,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: INJECT_TAG,
                },
            },
        };
        Self::send(&[input])
    }

    fn send_mouse_button(&self, button: MouseButton, down: bool) -> anyhow::Result<()> {
        let (flags, data) = match (button, down) {
            (MouseButton::Left, true) => (MOUSEEVENTF_LEFTDOWN, 0),
            (MouseButton::Left, false) => (MOUSEEVENTF_LEFTUP, 0),
            (MouseButton::Right, true) => (MOUSEEVENTF_RIGHTDOWN, 0),
            (MouseButton::Right, false) => (MOUSEEVENTF_RIGHTUP, 0),
            (MouseButton::Middle, true) => (MOUSEEVENTF_MIDDLEDOWN, 0),
            (MouseButton::Middle, false) => (MOUSEEVENTF_MIDDLEUP, 0),
            (MouseButton::X1, true) => (MOUSEEVENTF_XDOWN, XBUTTON1),
            (MouseButton::X1, false) => (MOUSEEVENTF_XUP, XBUTTON1),
            (MouseButton::X2, true) => (MOUSEEVENTF_XDOWN, XBUTTON2),
            (MouseButton::X2, false) => (MOUSEEVENTF_XUP, XBUTTON2),
        };
        Self::send(&[Self::mouse_input(flags, data)])
    }

    fn send_wheel(&self, direction: WheelDirection) -> anyhow::Result<()> {
        let delta = match direction {
            WheelDirection::Up => WHEEL_DELTA,
            WheelDirection::Down => -WHEEL_DELTA,
        };
        Self::send(&[Self::mouse_input(MOUSEEVENTF_WHEEL, delta)])
    }

    fn move_cursor(&self, point: ScreenPoint) -> anyhow::Result<()> {
        let moved = unsafe { SetCursorPos(point.x, point.y) };
        moved.context("SetCursorPos failed")
    }

    fn cursor_position(&self) -> Option<ScreenPoint> {
        let mut point = POINT { x: 0, y: 0 };
        if unsafe { GetCursorPos(&mut point).is_ok() } {
            Some(ScreenPoint::new(point.x, point.y))
        } else {
            None
        }
    }

    fn is_key_down(&self, vk: u16) -> bool {
        let state = unsafe { GetAsyncKeyState(vk as i32) };
        state < 0
    }

    fn screen_size(&self) -> Option<(i32, i32)> {
        let width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
        (width > 0 && height > 0).then_some((width, height))
    }
}
