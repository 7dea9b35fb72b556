use crate::control::ScreenPoint;
use crate::events::{RuntimeEvent, RuntimeEventSink};
use crate::input::InputEngine;
use crate::keys::MouseButton;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// Extended window style bits (winuser.h).
pub const EX_TRANSPARENT: u32 = 0x0000_0020;
pub const EX_LAYERED: u32 = 0x0008_0000;
pub const EX_NOACTIVATE: u32 = 0x0800_0000;

pub const DEFAULT_FORWARD_RESTORE: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassthroughMode {
    /// Everything goes to the game.
    On,
    /// Click-through except directly over a control.
    #[default]
    Off,
    /// Intercept everywhere except directly over a control.
    Block,
}

impl PassthroughMode {
    pub fn next(self) -> Self {
        match self {
            PassthroughMode::On => PassthroughMode::Off,
            PassthroughMode::Off => PassthroughMode::Block,
            PassthroughMode::Block => PassthroughMode::On,
        }
    }

    pub fn is_smart(self) -> bool {
        !matches!(self, PassthroughMode::On)
    }
}

impl fmt::Display for PassthroughMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassthroughMode::On => write!(f, "on"),
            PassthroughMode::Off => write!(f, "off"),
            PassthroughMode::Block => write!(f, "block"),
        }
    }
}

/// Extended style the overlay should carry. `on_control` is `None` when
/// applying a mode baseline before the first hit test.
pub fn target_style(current: u32, mode: PassthroughMode, on_control: Option<bool>) -> u32 {
    let base = (current & !(EX_TRANSPARENT | EX_NOACTIVATE)) | EX_LAYERED;
    match (mode, on_control) {
        (PassthroughMode::On, _) => base | EX_TRANSPARENT,
        (PassthroughMode::Off, Some(true)) => base,
        (PassthroughMode::Off, _) => base | EX_TRANSPARENT,
        (PassthroughMode::Block, Some(true)) => base | EX_TRANSPARENT,
        (PassthroughMode::Block, _) => base | EX_NOACTIVATE,
    }
}

/// The one overlay window whose extended style is managed. Calls must come
/// from the thread that owns the window.
pub trait OverlayWindow: Send {
    fn ex_style(&self) -> anyhow::Result<u32>;
    fn set_ex_style(&mut self, style: u32) -> anyhow::Result<()>;
    fn is_foreground(&self) -> bool;
    /// Give foreground focus to the top-level window under `point`.
    fn focus_window_under(&mut self, point: ScreenPoint) -> anyhow::Result<()>;
}

#[cfg(windows)]
pub use win32::Win32OverlayWindow;

#[cfg(windows)]
mod win32 {
    use super::OverlayWindow;
    use crate::control::ScreenPoint;
    use raw_window_handle::{HasWindowHandle, RawWindowHandle};
    use windows::Win32::Foundation::{SetLastError, HWND, POINT, WIN32_ERROR};
    use windows::Win32::UI::WindowsAndMessaging::{
        GetAncestor, GetForegroundWindow, GetWindowLongW, SetForegroundWindow, SetWindowLongW,
        WindowFromPoint, GA_ROOT, GWL_EXSTYLE,
    };

    #[derive(Debug, Clone, Copy)]
    pub struct Win32OverlayWindow {
        hwnd: isize,
    }

    impl Win32OverlayWindow {
        pub fn from_raw(handle: RawWindowHandle) -> Option<Self> {
            match handle {
                RawWindowHandle::Win32(h) => Some(Self { hwnd: h.hwnd.get() }),
                _ => None,
            }
        }

        pub fn from_window(window: &impl HasWindowHandle) -> Option<Self> {
            window
                .window_handle()
                .ok()
                .and_then(|handle| Self::from_raw(handle.as_raw()))
        }

        fn hwnd(&self) -> HWND {
            HWND(self.hwnd as *mut core::ffi::c_void)
        }
    }

    fn last_error() -> Option<windows::core::Error> {
        let err = windows::core::Error::from_win32();
        err.code().is_err().then_some(err)
    }

    impl OverlayWindow for Win32OverlayWindow {
        fn ex_style(&self) -> anyhow::Result<u32> {
            unsafe { SetLastError(WIN32_ERROR(0)) };
            let style = unsafe { GetWindowLongW(self.hwnd(), GWL_EXSTYLE) };
            if style == 0 {
                if let Some(err) = last_error() {
                    anyhow::bail!("GetWindowLongW failed: {err}");
                }
            }
            Ok(style as u32)
        }

        fn set_ex_style(&mut self, style: u32) -> anyhow::Result<()> {
            unsafe { SetLastError(WIN32_ERROR(0)) };
            let previous = unsafe { SetWindowLongW(self.hwnd(), GWL_EXSTYLE, style as i32) };
            if previous == 0 {
                if let Some(err) = last_error() {
                    anyhow::bail!("SetWindowLongW failed: {err}");
                }
            }
            Ok(())
        }

        fn is_foreground(&self) -> bool {
            let foreground = unsafe { GetForegroundWindow() };
            foreground == self.hwnd()
        }

        fn focus_window_under(&mut self, point: ScreenPoint) -> anyhow::Result<()> {
            let hit = unsafe {
                WindowFromPoint(POINT {
                    x: point.x,
                    y: point.y,
                })
            };
            if hit.0.is_null() {
                return Ok(());
            }
            let root = unsafe { GetAncestor(hit, GA_ROOT) };
            let target = if root.0.is_null() { hit } else { root };
            if target == self.hwnd() {
                return Ok(());
            }
            if !unsafe { SetForegroundWindow(target) }.as_bool() {
                anyhow::bail!("SetForegroundWindow refused focus change");
            }
            Ok(())
        }
    }
}

/// Stand-in used by the headless host when no overlay window exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedWindow {
    style: u32,
}

impl OverlayWindow for DetachedWindow {
    fn ex_style(&self) -> anyhow::Result<u32> {
        Ok(self.style)
    }

    fn set_ex_style(&mut self, style: u32) -> anyhow::Result<()> {
        self.style = style;
        Ok(())
    }

    fn is_foreground(&self) -> bool {
        false
    }

    fn focus_window_under(&mut self, _point: ScreenPoint) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockWindowShared {
    style: u32,
    reads: usize,
    writes: usize,
    foreground: bool,
    fail_writes: bool,
    focus_requests: Vec<ScreenPoint>,
}

/// Test window recording every style read and write.
#[derive(Debug, Clone, Default)]
pub struct MockOverlayWindow {
    shared: Arc<Mutex<MockWindowShared>>,
}

impl MockOverlayWindow {
    pub fn new() -> (Self, MockWindowHandle) {
        let window = Self::default();
        let handle = MockWindowHandle {
            shared: Arc::clone(&window.shared),
        };
        (window, handle)
    }
}

impl OverlayWindow for MockOverlayWindow {
    fn ex_style(&self) -> anyhow::Result<u32> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| anyhow::anyhow!("mock window lock poisoned"))?;
        shared.reads += 1;
        Ok(shared.style)
    }

    fn set_ex_style(&mut self, style: u32) -> anyhow::Result<()> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| anyhow::anyhow!("mock window lock poisoned"))?;
        if shared.fail_writes {
            anyhow::bail!("mock SetWindowLongW failure");
        }
        shared.writes += 1;
        shared.style = style;
        Ok(())
    }

    fn is_foreground(&self) -> bool {
        self.shared.lock().map(|s| s.foreground).unwrap_or(false)
    }

    fn focus_window_under(&mut self, point: ScreenPoint) -> anyhow::Result<()> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| anyhow::anyhow!("mock window lock poisoned"))?;
        shared.focus_requests.push(point);
        shared.foreground = false;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MockWindowHandle {
    shared: Arc<Mutex<MockWindowShared>>,
}

impl MockWindowHandle {
    pub fn style(&self) -> u32 {
        self.shared.lock().map(|s| s.style).unwrap_or(0)
    }

    pub fn reads(&self) -> usize {
        self.shared.lock().map(|s| s.reads).unwrap_or(0)
    }

    pub fn writes(&self) -> usize {
        self.shared.lock().map(|s| s.writes).unwrap_or(0)
    }

    pub fn set_foreground(&self, foreground: bool) {
        if let Ok(mut s) = self.shared.lock() {
            s.foreground = foreground;
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut s) = self.shared.lock() {
            s.fail_writes = fail;
        }
    }

    pub fn focus_requests(&self) -> Vec<ScreenPoint> {
        self.shared
            .lock()
            .map(|s| s.focus_requests.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRestore {
    style: u32,
    at: Instant,
    /// Bit per [`MouseButton::index`] for each synthetic click in flight.
    buttons: u8,
}

/// Coordinates the overlay's click-through style with what sits under the
/// cursor.
pub struct PassthroughManager {
    window: Box<dyn OverlayWindow>,
    engine: Arc<InputEngine>,
    sink: Arc<dyn RuntimeEventSink>,
    mode: PassthroughMode,
    /// Last style known to be on the window; `None` forces a re-read.
    style: Option<u32>,
    pending_restore: Option<PendingRestore>,
    restore_delay: Duration,
}

impl PassthroughManager {
    pub fn new(
        window: Box<dyn OverlayWindow>,
        engine: Arc<InputEngine>,
        sink: Arc<dyn RuntimeEventSink>,
    ) -> Self {
        Self {
            window,
            engine,
            sink,
            mode: PassthroughMode::default(),
            style: None,
            pending_restore: None,
            restore_delay: DEFAULT_FORWARD_RESTORE,
        }
    }

    pub fn with_restore_delay(mut self, delay: Duration) -> Self {
        self.restore_delay = delay;
        self
    }

    pub fn mode(&self) -> PassthroughMode {
        self.mode
    }

    pub fn current_style(&self) -> Option<u32> {
        self.style
    }

    /// Apply the baseline style for `mode` once and announce the change.
    pub fn set_mode(&mut self, mode: PassthroughMode) {
        self.mode = mode;
        self.pending_restore = None;
        self.style = None;
        if let Err(err) = self.apply(|current| target_style(current, mode, None)) {
            tracing::warn!(?err, %mode, "failed to apply passthrough baseline");
        }
        tracing::info!(%mode, "passthrough mode changed");
        self.sink.dispatch(RuntimeEvent::PassthroughChanged(mode));
    }

    pub fn cycle_mode(&mut self) -> PassthroughMode {
        let next = self.mode.next();
        self.set_mode(next);
        next
    }

    /// Per-tick update for the smart modes. Writes only when the style changes.
    pub fn update_smart_passthrough(&mut self, on_control: bool) {
        if !self.mode.is_smart() || self.pending_restore.is_some() {
            return;
        }
        let mode = self.mode;
        if let Err(err) = self.apply(|current| target_style(current, mode, Some(on_control))) {
            tracing::warn!(?err, on_control, "failed to update passthrough style");
        }
        if mode == PassthroughMode::Block && !on_control {
            self.ensure_game_focus();
        }
    }

    /// Let one native click fall through to the game. The previous style is
    /// put back by [`PassthroughManager::poll`] once the restore delay has
    /// passed.
    pub fn forward_click_to_game(&mut self, point: ScreenPoint, button: MouseButton, now: Instant) {
        let (previous, buttons) = match self.pending_restore {
            Some(pending) => (pending.style, pending.buttons),
            None => match self.read_style() {
                Ok(style) => (style, 0),
                Err(err) => {
                    tracing::warn!(?err, "cannot read style; click not forwarded");
                    return;
                }
            },
        };
        if let Err(err) = self.apply(|current| current | EX_TRANSPARENT | EX_LAYERED) {
            tracing::warn!(?err, "failed to make overlay click-through for forwarding");
            return;
        }
        tracing::debug!(?point, ?button, "forwarding click to game");
        self.engine.send_native_click(button);
        self.pending_restore = Some(PendingRestore {
            style: previous,
            at: now + self.restore_delay,
            buttons: buttons | 1u8 << button.index(),
        });
    }

    pub fn is_forwarding(&self) -> bool {
        self.pending_restore.is_some()
    }

    /// Whether a synthetic click of `button` is still waiting for its restore.
    pub fn is_forwarding_button(&self, button: MouseButton) -> bool {
        self.pending_restore
            .is_some_and(|pending| pending.buttons & (1u8 << button.index()) != 0)
    }

    /// Complete a deferred restore whose deadline has passed.
    pub fn poll(&mut self, now: Instant) {
        let Some(pending) = self.pending_restore else {
            return;
        };
        if now < pending.at {
            return;
        }
        match self.apply(|_| pending.style) {
            Ok(_) => self.pending_restore = None,
            Err(err) => tracing::warn!(?err, "failed to restore style after forwarding; retrying"),
        }
    }

    /// Hand focus back to the game if the overlay has taken it.
    pub fn ensure_game_focus(&mut self) {
        if !self.window.is_foreground() {
            return;
        }
        let Some(cursor) = self.engine.cursor_position() else {
            return;
        };
        let previous = match self.read_style() {
            Ok(style) => style,
            Err(err) => {
                tracing::warn!(?err, "cannot read style for focus restore");
                return;
            }
        };
        if let Err(err) = self.apply(|current| current | EX_TRANSPARENT | EX_LAYERED) {
            tracing::warn!(?err, "failed to make overlay click-through for focus restore");
            return;
        }
        if let Err(err) = self.window.focus_window_under(cursor) {
            tracing::debug!(?err, ?cursor, "could not refocus game window");
        } else {
            tracing::debug!(?cursor, "returned focus to window under cursor");
        }
        if let Err(err) = self.apply(|_| previous) {
            tracing::warn!(?err, "failed to restore style after focus change");
        }
    }

    fn read_style(&mut self) -> anyhow::Result<u32> {
        match self.style {
            Some(style) => Ok(style),
            None => {
                let style = self.window.ex_style()?;
                self.style = Some(style);
                Ok(style)
            }
        }
    }

    /// Returns whether a write happened.
    fn apply(&mut self, target: impl FnOnce(u32) -> u32) -> anyhow::Result<bool> {
        let current = self.read_style()?;
        let wanted = target(current);
        if wanted == current {
            return Ok(false);
        }
        self.window.set_ex_style(wanted)?;
        self.style = Some(wanted);
        Ok(true)
    }
}
