pub mod hook;
pub mod macros;
mod mock;
#[cfg(windows)]
mod win32;

pub use hook::{
    BoundedQueue, DefaultMouseHook, HookState, HookVerdict, MockHookBackend, MockHookHandle,
    MouseHookBackend, WheelEvent, INJECT_TAG, WHEEL_QUEUE_CAPACITY,
};
pub use macros::{MacroDefinition, MacroReport, MacroRunner, MacroStep, SessionGate};
pub use mock::{InjectedInput, MockInputBackend};
#[cfg(windows)]
pub use win32::Win32InputBackend;

use crate::control::ScreenPoint;
use crate::keys::{parse_combo, KeyAction, KeyToken, MouseButton, WheelDirection};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Raw OS input primitives. Implementations must be callable from any
/// thread; injection is thread-safe on Windows.
pub trait InputBackend: Send + Sync {
    fn send_key(&self, vk: u16, down: bool) -> anyhow::Result<()>;
    fn send_mouse_button(&self, button: MouseButton, down: bool) -> anyhow::Result<()>;
    fn send_wheel(&self, direction: WheelDirection) -> anyhow::Result<()>;
    fn move_cursor(&self, point: ScreenPoint) -> anyhow::Result<()>;
    fn cursor_position(&self) -> Option<ScreenPoint>;
    /// Physical (async) key state; also used for mouse buttons via their VK.
    fn is_key_down(&self, vk: u16) -> bool;
    fn screen_size(&self) -> Option<(i32, i32)>;
}

#[cfg(not(windows))]
#[derive(Debug, Default)]
pub struct UnsupportedInputBackend;

#[cfg(not(windows))]
impl InputBackend for UnsupportedInputBackend {
    fn send_key(&self, _vk: u16, _down: bool) -> anyhow::Result<()> {
        anyhow::bail!("input injection is only supported on Windows")
    }

    fn send_mouse_button(&self, _button: MouseButton, _down: bool) -> anyhow::Result<()> {
        anyhow::bail!("input injection is only supported on Windows")
    }

    fn send_wheel(&self, _direction: WheelDirection) -> anyhow::Result<()> {
        anyhow::bail!("input injection is only supported on Windows")
    }

    fn move_cursor(&self, _point: ScreenPoint) -> anyhow::Result<()> {
        anyhow::bail!("cursor control is only supported on Windows")
    }

    fn cursor_position(&self) -> Option<ScreenPoint> {
        None
    }

    fn is_key_down(&self, _vk: u16) -> bool {
        false
    }

    fn screen_size(&self) -> Option<(i32, i32)> {
        None
    }
}

pub const DEFAULT_CLICK_JITTER_MS: (u64, u64) = (30, 60);

/// A held input and the press that put it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeldToken {
    token: KeyToken,
    press: u64,
}

/// Owns injection, the low-level mouse hook and the record of which inputs
/// this process is currently holding down.
pub struct InputEngine {
    backend: Arc<dyn InputBackend>,
    hook: Mutex<Box<dyn MouseHookBackend>>,
    hook_state: Arc<HookState>,
    held: Mutex<Vec<HeldToken>>,
    presses: AtomicU64,
    click_jitter_ms: (u64, u64),
}

impl Default for InputEngine {
    fn default() -> Self {
        Self::platform()
    }
}

impl InputEngine {
    pub fn new(backend: Arc<dyn InputBackend>, hook: Box<dyn MouseHookBackend>) -> Self {
        Self {
            backend,
            hook: Mutex::new(hook),
            hook_state: Arc::new(HookState::default()),
            held: Mutex::new(Vec::new()),
            presses: AtomicU64::new(0),
            click_jitter_ms: DEFAULT_CLICK_JITTER_MS,
        }
    }

    #[cfg(windows)]
    pub fn platform() -> Self {
        Self::new(
            Arc::new(Win32InputBackend),
            Box::new(DefaultMouseHook::default()),
        )
    }

    #[cfg(not(windows))]
    pub fn platform() -> Self {
        Self::new(
            Arc::new(UnsupportedInputBackend),
            Box::new(DefaultMouseHook::default()),
        )
    }

    pub fn with_click_jitter(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.click_jitter_ms = (min_ms.min(max_ms), min_ms.max(max_ms));
        self
    }

    /// Install the mouse hook for a run session. A failure is logged and the
    /// wheel/freeze features stay inactive; injection keeps working.
    pub fn init(&self) -> bool {
        let mut hook = match self.hook.lock() {
            Ok(hook) => hook,
            Err(err) => {
                tracing::error!(?err, "mouse hook lock poisoned");
                return false;
            }
        };
        if hook.is_installed() {
            return true;
        }
        self.hook_state.drain_wheel();
        self.hook_state.drain_deltas();
        self.hook_state.set_enabled(true);
        match hook.install(Arc::clone(&self.hook_state)) {
            Ok(()) => {
                tracing::debug!("mouse hook installed");
                true
            }
            Err(err) => {
                self.hook_state.set_enabled(false);
                tracing::error!(?err, "failed to install mouse hook; wheel capture disabled");
                false
            }
        }
    }

    pub fn shutdown(&self) {
        self.hook_state.set_enabled(false);
        self.hook_state.unfreeze();
        match self.hook.lock() {
            Ok(mut hook) => {
                if hook.is_installed() {
                    if let Err(err) = hook.uninstall() {
                        tracing::error!(?err, "failed to uninstall mouse hook");
                    }
                }
            }
            Err(err) => tracing::error!(?err, "mouse hook lock poisoned"),
        }
    }

    pub fn is_hook_installed(&self) -> bool {
        self.hook
            .lock()
            .map(|hook| hook.is_installed())
            .unwrap_or(false)
    }

    pub fn hook_state(&self) -> &Arc<HookState> {
        &self.hook_state
    }

    /// Trigger a `+`-joined combo. `Click` blocks for the randomised
    /// press/release gap, so call it from worker threads only.
    pub fn trigger(&self, combo: &str, action: KeyAction) {
        let parsed = parse_combo(combo);
        if !parsed.macros.is_empty() {
            tracing::warn!(combo, "macro tokens are not injectable; ignoring them");
        }
        match action {
            KeyAction::Press => self.press_tokens(&parsed.tokens),
            KeyAction::Release => self.release_tokens(&parsed.tokens),
            KeyAction::Click => {
                self.press_tokens(&parsed.tokens);
                thread::sleep(self.click_gap());
                self.release_tokens(&parsed.tokens);
            }
        }
    }

    /// Like [`InputEngine::trigger`] but never sleeps on the calling thread:
    /// the release half of a click runs on a short-lived worker.
    ///
    /// The deferred release only lets go of keys still held by this click. A
    /// key pressed again in the meantime, or already dropped by
    /// [`InputEngine::release_all`], is left alone.
    pub fn trigger_tokens_nonblocking(self: &Arc<Self>, tokens: &[KeyToken], action: KeyAction) {
        match action {
            KeyAction::Press => self.press_tokens(tokens),
            KeyAction::Release => self.release_tokens(tokens),
            KeyAction::Click => {
                let presses = self.press_stamped(tokens);
                if presses.is_empty() {
                    return;
                }
                let gap = self.click_gap();
                let engine = Arc::clone(self);
                thread::spawn(move || {
                    thread::sleep(gap);
                    engine.release_unchanged(&presses);
                });
            }
        }
    }

    pub fn press_tokens(&self, tokens: &[KeyToken]) {
        self.press_stamped(tokens);
    }

    pub fn release_tokens(&self, tokens: &[KeyToken]) {
        let mut held = self.held();
        for token in tokens.iter().rev() {
            if let KeyToken::Wheel(_) = token {
                continue;
            }
            held.retain(|h| h.token != *token);
            if let Err(err) = self.send_token(*token, false) {
                tracing::warn!(?err, ?token, "key release injection failed");
            }
        }
    }

    /// Release everything this engine still holds, most recent first.
    pub fn release_all(&self) {
        let mut held = self.held();
        let tokens = std::mem::take(&mut *held);
        if !tokens.is_empty() {
            tracing::info!(count = tokens.len(), "releasing injected keys still held");
        }
        for held in tokens.iter().rev() {
            if let Err(err) = self.send_token(held.token, false) {
                tracing::warn!(?err, token = ?held.token, "key release injection failed");
            }
        }
    }

    pub fn held_tokens(&self) -> Vec<KeyToken> {
        self.held().iter().map(|h| h.token).collect()
    }

    /// Native button down+up at the current cursor position, not tracked as
    /// held.
    pub fn send_native_click(&self, button: MouseButton) {
        if let Err(err) = self
            .backend
            .send_mouse_button(button, true)
            .and_then(|_| self.backend.send_mouse_button(button, false))
        {
            tracing::warn!(?err, ?button, "native click injection failed");
        }
    }

    pub fn drain_wheel_events(&self) -> Vec<WheelEvent> {
        self.hook_state.drain_wheel()
    }

    /// Start or stop relative mouse-look. While frozen the hook turns real
    /// movement into deltas and the cursor is pinned at `anchor`.
    pub fn set_cursor_freeze(&self, anchor: Option<ScreenPoint>) {
        match anchor {
            Some(anchor) => {
                self.hook_state.freeze_at(anchor);
                self.pin_cursor();
            }
            None => self.hook_state.unfreeze(),
        }
    }

    pub fn is_cursor_frozen(&self) -> bool {
        self.hook_state.is_frozen()
    }

    pub fn pin_cursor(&self) {
        if !self.hook_state.is_frozen() {
            return;
        }
        let anchor = self.hook_state.anchor();
        if self.backend.cursor_position() != Some(anchor) {
            self.move_cursor(anchor);
        }
    }

    pub fn drain_mouse_deltas(&self) -> Vec<(i32, i32)> {
        self.hook_state.drain_deltas()
    }

    pub fn cursor_position(&self) -> Option<ScreenPoint> {
        self.backend.cursor_position()
    }

    pub fn move_cursor(&self, point: ScreenPoint) {
        if let Err(err) = self.backend.move_cursor(point) {
            tracing::warn!(?err, ?point, "failed to move cursor");
        }
    }

    pub fn is_key_down(&self, vk: u16) -> bool {
        self.backend.is_key_down(vk)
    }

    pub fn screen_center(&self) -> Option<ScreenPoint> {
        self.backend
            .screen_size()
            .map(|(w, h)| ScreenPoint::new(w / 2, h / 2))
    }

    fn click_gap(&self) -> Duration {
        let (min, max) = self.click_jitter_ms;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Ignores poisoning; the held set must stay reachable for `release_all`.
    fn held(&self) -> MutexGuard<'_, Vec<HeldToken>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send_token(&self, token: KeyToken, down: bool) -> anyhow::Result<()> {
        match token {
            KeyToken::Key(vk) => self.backend.send_key(vk, down),
            KeyToken::Mouse(button) => self.backend.send_mouse_button(button, down),
            // A wheel notch has no "up"; pressing it scrolls once.
            KeyToken::Wheel(direction) if down => self.backend.send_wheel(direction),
            KeyToken::Wheel(_) => Ok(()),
        }
    }

    /// Press `tokens` in order, returning the held entries this call created.
    fn press_stamped(&self, tokens: &[KeyToken]) -> Vec<HeldToken> {
        let mut held = self.held();
        let mut stamped = Vec::new();
        for token in tokens {
            if let Err(err) = self.send_token(*token, true) {
                tracing::warn!(?err, ?token, "key press injection failed");
                continue;
            }
            if let KeyToken::Wheel(_) = token {
                continue;
            }
            let entry = HeldToken {
                token: *token,
                press: self.presses.fetch_add(1, Ordering::Relaxed),
            };
            held.retain(|h| h.token != *token);
            held.push(entry);
            stamped.push(entry);
        }
        stamped
    }

    fn release_unchanged(&self, presses: &[HeldToken]) {
        let mut held = self.held();
        for press in presses.iter().rev() {
            let Some(pos) = held.iter().position(|h| h == press) else {
                tracing::trace!(token = ?press.token, "key re-pressed or already released; skipping click release");
                continue;
            };
            held.remove(pos);
            if let Err(err) = self.send_token(press.token, false) {
                tracing::warn!(?err, token = ?press.token, "key release injection failed");
            }
        }
    }
}

impl Drop for InputEngine {
    fn drop(&mut self) {
        self.release_all();
        self.shutdown();
    }
}
