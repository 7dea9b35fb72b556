use crate::control::ScreenPoint;
use crate::keys::WheelDirection;
use anyhow::anyhow;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const WHEEL_QUEUE_CAPACITY: usize = 64;
pub const DELTA_QUEUE_CAPACITY: usize = 256;

/// Marker placed in `dwExtraInfo` of every event this crate injects.
pub const INJECT_TAG: usize = 0x4F56_4C59; // "OVLY"

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelEvent {
    pub direction: WheelDirection,
    pub point: ScreenPoint,
}

/// FIFO that drops its oldest entry once full.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` when an older entry had to be dropped.
    pub fn push(&self, item: T) -> bool {
        let Ok(mut items) = self.items.lock() else {
            return false;
        };
        let mut dropped = false;
        while items.len() >= self.capacity {
            items.pop_front();
            dropped = true;
        }
        items.push_back(item);
        dropped
    }

    pub fn drain(&self) -> Vec<T> {
        match self.items.lock() {
            Ok(mut items) => items.drain(..).collect(),
            Err(err) => {
                tracing::error!(?err, "input queue lock poisoned");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut items) = self.items.lock() {
            items.clear();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    Pass,
    Swallow,
}

/// State shared between the hook callback thread and the polling thread.
///
/// The callback only enqueues and flips atomics; everything else happens on
/// the polling side.
#[derive(Debug)]
pub struct HookState {
    enabled: AtomicBool,
    frozen: AtomicBool,
    anchor_x: AtomicI32,
    anchor_y: AtomicI32,
    swallowed_clicks: AtomicUsize,
    wheel: BoundedQueue<WheelEvent>,
    deltas: BoundedQueue<(i32, i32)>,
}

impl Default for HookState {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            frozen: AtomicBool::new(false),
            anchor_x: AtomicI32::new(0),
            anchor_y: AtomicI32::new(0),
            swallowed_clicks: AtomicUsize::new(0),
            wheel: BoundedQueue::new(WHEEL_QUEUE_CAPACITY),
            deltas: BoundedQueue::new(DELTA_QUEUE_CAPACITY),
        }
    }
}

impl HookState {
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn freeze_at(&self, anchor: ScreenPoint) {
        self.anchor_x.store(anchor.x, Ordering::Release);
        self.anchor_y.store(anchor.y, Ordering::Release);
        self.deltas.clear();
        self.frozen.store(true, Ordering::Release);
    }

    pub fn unfreeze(&self) {
        self.frozen.store(false, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn anchor(&self) -> ScreenPoint {
        ScreenPoint::new(
            self.anchor_x.load(Ordering::Acquire),
            self.anchor_y.load(Ordering::Acquire),
        )
    }

    pub fn wheel_queue(&self) -> &BoundedQueue<WheelEvent> {
        &self.wheel
    }

    pub fn drain_wheel(&self) -> Vec<WheelEvent> {
        self.wheel.drain()
    }

    pub fn drain_deltas(&self) -> Vec<(i32, i32)> {
        self.deltas.drain()
    }

    pub fn swallowed_clicks(&self) -> usize {
        self.swallowed_clicks.load(Ordering::Relaxed)
    }

    /// `delta` is the signed high word of `mouseData` (multiples of 120).
    pub fn on_wheel(&self, delta: i16, point: ScreenPoint, injected: bool) -> HookVerdict {
        if injected || !self.is_enabled() || delta == 0 {
            return HookVerdict::Pass;
        }
        let direction = if delta > 0 {
            WheelDirection::Up
        } else {
            WheelDirection::Down
        };
        self.wheel.push(WheelEvent { direction, point });
        HookVerdict::Pass
    }

    pub fn on_move(&self, point: ScreenPoint, injected: bool) -> HookVerdict {
        if injected || !self.is_enabled() || !self.is_frozen() {
            return HookVerdict::Pass;
        }
        let anchor = self.anchor();
        let delta = (point.x - anchor.x, point.y - anchor.y);
        if delta != (0, 0) {
            self.deltas.push(delta);
        }
        HookVerdict::Swallow
    }

    pub fn on_button(&self, injected: bool) -> HookVerdict {
        if injected || !self.is_enabled() || !self.is_frozen() {
            return HookVerdict::Pass;
        }
        self.swallowed_clicks.fetch_add(1, Ordering::Relaxed);
        HookVerdict::Swallow
    }
}

pub trait MouseHookBackend: Send {
    fn install(&mut self, state: Arc<HookState>) -> anyhow::Result<()>;
    fn uninstall(&mut self) -> anyhow::Result<()>;
    fn is_installed(&self) -> bool;
}

#[cfg(windows)]
pub use platform::Win32MouseHook as DefaultMouseHook;

#[cfg(not(windows))]
#[derive(Debug, Default)]
pub struct DefaultMouseHook;

#[cfg(not(windows))]
impl MouseHookBackend for DefaultMouseHook {
    fn install(&mut self, _state: Arc<HookState>) -> anyhow::Result<()> {
        Err(anyhow!("low-level mouse hooks are not supported on this platform"))
    }

    fn uninstall(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_installed(&self) -> bool {
        false
    }
}

#[cfg(windows)]
mod platform {
    use super::{HookState, HookVerdict, MouseHookBackend, INJECT_TAG};
    use crate::control::ScreenPoint;
    use anyhow::anyhow;
    use once_cell::sync::Lazy;
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;
    use std::time::Duration;

    /// The hook procedure has no user-data pointer, so the live state is
    /// parked here for exactly as long as a [`SlotRegistration`] exists.
    static HOOK_SLOT: Lazy<Mutex<Option<Arc<HookState>>>> = Lazy::new(|| Mutex::new(None));

    #[derive(Debug)]
    struct SlotRegistration;

    impl SlotRegistration {
        fn register(state: Arc<HookState>) -> Self {
            if let Ok(mut slot) = HOOK_SLOT.lock() {
                *slot = Some(state);
            }
            Self
        }
    }

    impl Drop for SlotRegistration {
        fn drop(&mut self) {
            if let Ok(mut slot) = HOOK_SLOT.lock() {
                *slot = None;
            }
        }
    }

    #[derive(Debug)]
    struct HookThread {
        thread_id: u32,
        join: JoinHandle<()>,
    }

    #[derive(Debug, Default)]
    pub struct Win32MouseHook {
        hook_thread: Option<HookThread>,
        registration: Option<SlotRegistration>,
    }

    impl MouseHookBackend for Win32MouseHook {
        fn install(&mut self, state: Arc<HookState>) -> anyhow::Result<()> {
            if self.hook_thread.is_some() {
                return Ok(());
            }

            use windows::Win32::System::LibraryLoader::GetModuleHandleW;
            use windows::Win32::System::Threading::GetCurrentThreadId;
            use windows::Win32::UI::WindowsAndMessaging::{
                DispatchMessageW, GetMessageW, PeekMessageW, SetWindowsHookExW, TranslateMessage,
                UnhookWindowsHookEx, MSG, PM_NOREMOVE, WH_MOUSE_LL,
            };

            let registration = SlotRegistration::register(state);

            // install() only returns once the hook thread has a live hook.
            let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<anyhow::Result<u32>>(1);

            let join = std::thread::spawn(move || {
                let mut msg = MSG::default();
                unsafe {
                    let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
                }

                let thread_id = unsafe { GetCurrentThreadId() };
                let hmodule = match unsafe { GetModuleHandleW(None) } {
                    Ok(h) => h,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow!(err)));
                        return;
                    }
                };

                let mouse_hook = match unsafe {
                    SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), hmodule, 0)
                } {
                    Ok(h) if !h.0.is_null() => h,
                    Ok(_) => {
                        let _ = ready_tx.send(Err(anyhow!(windows::core::Error::from_win32())));
                        return;
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow!(err)));
                        return;
                    }
                };

                let _ = ready_tx.send(Ok(thread_id));

                // WH_MOUSE_LL callbacks are delivered through this thread's queue.
                loop {
                    let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
                    if r.0 <= 0 {
                        break;
                    }
                    unsafe {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }

                unsafe {
                    let _ = UnhookWindowsHookEx(mouse_hook);
                }
            });

            let thread_id = match ready_rx.recv_timeout(Duration::from_secs(2)) {
                Ok(Ok(id)) => id,
                Ok(Err(err)) => {
                    let _ = join.join();
                    return Err(err);
                }
                Err(_) => return Err(anyhow!("mouse hook thread did not signal readiness")),
            };

            self.registration = Some(registration);
            self.hook_thread = Some(HookThread { thread_id, join });
            Ok(())
        }

        fn uninstall(&mut self) -> anyhow::Result<()> {
            if let Some(th) = self.hook_thread.take() {
                use windows::Win32::Foundation::{LPARAM, WPARAM};
                use windows::Win32::UI::WindowsAndMessaging::{PostThreadMessageW, WM_QUIT};
                unsafe {
                    let _ = PostThreadMessageW(th.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
                }
                let _ = th.join.join();
            }
            // Cleared only after the hook is gone so the callback never sees a dangling slot.
            self.registration = None;
            Ok(())
        }

        fn is_installed(&self) -> bool {
            self.hook_thread.is_some()
        }
    }

    impl Drop for Win32MouseHook {
        fn drop(&mut self) {
            let _ = self.uninstall();
        }
    }

    unsafe extern "system" fn mouse_hook_proc(
        n_code: i32,
        w_param: windows::Win32::Foundation::WPARAM,
        l_param: windows::Win32::Foundation::LPARAM,
    ) -> windows::Win32::Foundation::LRESULT {
        use windows::Win32::UI::WindowsAndMessaging::{
            CallNextHookEx, HC_ACTION, HHOOK, MSLLHOOKSTRUCT, WM_LBUTTONDOWN, WM_LBUTTONUP,
            WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_RBUTTONDOWN,
            WM_RBUTTONUP, WM_XBUTTONDOWN, WM_XBUTTONUP,
        };

        if n_code == HC_ACTION as i32 {
            let state = match HOOK_SLOT.try_lock() {
                Ok(slot) => slot.clone(),
                Err(_) => None,
            };
            if let Some(state) = state {
                let info = unsafe { &*(l_param.0 as *const MSLLHOOKSTRUCT) };
                let injected = info.dwExtraInfo == INJECT_TAG;
                let point = ScreenPoint::new(info.pt.x, info.pt.y);
                let verdict = match w_param.0 as u32 {
                    WM_MOUSEWHEEL => {
                        // High word of mouseData is the signed wheel delta.
                        let delta = ((info.mouseData >> 16) & 0xFFFF) as u16 as i16;
                        state.on_wheel(delta, point, injected)
                    }
                    WM_MOUSEMOVE => state.on_move(point, injected),
                    WM_LBUTTONDOWN | WM_LBUTTONUP | WM_RBUTTONDOWN | WM_RBUTTONUP
                    | WM_MBUTTONDOWN | WM_MBUTTONUP | WM_XBUTTONDOWN | WM_XBUTTONUP => {
                        state.on_button(injected)
                    }
                    _ => HookVerdict::Pass,
                };
                if verdict == HookVerdict::Swallow {
                    return windows::Win32::Foundation::LRESULT(1);
                }
            }
        }

        unsafe { CallNextHookEx(HHOOK(std::ptr::null_mut()), n_code, w_param, l_param) }
    }
}

/// Test double that records installs and lets tests play hook callbacks.
#[derive(Clone, Default)]
pub struct MockHookBackend {
    shared: Arc<MockHookShared>,
}

#[derive(Default)]
struct MockHookShared {
    install_count: AtomicUsize,
    uninstall_count: AtomicUsize,
    fail_install: AtomicBool,
    state: Mutex<Option<Arc<HookState>>>,
}

impl MockHookBackend {
    pub fn new() -> (Self, MockHookHandle) {
        let backend = Self::default();
        let handle = MockHookHandle {
            shared: Arc::clone(&backend.shared),
        };
        (backend, handle)
    }
}

impl MouseHookBackend for MockHookBackend {
    fn install(&mut self, state: Arc<HookState>) -> anyhow::Result<()> {
        if self.shared.fail_install.load(Ordering::SeqCst) {
            return Err(anyhow!("mock hook install failure"));
        }
        let mut guard = self.shared.state.lock().map_err(|_| anyhow!("lock"))?;
        if guard.is_none() {
            self.shared.install_count.fetch_add(1, Ordering::SeqCst);
            *guard = Some(state);
        }
        Ok(())
    }

    fn uninstall(&mut self) -> anyhow::Result<()> {
        let mut guard = self.shared.state.lock().map_err(|_| anyhow!("lock"))?;
        if guard.is_some() {
            self.shared.uninstall_count.fetch_add(1, Ordering::SeqCst);
        }
        *guard = None;
        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.shared
            .state
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

pub struct MockHookHandle {
    shared: Arc<MockHookShared>,
}

impl MockHookHandle {
    pub fn install_count(&self) -> usize {
        self.shared.install_count.load(Ordering::SeqCst)
    }

    pub fn uninstall_count(&self) -> usize {
        self.shared.uninstall_count.load(Ordering::SeqCst)
    }

    pub fn fail_next_install(&self, fail: bool) {
        self.shared.fail_install.store(fail, Ordering::SeqCst);
    }

    fn state(&self) -> Option<Arc<HookState>> {
        self.shared.state.lock().ok().and_then(|guard| guard.clone())
    }

    /// Play a wheel notch through the installed callback. `None` when no hook
    /// is installed.
    pub fn emit_wheel(&self, delta: i16, point: ScreenPoint) -> Option<HookVerdict> {
        self.state().map(|state| state.on_wheel(delta, point, false))
    }

    pub fn emit_move(&self, point: ScreenPoint, injected: bool) -> Option<HookVerdict> {
        self.state().map(|state| state.on_move(point, injected))
    }

    pub fn emit_button(&self, injected: bool) -> Option<HookVerdict> {
        self.state().map(|state| state.on_button(injected))
    }
}
