use overlay_input::control::ScreenPoint;
use overlay_input::events::{NullSink, RuntimeEvent, RuntimeEventSink};
use overlay_input::input::{InjectedInput, InputEngine, MockHookBackend, MockInputBackend};
use overlay_input::keys::MouseButton;
use overlay_input::passthrough::{
    MockOverlayWindow, MockWindowHandle, PassthroughManager, PassthroughMode, EX_LAYERED,
    EX_NOACTIVATE, EX_TRANSPARENT,
};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn manager() -> (Arc<MockInputBackend>, MockWindowHandle, PassthroughManager) {
    let backend = Arc::new(MockInputBackend::default());
    let (hook, _hook_handle) = MockHookBackend::new();
    let engine = Arc::new(InputEngine::new(backend.clone(), Box::new(hook)));
    let (window, handle) = MockOverlayWindow::new();
    let manager = PassthroughManager::new(Box::new(window), engine, Arc::new(NullSink));
    (backend, handle, manager)
}

#[test]
fn block_mode_styles_follow_cursor_and_are_idempotent() {
    let (_backend, window, mut pt) = manager();
    pt.set_mode(PassthroughMode::Block);
    assert_eq!(window.style(), EX_LAYERED | EX_NOACTIVATE);

    pt.update_smart_passthrough(true);
    assert_eq!(window.style(), EX_LAYERED | EX_TRANSPARENT);
    let (reads, writes) = (window.reads(), window.writes());
    pt.update_smart_passthrough(true);
    assert_eq!((window.reads(), window.writes()), (reads, writes));

    pt.update_smart_passthrough(false);
    assert_eq!(window.style(), EX_LAYERED | EX_NOACTIVATE);
    let (reads, writes) = (window.reads(), window.writes());
    pt.update_smart_passthrough(false);
    assert_eq!((window.reads(), window.writes()), (reads, writes));
}

#[test]
fn smart_off_mode_intercepts_only_over_controls() {
    let (_backend, window, mut pt) = manager();
    pt.set_mode(PassthroughMode::Off);
    assert_eq!(window.style() & EX_TRANSPARENT, EX_TRANSPARENT);
    pt.update_smart_passthrough(true);
    assert_eq!(window.style(), EX_LAYERED);
    pt.update_smart_passthrough(false);
    assert_eq!(window.style(), EX_LAYERED | EX_TRANSPARENT);
}

#[test]
fn full_passthrough_ignores_smart_updates() {
    let (_backend, window, mut pt) = manager();
    pt.set_mode(PassthroughMode::On);
    let writes = window.writes();
    pt.update_smart_passthrough(true);
    pt.update_smart_passthrough(false);
    assert_eq!(window.writes(), writes);
    assert_eq!(window.style(), EX_LAYERED | EX_TRANSPARENT);
}

#[test]
fn set_mode_announces_change() {
    let backend = Arc::new(MockInputBackend::default());
    let (hook, _h) = MockHookBackend::new();
    let engine = Arc::new(InputEngine::new(backend, Box::new(hook)));
    let (window, _handle) = MockOverlayWindow::new();
    let (tx, rx) = channel();
    let sink: Arc<dyn RuntimeEventSink> = Arc::new(overlay_input::events::ChannelSink::new(tx));
    let mut pt = PassthroughManager::new(Box::new(window), engine, sink);
    assert_eq!(pt.cycle_mode(), PassthroughMode::Block);
    assert_eq!(
        rx.try_recv().ok(),
        Some(RuntimeEvent::PassthroughChanged(PassthroughMode::Block))
    );
}

#[test]
fn forwarded_click_restores_style_after_delay() {
    let (backend, window, pt) = manager();
    let mut pt = pt.with_restore_delay(Duration::from_millis(30));
    pt.set_mode(PassthroughMode::Off);
    pt.update_smart_passthrough(true);
    assert_eq!(window.style(), EX_LAYERED);

    let t0 = Instant::now();
    pt.forward_click_to_game(ScreenPoint::new(10, 10), MouseButton::Left, t0);
    assert_eq!(window.style(), EX_LAYERED | EX_TRANSPARENT);
    assert!(pt.is_forwarding_button(MouseButton::Left));
    assert!(!pt.is_forwarding_button(MouseButton::Right));
    assert_eq!(
        backend.events(),
        vec![
            InjectedInput::MouseButton {
                button: MouseButton::Left,
                down: true
            },
            InjectedInput::MouseButton {
                button: MouseButton::Left,
                down: false
            },
        ]
    );

    // Smart updates wait for the restore.
    pt.update_smart_passthrough(true);
    pt.poll(t0 + Duration::from_millis(10));
    assert!(pt.is_forwarding());
    assert_eq!(window.style(), EX_LAYERED | EX_TRANSPARENT);

    pt.poll(t0 + Duration::from_millis(30));
    assert!(!pt.is_forwarding());
    assert!(!pt.is_forwarding_button(MouseButton::Left));
    assert_eq!(window.style(), EX_LAYERED);
}

#[test]
fn second_forward_keeps_original_style_and_both_buttons() {
    let (_backend, window, pt) = manager();
    let mut pt = pt.with_restore_delay(Duration::from_millis(30));
    pt.set_mode(PassthroughMode::Off);
    pt.update_smart_passthrough(true);

    let t0 = Instant::now();
    pt.forward_click_to_game(ScreenPoint::new(10, 10), MouseButton::Right, t0);
    pt.forward_click_to_game(
        ScreenPoint::new(10, 10),
        MouseButton::Middle,
        t0 + Duration::from_millis(10),
    );
    assert!(pt.is_forwarding_button(MouseButton::Right));
    assert!(pt.is_forwarding_button(MouseButton::Middle));

    pt.poll(t0 + Duration::from_millis(30));
    assert!(pt.is_forwarding());
    pt.poll(t0 + Duration::from_millis(40));
    assert!(!pt.is_forwarding());
    assert_eq!(window.style(), EX_LAYERED);
}

#[test]
fn focus_is_returned_to_window_under_cursor_in_block_mode() {
    let (backend, window, mut pt) = manager();
    backend.set_cursor(ScreenPoint::new(300, 200));
    pt.set_mode(PassthroughMode::Block);
    window.set_foreground(true);

    pt.update_smart_passthrough(false);
    assert_eq!(window.focus_requests(), vec![ScreenPoint::new(300, 200)]);
    assert_eq!(window.style(), EX_LAYERED | EX_NOACTIVATE);

    // Focus is already back with the game; nothing else to do.
    let writes = window.writes();
    pt.update_smart_passthrough(false);
    assert_eq!(window.writes(), writes);
}

#[test]
fn failed_style_write_is_retried_next_update() {
    let (_backend, window, mut pt) = manager();
    pt.set_mode(PassthroughMode::Off);
    window.fail_writes(true);
    pt.update_smart_passthrough(true);
    assert_eq!(window.style() & EX_TRANSPARENT, EX_TRANSPARENT);

    window.fail_writes(false);
    pt.update_smart_passthrough(true);
    assert_eq!(window.style(), EX_LAYERED);
}
