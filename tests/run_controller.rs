use overlay_input::control::{ControlDescriptor, ControlShape, ScreenPoint, VisualState};
use overlay_input::controller::{ControllerLifecycle, HotkeyAction, RunOptions, SessionConfig};
use overlay_input::controller::VoiceCommandHandler;
use overlay_input::events::{RuntimeEvent, RuntimeEventSink};
use overlay_input::input::{
    InjectedInput, InputEngine, MacroDefinition, MacroStep, MockHookBackend, MockHookHandle,
    MockInputBackend,
};
use overlay_input::keys::{parse_combo, KeyAction, MouseButton};
use overlay_input::passthrough::{MockOverlayWindow, MockWindowHandle, PassthroughManager};
use overlay_input::scene::{ControlId, ControlScene, Scene};
use overlay_input::{HoverStateMachine, Interactable, PassthroughMode, RunController};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<RuntimeEvent>>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<RuntimeEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl RuntimeEventSink for RecordingSink {
    fn dispatch(&self, event: RuntimeEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

struct Harness {
    backend: Arc<MockInputBackend>,
    hook: MockHookHandle,
    window: MockWindowHandle,
    sink: Arc<RecordingSink>,
    controller: RunController,
    scene: ControlScene,
}

impl Harness {
    fn new(options: RunOptions) -> Self {
        let backend = Arc::new(MockInputBackend::default());
        let (hook, hook_handle) = MockHookBackend::new();
        let engine = Arc::new(
            InputEngine::new(backend.clone(), Box::new(hook)).with_click_jitter(0, 0),
        );
        let (window, window_handle) = MockOverlayWindow::new();
        let sink = Arc::new(RecordingSink::default());
        let passthrough = PassthroughManager::new(Box::new(window), engine.clone(), sink.clone());
        let controller = RunController::new(engine, passthrough, sink.clone(), options);
        Self {
            backend,
            hook: hook_handle,
            window: window_handle,
            sink,
            controller,
            scene: ControlScene::new(),
        }
    }

    fn tick(&mut self, now: Instant) {
        self.controller.tick(now, &mut self.scene);
    }

    fn key_downs(&self) -> Vec<u16> {
        self.backend
            .events()
            .into_iter()
            .filter_map(|e| match e {
                InjectedInput::Key { vk, down: true } => Some(vk),
                _ => None,
            })
            .collect()
    }

    fn has(&self, event: &InjectedInput) -> bool {
        self.backend.events().contains(event)
    }
}

fn button(label: &str, x: f32, y: f32) -> ControlDescriptor {
    ControlDescriptor::new(
        label,
        ControlShape::Rect {
            x,
            y,
            width: 100.0,
            height: 100.0,
        },
    )
}

fn key(vk: u16, down: bool) -> InjectedInput {
    InjectedInput::Key { vk, down }
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

const VK_A: u16 = 0x41;
const VK_B: u16 = 0x42;
const VK_E: u16 = 0x45;
const VK_W: u16 = 0x57;

#[test]
fn release_targets_control_recorded_at_press() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.lclick = "a".into();
    let a = h.scene.add(a);
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(t0);
    h.backend.set_button_down(MouseButton::Left, true);
    h.tick(t0 + Duration::from_millis(16));
    assert!(h.has(&key(VK_A, true)));

    h.backend.set_cursor(ScreenPoint::new(900, 900));
    h.backend.set_button_down(MouseButton::Left, false);
    h.tick(t0 + Duration::from_millis(32));
    assert!(h.has(&key(VK_A, false)));
    assert!(h.sink.events().contains(&RuntimeEvent::ActionTriggered {
        control: Some(a),
        keys: "a".into(),
        action: KeyAction::Release,
    }));
}

#[test]
fn side_button_press_and_release_use_holding_click() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.xbutton1 = "e".into();
    h.scene.add(a);
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.backend.set_button_down(MouseButton::X1, true);
    h.tick(t0);
    assert_eq!(h.key_downs(), vec![VK_E]);
    h.backend.set_cursor(ScreenPoint::new(5, 5));
    h.backend.set_button_down(MouseButton::X1, false);
    h.tick(t0 + Duration::from_millis(16));
    assert!(h.has(&key(VK_E, false)));
}

#[test]
fn wheel_events_dispatch_to_control_under_event_point() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.wheelup = "e".into();
    a.actions.wheeldown = "b".into();
    h.scene.add(a);
    h.controller.start(SessionConfig::default());
    assert_eq!(h.hook.install_count(), 1);

    h.hook.emit_wheel(120, ScreenPoint::new(150, 150));
    h.hook.emit_wheel(-120, ScreenPoint::new(900, 900));
    h.tick(Instant::now());

    assert_eq!(h.key_downs(), vec![VK_E]);
    assert!(wait_for(|| h.has(&key(VK_E, false))));
}

#[test]
fn hover_charge_activates_on_tick_13() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.hover = "w".into();
    a.hover_delay_ms = 200;
    let a = h.scene.add(a);
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(t0);
    for i in 1..=12u32 {
        h.tick(t0 + Duration::from_millis(16) * i);
    }
    assert!(h.key_downs().is_empty());
    assert!(matches!(
        h.scene.get(a).map(|c| c.visual_state()),
        Some(VisualState::Charging { .. })
    ));

    h.tick(t0 + Duration::from_millis(16) * 13);
    assert_eq!(h.key_downs(), vec![VK_W]);
    let activations = h
        .sink
        .events()
        .iter()
        .filter(|e| matches!(e, RuntimeEvent::HoverActivated { .. }))
        .count();
    assert_eq!(activations, 1);
    assert_eq!(h.scene.get(a).map(|c| c.visual_state()), Some(VisualState::Active));

    // Leaving with no release delay lets go of the key immediately.
    h.backend.set_cursor(ScreenPoint::new(900, 900));
    h.tick(t0 + Duration::from_millis(16) * 14);
    assert!(h.has(&key(VK_W, false)));
}

#[test]
fn stop_releases_holding_clicks_and_hover_keys() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.hover = "w".into();
    a.actions.lclick = "shift".into();
    let a = h.scene.add(a);
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(t0);
    h.backend.set_button_down(MouseButton::Left, true);
    h.tick(t0 + Duration::from_millis(16));
    assert_eq!(h.key_downs(), vec![VK_W, 0x10]);

    h.controller.stop(&mut h.scene);

    assert!(h.backend.keys_held().is_empty());
    assert!(h.controller.engine().held_tokens().is_empty());
    assert_eq!(h.controller.lifecycle(), ControllerLifecycle::Stopped);
    assert_eq!(h.hook.uninstall_count(), 1);
    assert_eq!(h.scene.get(a).map(|c| c.visual_state()), Some(VisualState::Idle));
    assert!(h
        .sink
        .events()
        .iter()
        .any(|e| matches!(e, RuntimeEvent::HoverDeactivated { control, .. } if *control == a)));

    // Ticks after stop do nothing.
    let before = h.backend.events();
    h.backend.set_button_down(MouseButton::Left, false);
    h.tick(t0 + Duration::from_millis(32));
    assert_eq!(h.backend.events(), before);
}

#[test]
fn stop_hotkey_ends_session_and_short_circuits_tick() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.hover = "w".into();
    h.scene.add(a);
    h.controller.start(SessionConfig {
        macros: Vec::new(),
        hotkeys: vec![(HotkeyAction::Stop, parse_combo("ctrl+q").tokens)],
    });

    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.backend.set_key_down(0x11, true);
    h.backend.set_key_down(0x51, true);
    h.tick(Instant::now());

    assert!(!h.controller.is_running());
    let events = h.sink.events();
    assert!(events.contains(&RuntimeEvent::HotkeyFired(HotkeyAction::Stop)));
    assert!(events.contains(&RuntimeEvent::StopRequested));
    // The hover step never ran.
    assert!(h.key_downs().is_empty());
}

#[test]
fn cycle_passthrough_hotkey_is_debounced() {
    let mut h = Harness::new(RunOptions::default());
    h.controller.start(SessionConfig {
        macros: Vec::new(),
        hotkeys: vec![(HotkeyAction::CyclePassthrough, parse_combo("f8").tokens)],
    });
    assert_eq!(h.controller.passthrough().mode(), PassthroughMode::Off);

    let t0 = Instant::now();
    h.backend.set_key_down(0x77, true);
    for i in 0..10u32 {
        h.tick(t0 + Duration::from_millis(16) * i);
    }
    assert_eq!(h.controller.passthrough().mode(), PassthroughMode::Block);
    h.tick(t0 + Duration::from_millis(300));
    assert_eq!(h.controller.passthrough().mode(), PassthroughMode::On);
}

#[test]
fn auto_center_moves_cursor_after_idle_delay() {
    let mut h = Harness::new(RunOptions {
        auto_center_enabled: true,
        auto_center_delay: Duration::from_millis(100),
        ..RunOptions::default()
    });
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(10, 10));
    h.tick(t0);
    assert!(h.sink.events().iter().any(|e| matches!(
        e,
        RuntimeEvent::AutoCenterProgress { x: 960, y: 540, .. }
    )));
    h.tick(t0 + Duration::from_millis(50));
    assert_eq!(h.controller.engine().cursor_position(), Some(ScreenPoint::new(10, 10)));
    h.tick(t0 + Duration::from_millis(100));
    assert_eq!(
        h.controller.engine().cursor_position(),
        Some(ScreenPoint::new(960, 540))
    );
}

#[test]
fn active_hover_holds_off_auto_center() {
    let mut h = Harness::new(RunOptions {
        auto_center_enabled: true,
        auto_center_delay: Duration::from_millis(100),
        ..RunOptions::default()
    });
    let mut a = button("a", 100.0, 100.0);
    a.actions.hover = "w".into();
    h.scene.add(a);
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(t0);
    assert_eq!(h.controller.auto_center().active_count(), 1);
    h.tick(t0 + Duration::from_millis(500));
    assert_eq!(
        h.controller.engine().cursor_position(),
        Some(ScreenPoint::new(150, 150))
    );
}

#[test]
fn macro_tokens_start_workers_on_press_only() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.lclick = "e+macro:burst".into();
    h.scene.add(a);
    h.controller.start(SessionConfig {
        macros: vec![MacroDefinition {
            name: "burst".into(),
            steps: vec![MacroStep::Key {
                keys: "b".into(),
                action: KeyAction::Click,
            }],
            repeat: 1,
        }],
        hotkeys: Vec::new(),
    });

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(t0);
    h.backend.set_button_down(MouseButton::Left, true);
    h.tick(t0 + Duration::from_millis(16));
    h.backend.set_button_down(MouseButton::Left, false);
    h.tick(t0 + Duration::from_millis(32));

    let mut finished = Vec::new();
    let mut i = 3u32;
    assert!(wait_for(|| {
        h.tick(t0 + Duration::from_millis(16) * i);
        i += 1;
        finished.extend(h.sink.events().into_iter().filter(|e| {
            matches!(e, RuntimeEvent::MacroFinished { .. })
        }));
        !finished.is_empty()
    }));
    assert_eq!(
        finished[0],
        RuntimeEvent::MacroFinished {
            name: "burst".into(),
            completed: true
        }
    );
    let b_presses = h.key_downs().into_iter().filter(|vk| *vk == VK_B).count();
    assert_eq!(b_presses, 1);
    assert!(h.has(&key(VK_E, true)) && h.has(&key(VK_E, false)));
}

#[test]
fn stop_interrupts_running_macro() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.lclick = "macro:slow".into();
    h.scene.add(a);
    h.controller.start(SessionConfig {
        macros: vec![MacroDefinition {
            name: "slow".into(),
            steps: vec![
                MacroStep::Key {
                    keys: "a".into(),
                    action: KeyAction::Press,
                },
                MacroStep::Delay { ms: 10_000 },
                MacroStep::Key {
                    keys: "b".into(),
                    action: KeyAction::Click,
                },
            ],
            repeat: 1,
        }],
        hotkeys: Vec::new(),
    });

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(t0);
    h.backend.set_button_down(MouseButton::Left, true);
    h.tick(t0 + Duration::from_millis(16));
    assert!(wait_for(|| h.has(&key(VK_A, true))));

    let started = Instant::now();
    h.controller.stop(&mut h.scene);
    assert!(started.elapsed() < Duration::from_secs(2));

    // The macro's held key was released by the safety net.
    assert!(h.backend.keys_held().is_empty());
    let after = h.backend.events();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(h.backend.events(), after);
    assert!(!h.has(&key(VK_B, true)));
}

#[test]
fn voice_commands_run_like_manual_actions() {
    let mut h = Harness::new(RunOptions::default());
    h.controller.start(SessionConfig::default());
    let voice = h.controller.voice_sender();
    std::thread::spawn(move || voice.on_voice_command("jump", "space", KeyAction::Press))
        .join()
        .unwrap();

    h.tick(Instant::now());
    assert_eq!(h.key_downs(), vec![0x20]);
    assert!(h.sink.events().contains(&RuntimeEvent::ActionTriggered {
        control: None,
        keys: "space".into(),
        action: KeyAction::Press,
    }));
    h.controller.stop(&mut h.scene);
    assert!(h.backend.keys_held().is_empty());
}

#[test]
fn failed_hook_install_still_starts_run_mode() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.lclick = "a".into();
    h.scene.add(a);
    h.hook.fail_next_install(true);
    h.controller.start(SessionConfig::default());
    assert!(h.controller.is_running());
    assert!(!h.controller.engine().is_hook_installed());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(t0);
    h.backend.set_button_down(MouseButton::Left, true);
    h.tick(t0 + Duration::from_millis(16));
    assert_eq!(h.key_downs(), vec![VK_A]);
}

#[test]
fn removing_active_control_releases_hover_key() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.hover = "w".into();
    let a = h.scene.add(a);
    h.controller.start(SessionConfig::default());

    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(Instant::now());
    assert_eq!(h.controller.hovered(), Some(a));

    let removed = h.controller.remove_control(&mut h.scene, a);
    assert_eq!(removed.map(|d| d.label), Some("a".to_string()));
    assert!(h.has(&key(VK_W, false)));
    assert_eq!(h.controller.hovered(), None);
    assert!(h.controller.remove_control(&mut h.scene, ControlId(99)).is_none());
}

#[test]
fn unbound_click_over_control_is_forwarded_in_smart_mode() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.lclick = "a".into();
    h.scene.add(a);
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(t0);
    let writes = h.window.writes();
    h.backend.set_button_down(MouseButton::Right, true);
    h.tick(t0 + Duration::from_millis(16));

    assert!(h.has(&InjectedInput::MouseButton {
        button: MouseButton::Right,
        down: true
    }));
    assert!(h.has(&InjectedInput::MouseButton {
        button: MouseButton::Right,
        down: false
    }));
    assert!(h.controller.passthrough().is_forwarding());
    assert!(h.window.writes() > writes);

    h.tick(t0 + Duration::from_millis(60));
    assert!(!h.controller.passthrough().is_forwarding());
}

#[test]
fn cursor_on_ui_reported_every_tick() {
    let mut h = Harness::new(RunOptions::default());
    h.scene.add(button("a", 100.0, 100.0));
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(t0);
    h.backend.set_cursor(ScreenPoint::new(900, 900));
    h.tick(t0 + Duration::from_millis(16));

    let flags: Vec<bool> = h
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            RuntimeEvent::CursorOnUi(on) => Some(on),
            _ => None,
        })
        .collect();
    assert_eq!(flags, vec![true, false]);
}

/// Delegates to a [`ControlScene`] but can be told to misbehave.
struct FlakyScene {
    inner: ControlScene,
    /// `hit_test` reports a control that `control_mut` does not know.
    ghost_hit: bool,
    panic_on_ids: bool,
}

impl FlakyScene {
    fn new() -> Self {
        Self {
            inner: ControlScene::new(),
            ghost_hit: false,
            panic_on_ids: false,
        }
    }
}

impl Scene for FlakyScene {
    fn hit_test(&self, point: ScreenPoint) -> Option<ControlId> {
        if self.ghost_hit {
            return Some(ControlId(999));
        }
        self.inner.hit_test(point)
    }

    fn control_mut(&mut self, id: ControlId) -> Option<&mut dyn Interactable> {
        self.inner.control_mut(id)
    }

    fn control_ids(&self) -> Vec<ControlId> {
        if self.panic_on_ids {
            panic!("scene torn down mid-tick");
        }
        self.inner.control_ids()
    }
}

/// A scene whose controls always carry a hover machine, even without a
/// hover combo.
struct BareScene {
    controls: Vec<BareControl>,
}

struct BareControl {
    descriptor: ControlDescriptor,
    hover: HoverStateMachine,
    visual: VisualState,
}

impl Interactable for BareControl {
    fn descriptor(&self) -> &ControlDescriptor {
        &self.descriptor
    }

    fn hover_machine(&mut self) -> Option<&mut HoverStateMachine> {
        Some(&mut self.hover)
    }

    fn set_visual_state(&mut self, state: VisualState) {
        self.visual = state;
    }
}

impl Scene for BareScene {
    fn hit_test(&self, point: ScreenPoint) -> Option<ControlId> {
        self.controls
            .iter()
            .position(|c| c.descriptor.shape.contains(point))
            .map(ControlId)
    }

    fn control_mut(&mut self, id: ControlId) -> Option<&mut dyn Interactable> {
        self.controls
            .get_mut(id.0)
            .map(|c| c as &mut dyn Interactable)
    }

    fn control_ids(&self) -> Vec<ControlId> {
        (0..self.controls.len()).map(ControlId).collect()
    }
}

#[test]
fn held_click_releases_while_another_button_is_forwarded() {
    let mut h = Harness::new(RunOptions::default());
    let mut a = button("a", 100.0, 100.0);
    a.actions.lclick = "a".into();
    h.scene.add(a);
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.tick(t0);
    h.backend.set_button_down(MouseButton::Left, true);
    h.tick(t0 + Duration::from_millis(16));
    assert!(h.has(&key(VK_A, true)));
    assert_eq!(h.controller.auto_center().active_count(), 1);

    // Right is unbound, so it goes to the game.
    h.backend.set_button_down(MouseButton::Right, true);
    h.tick(t0 + Duration::from_millis(32));
    let passthrough = h.controller.passthrough();
    assert!(passthrough.is_forwarding_button(MouseButton::Right));
    assert!(!passthrough.is_forwarding_button(MouseButton::Left));

    // Left comes up before the forwarded click's restore deadline.
    h.backend.set_button_down(MouseButton::Left, false);
    h.tick(t0 + Duration::from_millis(48));
    assert!(h.controller.passthrough().is_forwarding());
    assert!(h.has(&key(VK_A, false)));
    assert!(h.backend.keys_held().is_empty());
    assert_eq!(h.controller.auto_center().active_count(), 0);

    // The still-held Right button does not turn into a press afterwards.
    h.backend.clear_events();
    h.tick(t0 + Duration::from_millis(80));
    assert!(!h.controller.passthrough().is_forwarding());
    assert!(h.backend.events().is_empty());
}

#[test]
fn failing_and_panicking_ticks_do_not_stop_the_loop() {
    let mut h = Harness::new(RunOptions::default());
    let mut scene = FlakyScene::new();
    let mut a = button("a", 100.0, 100.0);
    a.actions.lclick = "a".into();
    scene.inner.add(a);
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));

    scene.ghost_hit = true;
    h.controller.tick(t0, &mut scene);
    scene.ghost_hit = false;
    scene.panic_on_ids = true;
    h.controller.tick(t0 + Duration::from_millis(16), &mut scene);
    assert!(h.controller.is_running());

    scene.panic_on_ids = false;
    h.backend.set_button_down(MouseButton::Left, true);
    h.controller.tick(t0 + Duration::from_millis(32), &mut scene);
    assert!(h.has(&key(VK_A, true)));
}

#[test]
fn stop_releases_keys_even_when_cleanup_panics() {
    let mut h = Harness::new(RunOptions::default());
    let mut scene = FlakyScene::new();
    let mut a = button("a", 100.0, 100.0);
    a.actions.hover = "w".into();
    scene.inner.add(a);
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.controller.tick(t0, &mut scene);
    assert_eq!(h.key_downs(), vec![VK_W]);

    // Resetting the hover machines panics before the hover key is released.
    scene.panic_on_ids = true;
    h.controller.stop(&mut scene);

    assert_eq!(h.controller.lifecycle(), ControllerLifecycle::Stopped);
    assert!(h.has(&key(VK_W, false)));
    assert!(h.backend.keys_held().is_empty());
    assert!(h.controller.engine().held_tokens().is_empty());
}

#[test]
fn hover_without_combo_still_counts_toward_auto_center() {
    let mut h = Harness::new(RunOptions {
        auto_center_enabled: true,
        auto_center_delay: Duration::from_millis(100),
        ..RunOptions::default()
    });
    let mut scene = BareScene {
        controls: vec![BareControl {
            descriptor: button("silent", 100.0, 100.0),
            hover: HoverStateMachine::from_millis(0, 0),
            visual: VisualState::Idle,
        }],
    };
    h.controller.start(SessionConfig::default());

    let t0 = Instant::now();
    h.backend.set_cursor(ScreenPoint::new(150, 150));
    h.controller.tick(t0, &mut scene);
    assert_eq!(h.controller.auto_center().active_count(), 1);
    assert_eq!(scene.controls[0].visual, VisualState::Active);
    assert!(h.sink.events().iter().any(|e| matches!(e, RuntimeEvent::HoverActivated { .. })));
    assert!(!h
        .sink
        .events()
        .iter()
        .any(|e| matches!(e, RuntimeEvent::ActionTriggered { .. })));

    h.controller.tick(t0 + Duration::from_millis(500), &mut scene);
    assert_eq!(
        h.controller.engine().cursor_position(),
        Some(ScreenPoint::new(150, 150))
    );

    h.backend.set_cursor(ScreenPoint::new(900, 900));
    h.controller.tick(t0 + Duration::from_millis(516), &mut scene);
    assert_eq!(h.controller.auto_center().active_count(), 0);
}
