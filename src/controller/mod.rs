//! Fixed-rate run loop tying the scene, hover machines, passthrough and
//! input engine together.
//!
//! The host calls [`RunController::tick`] at roughly `tick_interval_ms`. Every
//! tick runs, in order: hotkey scan, wheel dispatch, side-button polling,
//! hover/click polling, auto-recenter, then macro and voice bookkeeping.
//! Nothing in a tick sleeps; clicks and macros finish on worker threads.

mod auto_center;
mod buttons;
mod hotkeys;
mod voice;

pub use auto_center::{AutoCenter, AutoCenterTick};
pub use buttons::{ButtonEdge, ButtonTracker, HoldingClick, HoldingClicks};
pub use hotkeys::{HotkeyAction, HotkeyScanner, DEFAULT_HOTKEY_DEBOUNCE};
pub use voice::{VoiceCommand, VoiceCommandHandler, VoiceCommandSender};

use crate::control::{ControlDescriptor, ScreenPoint, VisualState};
use crate::events::{RuntimeEvent, RuntimeEventSink};
use crate::hover::{HoverSignal, HoverState};
use crate::input::{InputEngine, MacroDefinition, MacroRunner};
use crate::keys::{parse_combo, KeyAction, KeyToken, MouseButton, WheelDirection};
use crate::passthrough::{PassthroughManager, PassthroughMode};
use crate::scene::{ControlId, ControlScene, Scene};
use crate::settings::RuntimeSettings;
use anyhow::anyhow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Buttons the windowing layer never delivers to a click-through window.
const SIDE_BUTTONS: [MouseButton; 2] = [MouseButton::X1, MouseButton::X2];
const MAIN_BUTTONS: [MouseButton; 3] = [MouseButton::Left, MouseButton::Right, MouseButton::Middle];

/// Auto-recenter leaves the cursor alone when it is already this close.
const RECENTER_TOLERANCE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerLifecycle {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub passthrough_mode: PassthroughMode,
    pub hotkey_debounce: Duration,
    pub auto_center_enabled: bool,
    pub auto_center_delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            passthrough_mode: PassthroughMode::default(),
            hotkey_debounce: DEFAULT_HOTKEY_DEBOUNCE,
            auto_center_enabled: false,
            auto_center_delay: Duration::from_millis(3000),
        }
    }
}

impl RunOptions {
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self {
            passthrough_mode: settings.passthrough_mode,
            hotkey_debounce: Duration::from_millis(settings.hotkey_debounce_ms),
            auto_center_enabled: settings.auto_center.enabled,
            auto_center_delay: Duration::from_millis(settings.auto_center.delay_ms),
        }
    }
}

/// Read-only inputs for one run session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub macros: Vec<MacroDefinition>,
    pub hotkeys: Vec<(HotkeyAction, Vec<KeyToken>)>,
}

impl SessionConfig {
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self {
            macros: settings.macros(),
            hotkeys: settings.hotkey_bindings(),
        }
    }
}

pub struct RunController {
    engine: Arc<InputEngine>,
    passthrough: PassthroughManager,
    sink: Arc<dyn RuntimeEventSink>,
    options: RunOptions,
    lifecycle: ControllerLifecycle,
    hotkeys: HotkeyScanner,
    macros: MacroRunner,
    auto_center: AutoCenter,
    side_buttons: ButtonTracker,
    main_buttons: ButtonTracker,
    holding: HoldingClicks,
    hovered: Option<ControlId>,
    voice_rx: Receiver<VoiceCommand>,
    voice_tx: VoiceCommandSender,
}

impl RunController {
    pub fn new(
        engine: Arc<InputEngine>,
        passthrough: PassthroughManager,
        sink: Arc<dyn RuntimeEventSink>,
        options: RunOptions,
    ) -> Self {
        let (tx, voice_rx) = channel();
        let auto_center = AutoCenter::new(options.auto_center_enabled, options.auto_center_delay);
        Self {
            engine,
            passthrough,
            sink,
            hotkeys: HotkeyScanner::new(Vec::new(), options.hotkey_debounce),
            options,
            lifecycle: ControllerLifecycle::Idle,
            macros: MacroRunner::default(),
            auto_center,
            side_buttons: ButtonTracker::default(),
            main_buttons: ButtonTracker::default(),
            holding: HoldingClicks::default(),
            hovered: None,
            voice_rx,
            voice_tx: VoiceCommandSender::new(tx),
        }
    }

    pub fn lifecycle(&self) -> ControllerLifecycle {
        self.lifecycle
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == ControllerLifecycle::Running
    }

    pub fn engine(&self) -> &Arc<InputEngine> {
        &self.engine
    }

    pub fn passthrough(&self) -> &PassthroughManager {
        &self.passthrough
    }

    pub fn passthrough_mut(&mut self) -> &mut PassthroughManager {
        &mut self.passthrough
    }

    pub fn hovered(&self) -> Option<ControlId> {
        self.hovered
    }

    pub fn auto_center(&self) -> &AutoCenter {
        &self.auto_center
    }

    /// Handle for the speech pipeline.
    pub fn voice_sender(&self) -> VoiceCommandSender {
        self.voice_tx.clone()
    }

    /// Relative movement captured while the cursor is frozen.
    pub fn drain_mouse_deltas(&self) -> Vec<(i32, i32)> {
        self.engine.drain_mouse_deltas()
    }

    pub fn start(&mut self, config: SessionConfig) {
        if self.is_running() {
            return;
        }
        if !self.engine.init() {
            tracing::warn!("run mode starting without the mouse hook");
        }
        self.hotkeys = HotkeyScanner::new(config.hotkeys, self.options.hotkey_debounce);
        self.macros.set_definitions(config.macros);
        self.macros.begin_session();
        self.auto_center.reset();
        self.holding = HoldingClicks::default();
        self.hovered = None;
        // Buttons already held when run mode starts must not produce edges.
        let engine = Arc::clone(&self.engine);
        self.side_buttons
            .resync(&SIDE_BUTTONS, |b| engine.is_key_down(b.vk()));
        self.main_buttons
            .resync(&MAIN_BUTTONS, |b| engine.is_key_down(b.vk()));
        while self.voice_rx.try_recv().is_ok() {}
        self.passthrough.set_mode(self.options.passthrough_mode);
        self.lifecycle = ControllerLifecycle::Running;
        tracing::info!(mode = %self.options.passthrough_mode, "run mode started");
    }

    /// Leave run mode. Always ends with the global key-release safety net,
    /// even if an earlier cleanup step panics.
    pub fn stop(&mut self, scene: &mut dyn Scene) {
        let was_running = self.is_running();
        self.lifecycle = ControllerLifecycle::Stopped;

        let cleanup = panic::catch_unwind(AssertUnwindSafe(|| {
            for (button, click) in self.holding.drain() {
                tracing::debug!(?button, control = ?click.control, "releasing held click on stop");
                self.fire(Some(click.control), &click.keys, KeyAction::Release);
            }
            for id in scene.control_ids() {
                self.reset_control(scene, id);
            }
            self.hovered = None;
            self.macros.stop();
            self.engine.set_cursor_freeze(None);
            self.engine.shutdown();
            self.auto_center.reset();
            self.hotkeys.reset();
        }));
        if cleanup.is_err() {
            tracing::error!("run-mode cleanup panicked; releasing keys anyway");
        }

        self.engine.release_all();
        if was_running {
            tracing::info!("run mode stopped");
        }
    }

    /// Remove a control from the scene, releasing its hover key if it held one.
    pub fn remove_control(
        &mut self,
        scene: &mut ControlScene,
        id: ControlId,
    ) -> Option<ControlDescriptor> {
        let (descriptor, signal) = scene.remove(id)?;
        if self.hovered == Some(id) {
            self.hovered = None;
        }
        if signal == Some(HoverSignal::Deactivated) {
            self.fire(Some(id), &descriptor.actions.hover, KeyAction::Release);
            self.sink.dispatch(RuntimeEvent::HoverDeactivated {
                control: id,
                descriptor: descriptor.clone(),
            });
        }
        Some(descriptor)
    }

    /// Run one tick. A failing or panicking tick is logged and the next tick
    /// runs normally.
    pub fn tick(&mut self, now: Instant, scene: &mut dyn Scene) {
        if !self.is_running() {
            return;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.tick_body(now, scene)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(?err, "tick failed"),
            Err(_) => tracing::error!("tick panicked"),
        }
    }

    fn tick_body(&mut self, now: Instant, scene: &mut dyn Scene) -> anyhow::Result<()> {
        self.passthrough.poll(now);

        if self.scan_hotkeys(now, scene) {
            return Ok(());
        }

        self.dispatch_wheel(scene)?;

        let cursor = self.engine.cursor_position();
        self.poll_side_buttons(now, cursor, scene)?;
        self.poll_hover_and_clicks(now, cursor, scene)?;
        self.run_auto_center(now, cursor);

        for report in self.macros.reap() {
            self.sink.dispatch(RuntimeEvent::MacroFinished {
                name: report.name,
                completed: report.completed,
            });
        }
        let commands: Vec<VoiceCommand> = self.voice_rx.try_iter().collect();
        for command in commands {
            tracing::info!(phrase = %command.phrase, keys = %command.keys, action = %command.action, "voice command");
            self.fire(None, &command.keys, command.action);
        }

        self.engine.pin_cursor();
        Ok(())
    }

    /// Returns `true` when the stop hotkey ended the session.
    fn scan_hotkeys(&mut self, now: Instant, scene: &mut dyn Scene) -> bool {
        if self.hotkeys.is_empty() {
            return false;
        }
        let engine = Arc::clone(&self.engine);
        let fired = self.hotkeys.scan(now, |token| match token {
            KeyToken::Key(vk) => engine.is_key_down(vk),
            KeyToken::Mouse(button) => engine.is_key_down(button.vk()),
            KeyToken::Wheel(_) => false,
        });
        for action in fired {
            tracing::info!(%action, "hotkey fired");
            self.sink.dispatch(RuntimeEvent::HotkeyFired(action));
            match action {
                HotkeyAction::Stop => {
                    self.sink.dispatch(RuntimeEvent::StopRequested);
                    self.stop(scene);
                    return true;
                }
                HotkeyAction::CyclePassthrough => {
                    self.passthrough.cycle_mode();
                }
                HotkeyAction::ToggleCursorFreeze => {
                    if self.engine.is_cursor_frozen() {
                        self.engine.set_cursor_freeze(None);
                    } else {
                        let anchor = self
                            .engine
                            .cursor_position()
                            .or_else(|| self.engine.screen_center());
                        self.engine.set_cursor_freeze(anchor);
                    }
                }
                HotkeyAction::Recenter => {
                    if let Some(center) = self.engine.screen_center() {
                        self.engine.move_cursor(center);
                    }
                }
                HotkeyAction::ToggleAutoCenter => {
                    let enabled = !self.auto_center.is_enabled();
                    self.auto_center.set_enabled(enabled);
                    tracing::info!(enabled, "auto-center toggled");
                }
            }
        }
        false
    }

    fn dispatch_wheel(&mut self, scene: &mut dyn Scene) -> anyhow::Result<()> {
        for event in self.engine.drain_wheel_events() {
            let Some(id) = scene.hit_test(event.point) else {
                continue;
            };
            let keys = {
                let control = scene
                    .control_mut(id)
                    .ok_or_else(|| anyhow!("scene returned unknown control {id:?}"))?;
                let actions = &control.descriptor().actions;
                match event.direction {
                    WheelDirection::Up => actions.wheelup.clone(),
                    WheelDirection::Down => actions.wheeldown.clone(),
                }
            };
            if !keys.trim().is_empty() {
                self.fire(Some(id), &keys, KeyAction::Click);
            }
        }
        Ok(())
    }

    fn poll_side_buttons(
        &mut self,
        now: Instant,
        cursor: Option<ScreenPoint>,
        scene: &mut dyn Scene,
    ) -> anyhow::Result<()> {
        let engine = Arc::clone(&self.engine);
        let edges = self
            .side_buttons
            .poll(&SIDE_BUTTONS, |b| engine.is_key_down(b.vk()));
        let target = cursor.and_then(|point| scene.hit_test(point));
        for edge in edges {
            self.handle_button_edge(now, edge, target, cursor, scene)?;
        }
        Ok(())
    }

    fn poll_hover_and_clicks(
        &mut self,
        now: Instant,
        cursor: Option<ScreenPoint>,
        scene: &mut dyn Scene,
    ) -> anyhow::Result<()> {
        let hit = cursor.and_then(|point| scene.hit_test(point));
        self.sink.dispatch(RuntimeEvent::CursorOnUi(hit.is_some()));
        self.passthrough.update_smart_passthrough(hit.is_some());

        if hit != self.hovered {
            if let Some(old) = self.hovered.take() {
                self.leave_control(now, old, scene);
            }
            if let Some(new) = hit {
                self.enter_control(now, new, scene)?;
            }
            self.hovered = hit;
        }

        for id in scene.control_ids() {
            self.tick_control(now, id, scene);
        }

        let engine = Arc::clone(&self.engine);
        // Our own forwarded click shows up in the async key state; every other
        // button keeps reporting edges so held clicks still see their release.
        let (forwarded, polled): (Vec<MouseButton>, Vec<MouseButton>) = MAIN_BUTTONS
            .into_iter()
            .partition(|&b| self.passthrough.is_forwarding_button(b));
        self.main_buttons
            .resync(&forwarded, |b| engine.is_key_down(b.vk()));
        let edges = self
            .main_buttons
            .poll(&polled, |b| engine.is_key_down(b.vk()));
        for edge in edges {
            self.handle_button_edge(now, edge, hit, cursor, scene)?;
        }
        Ok(())
    }

    fn enter_control(
        &mut self,
        now: Instant,
        id: ControlId,
        scene: &mut dyn Scene,
    ) -> anyhow::Result<()> {
        let control = scene
            .control_mut(id)
            .ok_or_else(|| anyhow!("scene returned unknown control {id:?}"))?;
        let signal = match control.hover_machine() {
            Some(machine) => machine.enter(now),
            None => {
                control.set_visual_state(VisualState::Hovered);
                None
            }
        };
        let descriptor = control.descriptor().clone();
        self.handle_hover_signal(id, descriptor, signal);
        Ok(())
    }

    fn leave_control(&mut self, now: Instant, id: ControlId, scene: &mut dyn Scene) {
        // The control may have been removed since the last tick.
        let Some(control) = scene.control_mut(id) else {
            return;
        };
        let signal = match control.hover_machine() {
            Some(machine) => machine.leave(now),
            None => {
                control.set_visual_state(VisualState::Idle);
                None
            }
        };
        let descriptor = control.descriptor().clone();
        self.handle_hover_signal(id, descriptor, signal);
    }

    fn tick_control(&mut self, now: Instant, id: ControlId, scene: &mut dyn Scene) {
        let pressed = self.holding.is_holding(id);
        let Some(control) = scene.control_mut(id) else {
            return;
        };
        let Some(machine) = control.hover_machine() else {
            if pressed {
                control.set_visual_state(VisualState::Pressed);
            }
            return;
        };
        let signal = machine.tick(now);
        let state = machine.state();
        let (charge, release) = (machine.charge_progress(), machine.release_progress());
        let visual = if pressed {
            VisualState::Pressed
        } else {
            machine.visual_state()
        };
        control.set_visual_state(visual);
        if matches!(state, HoverState::Charging | HoverState::Releasing) {
            self.sink.dispatch(RuntimeEvent::HoverProgress {
                control: id,
                charge,
                release,
            });
        }
        if signal.is_some() {
            let descriptor = control.descriptor().clone();
            self.handle_hover_signal(id, descriptor, signal);
        }
    }

    fn reset_control(&mut self, scene: &mut dyn Scene, id: ControlId) {
        let Some(control) = scene.control_mut(id) else {
            return;
        };
        let signal = control.hover_machine().and_then(|machine| machine.reset());
        control.set_visual_state(VisualState::Idle);
        if signal.is_some() {
            let descriptor = control.descriptor().clone();
            self.handle_hover_signal(id, descriptor, signal);
        }
    }

    fn handle_hover_signal(
        &mut self,
        id: ControlId,
        descriptor: ControlDescriptor,
        signal: Option<HoverSignal>,
    ) {
        match signal {
            Some(HoverSignal::Activated) => {
                tracing::debug!(label = %descriptor.label, "hover activated");
                self.fire(Some(id), &descriptor.actions.hover, KeyAction::Press);
                self.sink.dispatch(RuntimeEvent::HoverActivated {
                    control: id,
                    descriptor,
                });
            }
            Some(HoverSignal::Deactivated) => {
                tracing::debug!(label = %descriptor.label, "hover deactivated");
                self.fire(Some(id), &descriptor.actions.hover, KeyAction::Release);
                self.sink.dispatch(RuntimeEvent::HoverDeactivated {
                    control: id,
                    descriptor,
                });
            }
            None => {}
        }
    }

    fn handle_button_edge(
        &mut self,
        now: Instant,
        edge: ButtonEdge,
        target: Option<ControlId>,
        cursor: Option<ScreenPoint>,
        scene: &mut dyn Scene,
    ) -> anyhow::Result<()> {
        match edge {
            ButtonEdge::Pressed(button) => {
                let keys = match target {
                    Some(id) => scene
                        .control_mut(id)
                        .ok_or_else(|| anyhow!("scene returned unknown control {id:?}"))?
                        .descriptor()
                        .actions
                        .for_button(button)
                        .trim()
                        .to_string(),
                    None => String::new(),
                };
                match target {
                    Some(id) if !keys.is_empty() => {
                        let click = HoldingClick { control: id, keys };
                        if let Some(stale) = self.holding.begin(button, click.clone()) {
                            self.fire(Some(stale.control), &stale.keys, KeyAction::Release);
                        }
                        self.fire(Some(id), &click.keys, KeyAction::Press);
                    }
                    _ => self.forward_unbound_click(now, button, cursor),
                }
            }
            ButtonEdge::Released(button) => {
                // Released against the control recorded at press time.
                if let Some(click) = self.holding.end(button) {
                    self.fire(Some(click.control), &click.keys, KeyAction::Release);
                }
            }
        }
        Ok(())
    }

    /// A press the overlay swallowed while in smart-off mode belongs to the
    /// game.
    fn forward_unbound_click(
        &mut self,
        now: Instant,
        button: MouseButton,
        cursor: Option<ScreenPoint>,
    ) {
        let intercepting = self
            .passthrough
            .current_style()
            .is_some_and(|style| style & crate::passthrough::EX_TRANSPARENT == 0);
        if self.passthrough.mode() != PassthroughMode::Off || !intercepting {
            return;
        }
        if let Some(point) = cursor {
            self.passthrough.forward_click_to_game(point, button, now);
        }
    }

    fn run_auto_center(&mut self, now: Instant, cursor: Option<ScreenPoint>) {
        let Some(center) = self.engine.screen_center() else {
            return;
        };
        match self.auto_center.tick(now) {
            AutoCenterTick::Inactive => {}
            AutoCenterTick::Waiting { remaining } => {
                self.sink.dispatch(RuntimeEvent::AutoCenterProgress {
                    progress: remaining,
                    x: center.x,
                    y: center.y,
                });
            }
            AutoCenterTick::Recenter => {
                let near = cursor.is_some_and(|c| {
                    (c.x - center.x).abs() <= RECENTER_TOLERANCE
                        && (c.y - center.y).abs() <= RECENTER_TOLERANCE
                });
                if !near {
                    tracing::debug!(?center, "auto-center moving cursor");
                    self.engine.move_cursor(center);
                }
                self.sink.dispatch(RuntimeEvent::AutoCenterProgress {
                    progress: 0.0,
                    x: center.x,
                    y: center.y,
                });
            }
        }
    }

    /// Trigger a combo without blocking the tick. Macro tokens start workers
    /// on press/click only.
    ///
    /// Every press or release counts toward auto-center activity, including
    /// hover transitions of a control whose combo is empty.
    fn fire(&mut self, control: Option<ControlId>, keys: &str, action: KeyAction) {
        match action {
            KeyAction::Press => self.auto_center.acquire(),
            KeyAction::Release => self.auto_center.release(),
            KeyAction::Click => {}
        }
        let keys = keys.trim();
        if keys.is_empty() {
            return;
        }
        let parsed = parse_combo(keys);
        self.engine.trigger_tokens_nonblocking(&parsed.tokens, action);
        if action != KeyAction::Release {
            for name in &parsed.macros {
                self.macros.dispatch(name, &self.engine);
            }
        }
        self.sink.dispatch(RuntimeEvent::ActionTriggered {
            control,
            keys: keys.to_string(),
            action,
        });
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        self.macros.stop();
        self.engine.release_all();
    }
}
