use crate::keys::KeyToken;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

pub const DEFAULT_HOTKEY_DEBOUNCE: Duration = Duration::from_millis(300);

/// Runtime actions reachable from the hotkey table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    Stop,
    CyclePassthrough,
    ToggleCursorFreeze,
    Recenter,
    ToggleAutoCenter,
}

impl HotkeyAction {
    pub const ALL: [HotkeyAction; 5] = [
        HotkeyAction::Stop,
        HotkeyAction::CyclePassthrough,
        HotkeyAction::ToggleCursorFreeze,
        HotkeyAction::Recenter,
        HotkeyAction::ToggleAutoCenter,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HotkeyAction::Stop => "stop",
            HotkeyAction::CyclePassthrough => "cycle_passthrough",
            HotkeyAction::ToggleCursorFreeze => "toggle_cursor_freeze",
            HotkeyAction::Recenter => "recenter",
            HotkeyAction::ToggleAutoCenter => "toggle_auto_center",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Polls hotkey combos against physical key state with a per-action
/// debounce window.
#[derive(Debug, Clone)]
pub struct HotkeyScanner {
    bindings: Vec<(HotkeyAction, Vec<KeyToken>)>,
    last_fired: HashMap<HotkeyAction, Instant>,
    debounce: Duration,
}

impl HotkeyScanner {
    pub fn new(bindings: Vec<(HotkeyAction, Vec<KeyToken>)>, debounce: Duration) -> Self {
        let mut bindings: Vec<_> = bindings
            .into_iter()
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect();
        // Stop is checked first so it can cut the tick short.
        bindings.sort_by_key(|(action, _)| *action != HotkeyAction::Stop);
        Self {
            bindings,
            last_fired: HashMap::new(),
            debounce,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn reset(&mut self) {
        self.last_fired.clear();
    }

    /// Actions whose combo is fully held at `now`. When `Stop` fires it is
    /// the only action returned.
    pub fn scan(&mut self, now: Instant, is_down: impl Fn(KeyToken) -> bool) -> Vec<HotkeyAction> {
        let mut fired = Vec::new();
        for (action, tokens) in &self.bindings {
            if !tokens.iter().all(|token| is_down(*token)) {
                continue;
            }
            let debounced = self
                .last_fired
                .get(action)
                .is_some_and(|last| now.saturating_duration_since(*last) < self.debounce);
            if debounced {
                continue;
            }
            self.last_fired.insert(*action, now);
            if *action == HotkeyAction::Stop {
                return vec![HotkeyAction::Stop];
            }
            fired.push(*action);
        }
        fired
    }
}
