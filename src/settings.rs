use crate::control::ControlDescriptor;
use crate::controller::HotkeyAction;
use crate::input::MacroDefinition;
use crate::keys::{is_valid_key_combo, parse_combo, KeyToken};
use crate::passthrough::PassthroughMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoCenterSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Idle time before the cursor is moved back to the screen centre.
    #[serde(default = "default_auto_center_delay")]
    pub delay_ms: u64,
}

impl Default for AutoCenterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: default_auto_center_delay(),
        }
    }
}

/// Read-only runtime configuration. The runtime never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Initialise the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub passthrough_mode: PassthroughMode,
    /// Hotkey action name to key combo, e.g. `"stop": "ctrl+shift+q"`.
    #[serde(default)]
    pub hotkeys: BTreeMap<String, String>,
    #[serde(default)]
    pub auto_center: AutoCenterSettings,
    #[serde(default = "default_click_jitter")]
    pub click_jitter_ms: (u64, u64),
    /// How long a forwarded click keeps the overlay click-through.
    #[serde(default = "default_forward_restore")]
    pub forward_click_restore_ms: u64,
    #[serde(default = "default_hotkey_debounce")]
    pub hotkey_debounce_ms: u64,
    /// Kept as raw JSON so one malformed macro cannot reject the file.
    #[serde(default)]
    pub macros: Vec<serde_json::Value>,
    #[serde(default)]
    pub controls: Vec<ControlDescriptor>,
}

fn default_tick_interval() -> u64 {
    16
}

fn default_auto_center_delay() -> u64 {
    3000
}

fn default_click_jitter() -> (u64, u64) {
    (30, 60)
}

fn default_forward_restore() -> u64 {
    30
}

fn default_hotkey_debounce() -> u64 {
    300
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            debug_logging: false,
            log_file: None,
            passthrough_mode: PassthroughMode::default(),
            hotkeys: BTreeMap::new(),
            auto_center: AutoCenterSettings::default(),
            click_jitter_ms: default_click_jitter(),
            forward_click_restore_ms: default_forward_restore(),
            hotkey_debounce_ms: default_hotkey_debounce(),
            macros: Vec::new(),
            controls: Vec::new(),
        }
    }
}

impl RuntimeSettings {
    /// Load settings from `path`. A missing or empty file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Valid macros; malformed entries and steps are skipped with a warning.
    pub fn macros(&self) -> Vec<MacroDefinition> {
        self.macros
            .iter()
            .filter_map(MacroDefinition::from_value)
            .collect()
    }

    /// Parsed hotkey table. Unknown action names and invalid combos are
    /// skipped with a warning.
    pub fn hotkey_bindings(&self) -> Vec<(HotkeyAction, Vec<KeyToken>)> {
        let mut bindings = Vec::new();
        for (name, combo) in &self.hotkeys {
            let Some(action) = HotkeyAction::from_name(name) else {
                tracing::warn!("unknown hotkey action '{}'; ignoring", name);
                continue;
            };
            if !is_valid_key_combo(combo) {
                tracing::warn!(
                    "provided hotkey string '{}' for '{}' is invalid; ignoring",
                    combo,
                    name
                );
                continue;
            }
            let parsed = parse_combo(combo);
            if !parsed.macros.is_empty() {
                tracing::warn!("hotkey '{}' cannot reference macros; ignoring", name);
                continue;
            }
            bindings.push((action, parsed.tokens));
        }
        bindings
    }
}
