use super::InputEngine;
use crate::keys::KeyAction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MacroStep {
    Key {
        keys: String,
        #[serde(default = "default_step_action")]
        action: KeyAction,
    },
    Delay {
        ms: u64,
    },
}

fn default_step_action() -> KeyAction {
    KeyAction::Click
}

/// A named macro. Workers receive their own clone, so edits to the source
/// list never affect a running invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroDefinition {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<MacroStep>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

fn default_repeat() -> u32 {
    1
}

impl MacroDefinition {
    /// Parse a macro leniently. Malformed steps are dropped with a warning;
    /// `None` only when the macro has no usable name.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let name = value
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let Some(name) = name else {
            tracing::warn!(%value, "skipping macro without a name");
            return None;
        };

        let mut steps = Vec::new();
        if let Some(raw_steps) = value.get("steps").and_then(|v| v.as_array()) {
            for (i, raw) in raw_steps.iter().enumerate() {
                match serde_json::from_value::<MacroStep>(raw.clone()) {
                    Ok(step) => steps.push(step),
                    Err(err) => {
                        tracing::warn!(macro_name = name, step = i, %err, "skipping malformed macro step")
                    }
                }
            }
        }

        let repeat = match value.get("repeat") {
            None | Some(serde_json::Value::Null) => 1,
            Some(v) => match v.as_u64() {
                Some(n) => n.min(u32::MAX as u64) as u32,
                None => {
                    tracing::warn!(macro_name = name, repeat = %v, "invalid repeat count; using 1");
                    1
                }
            },
        };

        Some(Self {
            name: name.to_string(),
            steps,
            repeat,
        })
    }
}

/// Liveness flag for a run session that workers inject under.
///
/// Key steps run while holding the gate lock, so once [`SessionGate::close`]
/// has returned no worker can start another key-down.
#[derive(Debug, Default)]
pub struct SessionGate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl SessionGate {
    pub fn open(&self) {
        if let Ok(mut open) = self.open.lock() {
            *open = true;
        }
    }

    pub fn close(&self) {
        if let Ok(mut open) = self.open.lock() {
            *open = false;
        }
        self.changed.notify_all();
    }

    pub fn is_open(&self) -> bool {
        self.open.lock().map(|open| *open).unwrap_or(false)
    }

    /// Run `f` only while the session is open. Returns whether it ran.
    pub fn run(&self, f: impl FnOnce()) -> bool {
        let Ok(open) = self.open.lock() else {
            return false;
        };
        if !*open {
            return false;
        }
        f();
        drop(open);
        true
    }

    /// Sleep for `duration`, waking early if the session closes. Returns
    /// `true` when the session is still open afterwards.
    pub fn sleep(&self, duration: Duration) -> bool {
        let Ok(open) = self.open.lock() else {
            return false;
        };
        match self
            .changed
            .wait_timeout_while(open, duration, |open| *open)
        {
            Ok((open, _)) => *open,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroReport {
    pub name: String,
    pub completed: bool,
}

/// Spawns one worker thread per macro invocation and collects their reports.
pub struct MacroRunner {
    definitions: HashMap<String, MacroDefinition>,
    gate: Arc<SessionGate>,
    workers: Vec<JoinHandle<()>>,
    report_tx: Sender<MacroReport>,
    report_rx: Receiver<MacroReport>,
}

impl Default for MacroRunner {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MacroRunner {
    pub fn new(definitions: Vec<MacroDefinition>) -> Self {
        let (report_tx, report_rx) = channel();
        let mut runner = Self {
            definitions: HashMap::new(),
            gate: Arc::new(SessionGate::default()),
            workers: Vec::new(),
            report_tx,
            report_rx,
        };
        runner.set_definitions(definitions);
        runner
    }

    /// Replace the macro table. Names are matched case-insensitively; a later
    /// duplicate wins.
    pub fn set_definitions(&mut self, definitions: Vec<MacroDefinition>) {
        self.definitions = definitions
            .into_iter()
            .map(|def| (def.name.to_lowercase(), def))
            .collect();
    }

    pub fn definition(&self, name: &str) -> Option<&MacroDefinition> {
        self.definitions.get(&name.to_lowercase())
    }

    pub fn gate(&self) -> &Arc<SessionGate> {
        &self.gate
    }

    pub fn begin_session(&self) {
        self.gate.open();
    }

    pub fn is_session_open(&self) -> bool {
        self.gate.is_open()
    }

    /// Start `name` on its own worker. Returns `false` for unknown macros or
    /// when no session is running.
    pub fn dispatch(&mut self, name: &str, engine: &Arc<InputEngine>) -> bool {
        let Some(definition) = self.definition(name).cloned() else {
            tracing::warn!(macro_name = name, "unknown macro");
            return false;
        };
        self.spawn(definition, engine)
    }

    pub fn spawn(&mut self, definition: MacroDefinition, engine: &Arc<InputEngine>) -> bool {
        if !self.gate.is_open() {
            tracing::debug!(macro_name = %definition.name, "session closed; not starting macro");
            return false;
        }
        self.workers.retain(|worker| !worker.is_finished());

        let gate = Arc::clone(&self.gate);
        let engine = Arc::clone(engine);
        let reports = self.report_tx.clone();
        let name = definition.name.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("macro-{name}"))
            .spawn(move || {
                let completed = run_steps(&definition, &engine, &gate);
                if completed {
                    tracing::debug!(macro_name = %definition.name, "macro finished");
                } else {
                    tracing::info!(macro_name = %definition.name, "macro aborted by stop");
                }
                let _ = reports.send(MacroReport {
                    name: definition.name,
                    completed,
                });
            });
        match spawned {
            Ok(handle) => {
                self.workers.push(handle);
                true
            }
            Err(err) => {
                tracing::error!(?err, macro_name = %name, "failed to spawn macro worker");
                false
            }
        }
    }

    /// Reports from workers that finished since the last call.
    pub fn reap(&mut self) -> Vec<MacroReport> {
        self.workers.retain(|worker| !worker.is_finished());
        self.report_rx.try_iter().collect()
    }

    pub fn active_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| !worker.is_finished())
            .count()
    }

    /// Close the session and wait for every worker to observe it.
    pub fn stop(&mut self) {
        self.gate.close();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("macro worker panicked");
            }
        }
    }
}

impl Drop for MacroRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_steps(definition: &MacroDefinition, engine: &InputEngine, gate: &SessionGate) -> bool {
    let repeat = definition.repeat.max(1);
    for pass in 0..repeat {
        for (i, step) in definition.steps.iter().enumerate() {
            let alive = match step {
                MacroStep::Key { keys, action } => {
                    tracing::trace!(macro_name = %definition.name, pass, step = i, keys = %keys, %action, "macro key step");
                    gate.run(|| engine.trigger(keys, *action))
                }
                MacroStep::Delay { ms } => gate.sleep(Duration::from_millis(*ms)),
            };
            if !alive {
                return false;
            }
        }
    }
    true
}
