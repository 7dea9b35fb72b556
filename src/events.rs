use crate::control::ControlDescriptor;
use crate::controller::HotkeyAction;
use crate::keys::KeyAction;
use crate::passthrough::PassthroughMode;
use crate::scene::ControlId;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

/// Notifications the runtime sends to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    HoverActivated {
        control: ControlId,
        descriptor: ControlDescriptor,
    },
    HoverDeactivated {
        control: ControlId,
        descriptor: ControlDescriptor,
    },
    HoverProgress {
        control: ControlId,
        charge: f32,
        release: f32,
    },
    /// `control` is `None` for voice commands and other actions not tied to a
    /// control.
    ActionTriggered {
        control: Option<ControlId>,
        keys: String,
        action: KeyAction,
    },
    PassthroughChanged(PassthroughMode),
    CursorOnUi(bool),
    AutoCenterProgress {
        progress: f32,
        x: i32,
        y: i32,
    },
    HotkeyFired(HotkeyAction),
    StopRequested,
    MacroFinished {
        name: String,
        completed: bool,
    },
}

pub trait RuntimeEventSink: Send + Sync {
    fn dispatch(&self, event: RuntimeEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RuntimeEventSink for NullSink {
    fn dispatch(&self, _event: RuntimeEvent) {}
}

/// Forwards events over an mpsc channel so a UI thread can `try_recv` them.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Mutex<Sender<RuntimeEvent>>,
}

impl ChannelSink {
    pub fn new(tx: Sender<RuntimeEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl RuntimeEventSink for ChannelSink {
    fn dispatch(&self, event: RuntimeEvent) {
        if let Ok(tx) = self.tx.lock() {
            // A dropped receiver just means nobody is listening any more.
            let _ = tx.send(event);
        }
    }
}
