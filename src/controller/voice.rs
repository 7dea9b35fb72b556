use crate::keys::KeyAction;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceCommand {
    pub phrase: String,
    pub keys: String,
    pub action: KeyAction,
}

/// Contract the speech pipeline calls when it recognises a phrase.
pub trait VoiceCommandHandler: Send + Sync {
    fn on_voice_command(&self, phrase: &str, keys: &str, action: KeyAction);
}

/// Queues recognised commands for the next controller tick. Cheap to clone
/// into the recogniser thread.
#[derive(Debug, Clone)]
pub struct VoiceCommandSender {
    tx: Sender<VoiceCommand>,
}

impl VoiceCommandSender {
    pub(crate) fn new(tx: Sender<VoiceCommand>) -> Self {
        Self { tx }
    }
}

impl VoiceCommandHandler for VoiceCommandSender {
    fn on_voice_command(&self, phrase: &str, keys: &str, action: KeyAction) {
        let command = VoiceCommand {
            phrase: phrase.to_string(),
            keys: keys.to_string(),
            action,
        };
        if self.tx.send(command).is_err() {
            tracing::debug!(phrase, "voice command dropped; controller is gone");
        }
    }
}
