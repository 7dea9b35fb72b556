use super::InputBackend;
use crate::control::ScreenPoint;
use crate::keys::{MouseButton, WheelDirection};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedInput {
    Key { vk: u16, down: bool },
    MouseButton { button: MouseButton, down: bool },
    Wheel(WheelDirection),
    MoveCursor(ScreenPoint),
}

/// Records injected input and serves scripted physical key/cursor state.
#[derive(Debug)]
pub struct MockInputBackend {
    log: Mutex<Vec<InjectedInput>>,
    physical_down: Mutex<HashSet<u16>>,
    cursor: Mutex<ScreenPoint>,
    screen: (i32, i32),
}

impl Default for MockInputBackend {
    fn default() -> Self {
        Self::with_screen(1920, 1080)
    }
}

impl MockInputBackend {
    pub fn with_screen(width: i32, height: i32) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            physical_down: Mutex::new(HashSet::new()),
            cursor: Mutex::new(ScreenPoint::default()),
            screen: (width, height),
        }
    }

    pub fn set_key_down(&self, vk: u16, down: bool) {
        if let Ok(mut keys) = self.physical_down.lock() {
            if down {
                keys.insert(vk);
            } else {
                keys.remove(&vk);
            }
        }
    }

    pub fn set_button_down(&self, button: MouseButton, down: bool) {
        self.set_key_down(button.vk(), down);
    }

    pub fn set_cursor(&self, point: ScreenPoint) {
        if let Ok(mut cursor) = self.cursor.lock() {
            *cursor = point;
        }
    }

    pub fn events(&self) -> Vec<InjectedInput> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn clear_events(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }

    /// Keys whose last injected transition was a key-down.
    pub fn keys_held(&self) -> Vec<u16> {
        let mut held: Vec<u16> = Vec::new();
        for event in self.events() {
            if let InjectedInput::Key { vk, down } = event {
                held.retain(|k| *k != vk);
                if down {
                    held.push(vk);
                }
            }
        }
        held
    }

    fn record(&self, event: InjectedInput) {
        if let Ok(mut log) = self.log.lock() {
            log.push(event);
        }
    }
}

impl InputBackend for MockInputBackend {
    fn send_key(&self, vk: u16, down: bool) -> anyhow::Result<()> {
        self.record(InjectedInput::Key { vk, down });
        Ok(())
    }

    fn send_mouse_button(&self, button: MouseButton, down: bool) -> anyhow::Result<()> {
        self.record(InjectedInput::MouseButton { button, down });
        Ok(())
    }

    fn send_wheel(&self, direction: WheelDirection) -> anyhow::Result<()> {
        self.record(InjectedInput::Wheel(direction));
        Ok(())
    }

    fn move_cursor(&self, point: ScreenPoint) -> anyhow::Result<()> {
        self.record(InjectedInput::MoveCursor(point));
        self.set_cursor(point);
        Ok(())
    }

    fn cursor_position(&self) -> Option<ScreenPoint> {
        self.cursor.lock().ok().map(|cursor| *cursor)
    }

    fn is_key_down(&self, vk: u16) -> bool {
        self.physical_down
            .lock()
            .map(|keys| keys.contains(&vk))
            .unwrap_or(false)
    }

    fn screen_size(&self) -> Option<(i32, i32)> {
        Some(self.screen)
    }
}
