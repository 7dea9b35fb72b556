use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do with a key combo when it is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAction {
    Press,
    Release,
    Click,
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Press => write!(f, "press"),
            KeyAction::Release => write!(f, "release"),
            KeyAction::Click => write!(f, "click"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

impl MouseButton {
    pub const ALL: [MouseButton; 5] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::X1,
        MouseButton::X2,
    ];

    /// Virtual key used to poll the physical button state.
    pub fn vk(self) -> u16 {
        match self {
            MouseButton::Left => 0x01,   // VK_LBUTTON
            MouseButton::Right => 0x02,  // VK_RBUTTON
            MouseButton::Middle => 0x04, // VK_MBUTTON
            MouseButton::X1 => 0x05,     // VK_XBUTTON1
            MouseButton::X2 => 0x06,     // VK_XBUTTON2
        }
    }

    pub fn index(self) -> usize {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
            MouseButton::X1 => 3,
            MouseButton::X2 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WheelDirection {
    Up,
    Down,
}

/// A single injectable input named inside a key combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyToken {
    Key(u16),
    Mouse(MouseButton),
    Wheel(WheelDirection),
}

/// Result of splitting a combo string into injectable tokens and macro names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCombo {
    pub tokens: Vec<KeyToken>,
    pub macros: Vec<String>,
    pub unknown: Vec<String>,
}

impl ParsedCombo {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.macros.is_empty()
    }
}

pub const MACRO_PREFIX: &str = "macro:";

/// Split a `+`-joined combo such as `Ctrl+Shift+T+macro:reload`.
///
/// Unknown tokens are collected in [`ParsedCombo::unknown`] and logged; the
/// rest of the combo is kept.
pub fn parse_combo(combo: &str) -> ParsedCombo {
    let mut parsed = ParsedCombo::default();
    for part in combo.split('+') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(name) = strip_prefix_ci(part, MACRO_PREFIX) {
            let name = name.trim();
            if name.is_empty() {
                tracing::warn!(combo, "macro token without a name");
                parsed.unknown.push(part.to_string());
            } else {
                parsed.macros.push(name.to_string());
            }
            continue;
        }
        match parse_token(part) {
            Some(token) => {
                if !parsed.tokens.contains(&token) {
                    parsed.tokens.push(token);
                }
            }
            None => {
                tracing::warn!(token = part, combo, "skipping unknown key token");
                parsed.unknown.push(part.to_string());
            }
        }
    }
    parsed
}

/// True when every token of `combo` is recognised and there is at least one.
pub fn is_valid_key_combo(combo: &str) -> bool {
    let parsed = parse_combo(combo);
    parsed.unknown.is_empty() && !parsed.is_empty()
}

pub fn parse_token(token: &str) -> Option<KeyToken> {
    let upper = token.trim().to_ascii_uppercase();
    match upper.as_str() {
        "MOUSE_LEFT" | "LBUTTON" => return Some(KeyToken::Mouse(MouseButton::Left)),
        "MOUSE_RIGHT" | "RBUTTON" => return Some(KeyToken::Mouse(MouseButton::Right)),
        "MOUSE_MIDDLE" | "MBUTTON" => return Some(KeyToken::Mouse(MouseButton::Middle)),
        "MOUSE_X1" | "XBUTTON1" => return Some(KeyToken::Mouse(MouseButton::X1)),
        "MOUSE_X2" | "XBUTTON2" => return Some(KeyToken::Mouse(MouseButton::X2)),
        "WHEEL_UP" | "WHEELUP" => return Some(KeyToken::Wheel(WheelDirection::Up)),
        "WHEEL_DOWN" | "WHEELDOWN" => return Some(KeyToken::Wheel(WheelDirection::Down)),
        _ => {}
    }
    virtual_key_from_name(&upper).map(KeyToken::Key)
}

/// Map an upper-case key name to its Win32 virtual key code.
pub fn virtual_key_from_name(upper: &str) -> Option<u16> {
    let vk = match upper {
        "CTRL" | "CONTROL" => 0x11,
        "SHIFT" => 0x10,
        "ALT" | "MENU" => 0x12,
        "WIN" | "WINDOWS" | "LWIN" => 0x5B,
        "RWIN" => 0x5C,
        "LSHIFT" | "LEFTSHIFT" => 0xA0,
        "RSHIFT" | "RIGHTSHIFT" => 0xA1,
        "LCTRL" | "LEFTCTRL" => 0xA2,
        "RCTRL" | "RIGHTCTRL" => 0xA3,
        "LALT" | "LEFTALT" => 0xA4,
        "RALT" | "RIGHTALT" => 0xA5,

        "ENTER" | "RETURN" => 0x0D,
        "TAB" => 0x09,
        "ESC" | "ESCAPE" => 0x1B,
        "SPACE" => 0x20,
        "BACKSPACE" | "BKSP" => 0x08,
        "DELETE" | "DEL" => 0x2E,
        "INSERT" | "INS" => 0x2D,
        "HOME" => 0x24,
        "END" => 0x23,
        "PAGEUP" | "PGUP" => 0x21,
        "PAGEDOWN" | "PGDN" => 0x22,
        "UP" => 0x26,
        "DOWN" => 0x28,
        "LEFT" => 0x25,
        "RIGHT" => 0x27,
        "PAUSE" => 0x13,
        "CAPSLOCK" => 0x14,
        "PRINTSCREEN" => 0x2C,
        "SCROLLLOCK" => 0x91,
        "NUMLOCK" => 0x90,

        "NUMPAD0" => 0x60,
        "NUMPAD1" => 0x61,
        "NUMPAD2" => 0x62,
        "NUMPAD3" => 0x63,
        "NUMPAD4" => 0x64,
        "NUMPAD5" => 0x65,
        "NUMPAD6" => 0x66,
        "NUMPAD7" => 0x67,
        "NUMPAD8" => 0x68,
        "NUMPAD9" => 0x69,
        "NUMPADMULTIPLY" => 0x6A,
        "NUMPADADD" => 0x6B,
        "NUMPADSUBTRACT" => 0x6D,
        "NUMPADDOT" => 0x6E,
        "NUMPADDIVIDE" => 0x6F,

        "PLUS" | "=" | "OEM_PLUS" => 0xBB,
        "COMMA" | "," | "OEM_COMMA" => 0xBC,
        "MINUS" | "-" | "OEM_MINUS" => 0xBD,
        "PERIOD" | "." | "OEM_PERIOD" => 0xBE,
        ";" | "OEM_1" => 0xBA,
        "/" | "OEM_2" => 0xBF,
        "`" | "OEM_3" => 0xC0,
        "[" | "OEM_4" => 0xDB,
        "\\" | "OEM_5" => 0xDC,
        "]" | "OEM_6" => 0xDD,
        "'" | "OEM_7" => 0xDE,

        _ => return function_or_char_key(upper),
    };
    Some(vk)
}

fn function_or_char_key(upper: &str) -> Option<u16> {
    if upper.len() >= 2 && upper.starts_with('F') {
        if let Ok(n) = upper[1..].parse::<u16>() {
            if (1..=24).contains(&n) {
                return Some(0x6F + n); // VK_F1 = 0x70
            }
        }
    }

    let mut chars = upper.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii_alphabetic() || ch.is_ascii_digit() => Some(ch as u16),
        _ => None,
    }
}

/// Keys that need `KEYEVENTF_EXTENDEDKEY` when injected by scan code.
pub fn is_extended_key(vk: u16) -> bool {
    matches!(
        vk,
        0x21..=0x28 | 0x2D | 0x2E | 0x5B | 0x5C | 0x6F | 0xA3 | 0xA5 | 0x90 | 0x2C
    )
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() < prefix.len() || !s.is_char_boundary(prefix.len()) {
        return None;
    }
    if s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
