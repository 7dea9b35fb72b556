use crate::hover::HoverStateMachine;
use crate::keys::MouseButton;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Outline of a virtual control in screen coordinates.
///
/// Angles are in degrees, measured clockwise from 12 o'clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlShape {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Sector {
        center_x: f32,
        center_y: f32,
        inner_radius: f32,
        outer_radius: f32,
        start_angle: f32,
        span_angle: f32,
    },
    Ring {
        center_x: f32,
        center_y: f32,
        inner_radius: f32,
        outer_radius: f32,
    },
}

impl ControlShape {
    pub fn contains(&self, point: ScreenPoint) -> bool {
        let px = point.x as f32;
        let py = point.y as f32;
        match *self {
            ControlShape::Rect {
                x,
                y,
                width,
                height,
            } => px >= x && px < x + width && py >= y && py < y + height,
            ControlShape::Ring {
                center_x,
                center_y,
                inner_radius,
                outer_radius,
            } => {
                let dist = (px - center_x).hypot(py - center_y);
                dist >= inner_radius && dist <= outer_radius
            }
            ControlShape::Sector {
                center_x,
                center_y,
                inner_radius,
                outer_radius,
                start_angle,
                span_angle,
            } => {
                let dx = px - center_x;
                let dy = py - center_y;
                let dist = dx.hypot(dy);
                if dist < inner_radius || dist > outer_radius {
                    return false;
                }
                if span_angle >= 360.0 {
                    return true;
                }
                // atan2(dx, -dy) gives 0 at 12 o'clock growing clockwise (y points down).
                let angle = dx.atan2(-dy).to_degrees().rem_euclid(360.0);
                let offset = (angle - start_angle).rem_euclid(360.0);
                offset <= span_angle
            }
        }
    }

    /// Centre of the shape, used for diagnostics and the host's hit-test bench.
    pub fn center(&self) -> (f32, f32) {
        match *self {
            ControlShape::Rect {
                x,
                y,
                width,
                height,
            } => (x + width / 2.0, y + height / 2.0),
            ControlShape::Sector {
                center_x,
                center_y,
                ..
            }
            | ControlShape::Ring {
                center_x,
                center_y,
                ..
            } => (center_x, center_y),
        }
    }
}

/// Key combos bound to each pointer interaction. Empty strings mean unbound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionKeys {
    pub hover: String,
    pub lclick: String,
    pub rclick: String,
    pub mclick: String,
    pub wheelup: String,
    pub wheeldown: String,
    pub xbutton1: String,
    pub xbutton2: String,
}

impl ActionKeys {
    pub fn for_button(&self, button: MouseButton) -> &str {
        match button {
            MouseButton::Left => &self.lclick,
            MouseButton::Right => &self.rclick,
            MouseButton::Middle => &self.mclick,
            MouseButton::X1 => &self.xbutton1,
            MouseButton::X2 => &self.xbutton2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    #[serde(default)]
    pub label: String,
    pub shape: ControlShape,
    #[serde(default)]
    pub actions: ActionKeys,
    #[serde(default)]
    pub hover_delay_ms: u64,
    #[serde(default)]
    pub hover_release_delay_ms: u64,
    /// Higher values are hit first; ties go to the most recently added control.
    #[serde(default)]
    pub z_index: i32,
}

impl ControlDescriptor {
    pub fn new(label: impl Into<String>, shape: ControlShape) -> Self {
        Self {
            label: label.into(),
            shape,
            actions: ActionKeys::default(),
            hover_delay_ms: 0,
            hover_release_delay_ms: 0,
            z_index: 0,
        }
    }
}

/// What the scene should draw for a control.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum VisualState {
    #[default]
    Idle,
    Hovered,
    Charging {
        progress: f32,
    },
    Active,
    Releasing {
        progress: f32,
    },
    Pressed,
}

/// Capability every control variant exposes to the run controller.
pub trait Interactable {
    fn descriptor(&self) -> &ControlDescriptor;
    fn hover_machine(&mut self) -> Option<&mut HoverStateMachine>;
    fn set_visual_state(&mut self, state: VisualState);
}
