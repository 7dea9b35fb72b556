use crate::control::{ControlDescriptor, Interactable, ScreenPoint, VisualState};
use crate::hover::{HoverSignal, HoverStateMachine};
use slab::Slab;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(pub usize);

/// The UI layer's view of its interactive items.
pub trait Scene {
    /// Topmost control under `point`, by the scene's own z-order.
    fn hit_test(&self, point: ScreenPoint) -> Option<ControlId>;
    fn control_mut(&mut self, id: ControlId) -> Option<&mut dyn Interactable>;
    fn control_ids(&self) -> Vec<ControlId>;
}

#[derive(Debug)]
pub struct SceneControl {
    descriptor: ControlDescriptor,
    hover: Option<HoverStateMachine>,
    visual: VisualState,
    seq: u64,
}

impl SceneControl {
    fn new(descriptor: ControlDescriptor, seq: u64) -> Self {
        let hover = if descriptor.actions.hover.trim().is_empty() {
            None
        } else {
            Some(HoverStateMachine::from_millis(
                descriptor.hover_delay_ms,
                descriptor.hover_release_delay_ms,
            ))
        };
        Self {
            descriptor,
            hover,
            visual: VisualState::Idle,
            seq,
        }
    }

    pub fn visual_state(&self) -> VisualState {
        self.visual
    }
}

impl Interactable for SceneControl {
    fn descriptor(&self) -> &ControlDescriptor {
        &self.descriptor
    }

    fn hover_machine(&mut self) -> Option<&mut HoverStateMachine> {
        self.hover.as_mut()
    }

    fn set_visual_state(&mut self, state: VisualState) {
        self.visual = state;
    }
}

/// Slab-backed scene used by the headless host and the tests.
///
/// Z-order: highest `z_index` wins, ties go to the most recently added
/// control.
#[derive(Debug, Default)]
pub struct ControlScene {
    controls: Slab<SceneControl>,
    next_seq: u64,
}

impl ControlScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ControlDescriptor>) -> Self {
        let mut scene = Self::new();
        for descriptor in descriptors {
            scene.add(descriptor);
        }
        scene
    }

    pub fn add(&mut self, descriptor: ControlDescriptor) -> ControlId {
        let seq = self.next_seq;
        self.next_seq += 1;
        ControlId(self.controls.insert(SceneControl::new(descriptor, seq)))
    }

    /// Remove a control. Returns the hover deactivation the caller must act on
    /// when the control was holding its hover key.
    pub fn remove(&mut self, id: ControlId) -> Option<(ControlDescriptor, Option<HoverSignal>)> {
        let mut control = self.controls.try_remove(id.0)?;
        let signal = control.hover.as_mut().and_then(HoverStateMachine::reset);
        Some((control.descriptor, signal))
    }

    pub fn get(&self, id: ControlId) -> Option<&SceneControl> {
        self.controls.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

impl Scene for ControlScene {
    fn hit_test(&self, point: ScreenPoint) -> Option<ControlId> {
        self.controls
            .iter()
            .filter(|(_, control)| control.descriptor.shape.contains(point))
            .max_by_key(|(_, control)| (control.descriptor.z_index, control.seq))
            .map(|(key, _)| ControlId(key))
    }

    fn control_mut(&mut self, id: ControlId) -> Option<&mut dyn Interactable> {
        self.controls
            .get_mut(id.0)
            .map(|control| control as &mut dyn Interactable)
    }

    fn control_ids(&self) -> Vec<ControlId> {
        self.controls.iter().map(|(key, _)| ControlId(key)).collect()
    }
}
