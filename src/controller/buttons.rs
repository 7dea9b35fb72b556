use crate::keys::MouseButton;
use crate::scene::ControlId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    Pressed(MouseButton),
    Released(MouseButton),
}

/// Edge detector over polled physical button state.
#[derive(Debug, Clone, Default)]
pub struct ButtonTracker {
    down: [bool; 5],
}

impl ButtonTracker {
    pub fn poll(
        &mut self,
        buttons: &[MouseButton],
        is_down: impl Fn(MouseButton) -> bool,
    ) -> Vec<ButtonEdge> {
        let mut edges = Vec::new();
        for &button in buttons {
            let now_down = is_down(button);
            let was_down = std::mem::replace(&mut self.down[button.index()], now_down);
            match (was_down, now_down) {
                (false, true) => edges.push(ButtonEdge::Pressed(button)),
                (true, false) => edges.push(ButtonEdge::Released(button)),
                _ => {}
            }
        }
        edges
    }

    /// Adopt the current state without reporting edges, e.g. while our own
    /// forwarded click is in flight.
    pub fn resync(&mut self, buttons: &[MouseButton], is_down: impl Fn(MouseButton) -> bool) {
        for &button in buttons {
            self.down[button.index()] = is_down(button);
        }
    }
}

/// Which control a physical button press was attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingClick {
    pub control: ControlId,
    pub keys: String,
}

/// At most one [`HoldingClick`] per physical button.
#[derive(Debug, Clone, Default)]
pub struct HoldingClicks {
    slots: [Option<HoldingClick>; 5],
}

impl HoldingClicks {
    /// Record a press. Returns a previous record for the same button that was
    /// never released, so the caller can release it.
    pub fn begin(&mut self, button: MouseButton, click: HoldingClick) -> Option<HoldingClick> {
        self.slots[button.index()].replace(click)
    }

    pub fn end(&mut self, button: MouseButton) -> Option<HoldingClick> {
        self.slots[button.index()].take()
    }

    pub fn is_holding(&self, control: ControlId) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|click| click.control == control)
    }

    pub fn drain(&mut self) -> Vec<(MouseButton, HoldingClick)> {
        MouseButton::ALL
            .into_iter()
            .filter_map(|button| self.end(button).map(|click| (button, click)))
            .collect()
    }
}
