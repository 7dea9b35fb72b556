use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutoCenterTick {
    /// Disabled, or a key/hover is active.
    Inactive,
    /// Counting down; `remaining` goes from 1.0 to 0.0.
    Waiting { remaining: f32 },
    /// The delay elapsed; the idle timer has been restarted.
    Recenter,
}

/// Idle timer for moving the cursor back to the screen centre. Every press
/// or hover activation holds a reference; the timer only runs at zero.
#[derive(Debug, Clone)]
pub struct AutoCenter {
    enabled: bool,
    delay: Duration,
    active: u32,
    idle_since: Option<Instant>,
}

impl AutoCenter {
    pub fn new(enabled: bool, delay: Duration) -> Self {
        Self {
            enabled,
            delay,
            active: 0,
            idle_since: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.idle_since = None;
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn active_count(&self) -> u32 {
        self.active
    }

    pub fn acquire(&mut self) {
        self.active = self.active.saturating_add(1);
        self.idle_since = None;
    }

    /// Floors at zero so an unmatched release cannot wedge the timer.
    pub fn release(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        self.active = 0;
        self.idle_since = None;
    }

    pub fn tick(&mut self, now: Instant) -> AutoCenterTick {
        if !self.enabled || self.active > 0 {
            self.idle_since = None;
            return AutoCenterTick::Inactive;
        }
        let since = *self.idle_since.get_or_insert(now);
        let elapsed = now.saturating_duration_since(since);
        if elapsed >= self.delay {
            self.idle_since = Some(now);
            return AutoCenterTick::Recenter;
        }
        let remaining = 1.0 - (elapsed.as_secs_f64() / self.delay.as_secs_f64()) as f32;
        AutoCenterTick::Waiting {
            remaining: remaining.clamp(0.0, 1.0),
        }
    }
}
