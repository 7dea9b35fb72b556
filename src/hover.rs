use crate::control::VisualState;
use std::time::{Duration, Instant};

/// Interval the host is expected to tick at; progress is computed from
/// elapsed time, so the machine tolerates jitter around it.
pub const HOVER_TICK: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverState {
    Idle,
    Charging,
    Active,
    Releasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverSignal {
    Activated,
    Deactivated,
}

/// Delay-gated hover charge/release machine owned by a single control.
///
/// `IDLE -> CHARGING -> ACTIVE -> RELEASING -> IDLE`. A zero hover delay skips
/// charging and a zero release delay skips releasing. Calls that do not apply
/// to the current state are ignored.
#[derive(Debug, Clone)]
pub struct HoverStateMachine {
    state: HoverState,
    hover_delay: Duration,
    release_delay: Duration,
    phase_started: Option<Instant>,
    charge_progress: f32,
    release_progress: f32,
}

impl HoverStateMachine {
    pub fn new(hover_delay: Duration, release_delay: Duration) -> Self {
        Self {
            state: HoverState::Idle,
            hover_delay,
            release_delay,
            phase_started: None,
            charge_progress: 0.0,
            release_progress: 0.0,
        }
    }

    pub fn from_millis(hover_delay_ms: u64, release_delay_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(hover_delay_ms),
            Duration::from_millis(release_delay_ms),
        )
    }

    pub fn state(&self) -> HoverState {
        self.state
    }

    pub fn charge_progress(&self) -> f32 {
        self.charge_progress
    }

    pub fn release_progress(&self) -> f32 {
        self.release_progress
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, HoverState::Active | HoverState::Releasing)
    }

    pub fn enter(&mut self, now: Instant) -> Option<HoverSignal> {
        match self.state {
            HoverState::Idle if self.hover_delay.is_zero() => {
                self.activate();
                Some(HoverSignal::Activated)
            }
            HoverState::Idle => {
                self.state = HoverState::Charging;
                self.phase_started = Some(now);
                self.charge_progress = 0.0;
                None
            }
            HoverState::Releasing => {
                self.activate();
                None
            }
            HoverState::Charging | HoverState::Active => None,
        }
    }

    pub fn leave(&mut self, now: Instant) -> Option<HoverSignal> {
        match self.state {
            HoverState::Charging => {
                self.go_idle();
                None
            }
            HoverState::Active if self.release_delay.is_zero() => {
                self.go_idle();
                Some(HoverSignal::Deactivated)
            }
            HoverState::Active => {
                self.state = HoverState::Releasing;
                self.phase_started = Some(now);
                self.release_progress = 1.0;
                None
            }
            HoverState::Idle | HoverState::Releasing => None,
        }
    }

    /// Advance charging or releasing against the shared tick clock.
    pub fn tick(&mut self, now: Instant) -> Option<HoverSignal> {
        let started = self.phase_started?;
        let elapsed = now.saturating_duration_since(started);
        match self.state {
            HoverState::Charging => {
                if elapsed >= self.hover_delay {
                    self.activate();
                    return Some(HoverSignal::Activated);
                }
                self.charge_progress = ratio(elapsed, self.hover_delay);
                None
            }
            HoverState::Releasing => {
                if elapsed >= self.release_delay {
                    self.go_idle();
                    return Some(HoverSignal::Deactivated);
                }
                self.release_progress = 1.0 - ratio(elapsed, self.release_delay);
                None
            }
            HoverState::Idle | HoverState::Active => None,
        }
    }

    /// Force the machine back to idle. Reports `Deactivated` when a key may
    /// still be held so the caller can release it.
    pub fn reset(&mut self) -> Option<HoverSignal> {
        let was_active = self.is_active();
        self.go_idle();
        was_active.then_some(HoverSignal::Deactivated)
    }

    pub fn update_delays(&mut self, hover_delay: Duration, release_delay: Duration) {
        self.hover_delay = hover_delay;
        self.release_delay = release_delay;
    }

    pub fn visual_state(&self) -> VisualState {
        match self.state {
            HoverState::Idle => VisualState::Idle,
            HoverState::Charging => VisualState::Charging {
                progress: self.charge_progress,
            },
            HoverState::Active => VisualState::Active,
            HoverState::Releasing => VisualState::Releasing {
                progress: self.release_progress,
            },
        }
    }

    fn activate(&mut self) {
        self.state = HoverState::Active;
        self.phase_started = None;
        self.charge_progress = 1.0;
        self.release_progress = 1.0;
    }

    fn go_idle(&mut self) {
        self.state = HoverState::Idle;
        self.phase_started = None;
        self.charge_progress = 0.0;
        self.release_progress = 0.0;
    }
}

fn ratio(elapsed: Duration, total: Duration) -> f32 {
    if total.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0) as f32
}
