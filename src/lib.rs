pub mod control;
pub mod controller;
pub mod events;
pub mod hover;
pub mod input;
pub mod keys;
pub mod logging;
pub mod passthrough;
pub mod scene;
pub mod settings;

pub use control::{ControlDescriptor, ControlShape, Interactable, ScreenPoint, VisualState};
pub use controller::{RunController, RunOptions, SessionConfig};
pub use events::{RuntimeEvent, RuntimeEventSink};
pub use hover::{HoverSignal, HoverState, HoverStateMachine};
pub use input::InputEngine;
pub use passthrough::{PassthroughManager, PassthroughMode};
pub use scene::{ControlId, ControlScene, Scene};
pub use settings::RuntimeSettings;
