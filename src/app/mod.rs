mod keyboard;
mod orchestrator;
mod presenter;
mod runtime;
mod shutdown;
mod startup;
mod types;

#[cfg(test)]
mod tests;

pub use keyboard::{intent_for_key, KeyboardInputHandler};
pub use orchestrator::{AppBackends, SmartCameraApp};
pub use presenter::describe_changes;
pub use types::{ComponentState, Intent, ShutdownReason};
