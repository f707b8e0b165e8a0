//! Conversation navigation: actions, callback tokens and renders.

mod action;
mod machine;
mod render;
pub mod texts;

pub use action::{DialogContext, MAX_TOKEN_BYTES, NavigationAction};
pub use machine::NavigationStateMachine;
pub use render::{Button, Delivery, KeyboardKind, RenderInstruction};
