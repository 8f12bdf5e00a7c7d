//! Menu-driven configuration.
//!
//! - [`Selection`] - decoded button tokens
//! - [`transition`] - the navigation table
//! - [`render`] - body text and buttons for each [`MenuState`]

mod machine;
mod render;
mod selection;

pub use machine::{Effect, MenuState, Transition, transition};
pub use render::{Button, Menu, render};
pub use selection::Selection;
