//! Astra edit canvas: a paint + shape mask editor that turns user gestures
//! into a black/white mask for a generative image-edit request.

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod settings;

pub use components::editor::{EditSession, EditorEvent, Transition};
pub use error::EditorError;
