//! Report body rendering.

pub mod renderer;

pub use renderer::{render_body, RenderOptions};
