//! # Transitions
//!
//! Every scene shows one still image under a time-based transition. The
//! transition is a pure function of the scene-local progress in `[0, 1]`:
//! [`compute_transform`] turns it into a destination rectangle and opacity,
//! and [`TransitionRenderer`] paints the image there.

pub mod kind;
pub mod renderer;

pub use kind::{transition_for, TransitionKind, TRANSITION_CYCLE};
pub use renderer::{compute_transform, ease_out_cubic, DrawTransform, TransitionRenderer};
