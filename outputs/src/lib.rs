//! `outputs` — Consumers for fused entity states.
//!
//! # Module layout
//! - [`wire`]        — JSON push payload (four-decimal reals)
//! - [`visualizer`]  — Terminal table / per-state line display
//! - [`push_server`] — TCP broadcast of states as JSON lines

pub mod push_server;
pub mod visualizer;
pub mod wire;

pub use push_server::PushServer;
pub use visualizer::CliVisualizer;
pub use wire::{serialize_state, serialize_states, WireState};
