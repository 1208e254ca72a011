//! Core engine module - wires the pipeline together

mod engine;

pub use engine::Engine;
