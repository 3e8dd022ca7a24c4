// Pipelines — the engine's externally callable operations.

pub mod auto_moment;
pub mod engine;
pub mod evaluate;
pub mod fan_moment;
pub mod import;
pub mod locks;
pub mod recap;
pub mod sweep;

pub use engine::PulseEngine;
