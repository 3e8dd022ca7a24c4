// Bandpulse: momentum, surge and shareable-moment analytics for bands,
// events and QR codes.
//
// This is the library root. Each module corresponds to a major subsystem
// of the analytics pipeline.

pub mod config;
pub mod db;
pub mod error;
pub mod moments;
pub mod output;
pub mod pipeline;
pub mod scoring;
pub mod signals;
pub mod status;

pub use error::{EngineResult, PulseError};
pub use pipeline::PulseEngine;
