// Shareable fan moments — auto triggers, show recaps, and the share copy
// they carry.

pub mod context;
pub mod copy;
pub mod recap;
pub mod triggers;
