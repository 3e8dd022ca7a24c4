// Signals — typed interaction rows, the store they come from, and the
// normalizer that turns them into per-entity signal vectors.

pub mod fetcher;
pub mod interaction;
pub mod normalizer;
pub mod range;
pub mod traits;
