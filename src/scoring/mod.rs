// Scoring — pulse score / momentum state, and surge push eligibility.

pub mod pulse;
pub mod surge;
