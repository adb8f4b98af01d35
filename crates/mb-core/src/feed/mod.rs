//! Remote feed abstractions (Twitter today).

pub mod port;
pub mod throttled;
