//! Domain layer - Pure business logic.

pub mod av;
pub mod chunks;
pub mod jobs;
pub mod model_output;
pub mod segments;
pub mod units;
