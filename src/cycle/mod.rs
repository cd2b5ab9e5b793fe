pub mod engine;
pub mod scheduler;

pub use engine::CycleEngine;
pub use scheduler::{CycleScheduler, MarketSession};
