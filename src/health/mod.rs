pub mod monitor;

pub use monitor::{HealthMonitor, HealthSnapshot, ServiceHealth};
