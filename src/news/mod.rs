pub mod catalyst;
pub mod impact;
pub mod ingest;

pub use impact::ImpactComputer;
pub use ingest::NewsIngest;
