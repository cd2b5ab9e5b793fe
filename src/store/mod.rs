pub mod gateway;
pub mod pool;
pub mod schema;

pub use gateway::StoreGateway;
pub use pool::StorePool;
