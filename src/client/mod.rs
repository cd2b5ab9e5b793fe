pub mod circuit_breaker;
pub mod service_client;

pub use service_client::ServiceClient;
