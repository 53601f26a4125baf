pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod ingest;
pub mod model;
pub mod publisher;
pub mod relay;
pub mod sealed_dm;
pub mod store;
pub mod utils;
pub mod zap;

pub use error::Error;
pub use nostr;
pub use nostr_relay_pool;
