//! Local adapters: filesystem artifacts plus an in-process or Redis store.

pub mod fs;
pub mod memory;
#[cfg(feature = "local")]
pub mod redis;
#[cfg(feature = "local")]
mod wiring;

pub use fs::FsAdapter;
pub use memory::MemoryStore;
#[cfg(feature = "local")]
pub use redis::RedisPool;
#[cfg(feature = "local")]
pub use wiring::local_ports;
