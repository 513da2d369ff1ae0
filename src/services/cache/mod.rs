pub mod client;
pub mod memory;
pub mod valkey;

pub use client::{CacheClient, CacheError};
pub use memory::MemoryClient;
pub use valkey::ValkeyClient;
