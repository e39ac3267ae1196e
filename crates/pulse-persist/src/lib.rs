pub mod backend;
pub mod memory;
pub mod redis;

pub use backend::PersistBackend;
pub use memory::MemoryBackend;
pub use redis::RedisBackend;
