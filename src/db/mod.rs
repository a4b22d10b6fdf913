pub mod connection;
pub mod dao;
mod detached;
pub mod entities;
mod memory;

pub use detached::DetachedRefreshStore;
pub use memory::MemoryStore;
