//! File manager for btree containers
//!
//! Manages the open container, its page cache, and the record cursor.

pub mod container;
pub mod page_cache;
pub mod cursor;

pub use container::{Container, ContainerInfo, OpenOptions};
pub use page_cache::{CacheStats, PageCache};
pub use cursor::{Record, Records};
