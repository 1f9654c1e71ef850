//! Storage layer for the Berkeley DB btree file format
//!
//! This module handles the low-level binary format of the container:
//! - Page I/O and the common page header
//! - Metadata page parsing and format detection
//! - Leaf and internal item decoding

pub mod page;
pub mod meta;
pub mod item;

pub use page::{Endian, Page, PageLayout, PageType};
pub use meta::{AccessMethod, BTreeFlags, BTreeMeta, MetaError};
pub use item::{ItemData, LeafItem};
