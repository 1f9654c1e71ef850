//! Btree metadata page
//!
//! Page 0 of every container, and the first page of every sub-database, is a
//! metadata page. Layout (offsets in bytes, file byte order):
//! - 0x0C: magic (u32), identifies the access method and the byte order
//! - 0x10: version (u32)
//! - 0x14: page size (u32)
//! - 0x18: encryption algorithm (u8)
//! - 0x19: page type (u8)
//! - 0x1A: meta flags (u8)
//! - 0x20: last page number (u32)
//! - 0x28: key count (u32), 0x2C: record count (u32)
//! - 0x30: access-method flags (u32)
//! - 0x58: root page (u32)

use super::page::{Endian, PageLayout, PageType, MAX_PAGE_SIZE, MIN_PAGE_SIZE};

/// Magic number of the btree access method
pub const BTREE_MAGIC: u32 = 0x0005_3162;
pub const HASH_MAGIC: u32 = 0x0006_1561;
pub const QUEUE_MAGIC: u32 = 0x0004_2253;
pub const HEAP_MAGIC: u32 = 0x0007_4582;

/// Btree on-disk versions this reader understands
pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u32> = 7..=10;

/// Bytes of page 0 needed to identify and parse a btree metadata page
pub const META_SIZE: usize = 92;

bitflags::bitflags! {
    /// Flags in the generic metadata header
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MetaFlags: u8 {
        /// Pages carry a checksum after the header
        const CHECKSUM = 0x01;
        const PARTITION_RANGE = 0x02;
        const PARTITION_CALLBACK = 0x04;
    }
}

bitflags::bitflags! {
    /// Btree access-method flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BTreeFlags: u32 {
        const DUP = 0x001;
        const RECNO = 0x002;
        const RECNUM = 0x004;
        const FIXEDLEN = 0x008;
        const RENUMBER = 0x010;
        /// Records of this tree name sub-databases
        const SUBDB = 0x020;
        const DUPSORT = 0x040;
        const COMPRESS = 0x080;
    }
}

/// Access method identified from the magic number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMethod {
    BTree,
    Hash,
    Queue,
    Heap,
}

impl std::fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AccessMethod::BTree => "btree",
            AccessMethod::Hash => "hash",
            AccessMethod::Queue => "queue",
            AccessMethod::Heap => "heap",
        })
    }
}

/// Why a metadata page was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    /// Not a Berkeley DB file at all, or not a btree
    NotBTree(String),
    /// A btree, but one using features this reader does not handle
    Unsupported(String),
}

/// Identify the access method and byte order from the magic at offset 12
pub fn detect(data: &[u8]) -> Result<(AccessMethod, Endian), MetaError> {
    for endian in [Endian::Little, Endian::Big] {
        let magic = endian
            .u32_at(data, 12)
            .ok_or_else(|| MetaError::NotBTree("file shorter than a metadata header".into()))?;
        let method = match magic {
            BTREE_MAGIC => AccessMethod::BTree,
            HASH_MAGIC => AccessMethod::Hash,
            QUEUE_MAGIC => AccessMethod::Queue,
            HEAP_MAGIC => AccessMethod::Heap,
            _ => continue,
        };
        return Ok((method, endian));
    }
    Err(MetaError::NotBTree("unrecognized magic number".into()))
}

/// Parsed btree metadata page
#[derive(Debug, Clone)]
pub struct BTreeMeta {
    pub page_number: u32,
    pub endian: Endian,
    pub version: u32,
    pub page_size: u32,
    pub meta_flags: MetaFlags,
    pub last_page: u32,
    pub key_count: u32,
    pub record_count: u32,
    pub flags: BTreeFlags,
    pub root: u32,
}

impl BTreeMeta {
    /// Parse the metadata page stored at `page_number`
    pub fn from_bytes(page_number: u32, data: &[u8]) -> Result<Self, MetaError> {
        if data.len() < META_SIZE {
            return Err(MetaError::NotBTree("metadata page truncated".into()));
        }

        let (method, endian) = detect(data)?;
        if method != AccessMethod::BTree {
            return Err(MetaError::Unsupported(format!(
                "{} access method ({})",
                method, endian
            )));
        }

        // Length was checked above, so the reads below cannot fail
        let field = |offset| endian.u32_at(data, offset).unwrap_or_default();

        let version = field(16);
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(MetaError::Unsupported(format!("btree version {}", version)));
        }

        let page_size = field(20);
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) || !page_size.is_power_of_two() {
            return Err(MetaError::NotBTree(format!("invalid page size {}", page_size)));
        }

        if data[24] != 0 {
            return Err(MetaError::Unsupported(format!(
                "encrypted container (algorithm {})",
                data[24]
            )));
        }

        let page_type = PageType::from(data[25]);
        if page_type != PageType::BTreeMeta {
            return Err(MetaError::NotBTree(format!(
                "metadata page has type {:?}",
                page_type
            )));
        }

        let stored_number = field(8);
        if stored_number != page_number {
            return Err(MetaError::NotBTree(format!(
                "metadata page {} claims to be page {}",
                page_number, stored_number
            )));
        }

        let meta_flags = MetaFlags::from_bits_truncate(data[26]);
        if meta_flags.intersects(MetaFlags::PARTITION_RANGE | MetaFlags::PARTITION_CALLBACK) {
            return Err(MetaError::Unsupported("partitioned database".into()));
        }

        let flags = BTreeFlags::from_bits_truncate(field(48));
        if flags.contains(BTreeFlags::RECNO) {
            return Err(MetaError::Unsupported("record-number (recno) tree".into()));
        }
        if flags.contains(BTreeFlags::COMPRESS) {
            return Err(MetaError::Unsupported("compressed btree".into()));
        }

        Ok(BTreeMeta {
            page_number,
            endian,
            version,
            page_size,
            meta_flags,
            last_page: field(32),
            key_count: field(40),
            record_count: field(44),
            flags,
            root: field(88),
        })
    }

    /// Page layout implied by this metadata
    pub fn layout(&self) -> PageLayout {
        PageLayout::new(
            self.page_size,
            self.endian,
            self.meta_flags.contains(MetaFlags::CHECKSUM),
        )
    }

    /// Whether this tree is a directory of named sub-databases
    pub fn has_subdatabases(&self) -> bool {
        self.flags.contains(BTreeFlags::SUBDB)
    }
}
