//! Page I/O and page structure definitions for Berkeley DB btree files
//!
//! A container is an array of fixed-size pages. The page size and the byte
//! order are fixed when the file is created and recorded in the metadata
//! page (page 0). Every non-metadata page starts with the same 26-byte header.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::Bytes;
use std::io::{self, Read, Seek, SeekFrom};

use crate::error::ContainerError;

/// Smallest page size Berkeley DB will create
pub const MIN_PAGE_SIZE: u32 = 512;

/// Largest page size Berkeley DB will create
pub const MAX_PAGE_SIZE: u32 = 64 * 1024;

/// Size of the common page header
pub const PAGE_HEADER_SIZE: usize = 26;

/// Extra bytes between the header and the item index when page checksums are on:
/// two pad bytes, then the 4-byte checksum
pub const CHECKSUM_SIZE: usize = 6;

/// Byte order the file was written in (the creating host's native order)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Read a u16 at `offset`, or `None` if it would run past `data`
    pub fn u16_at(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes = data.get(offset..offset.checked_add(2)?)?;
        Some(match self {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        })
    }

    /// Read a u32 at `offset`, or `None` if it would run past `data`
    pub fn u32_at(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes = data.get(offset..offset.checked_add(4)?)?;
        Some(match self {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        })
    }
}

impl std::fmt::Display for Endian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Endian::Little => "little-endian",
            Endian::Big => "big-endian",
        })
    }
}

/// Page type identifiers (byte 25 of every page)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    Invalid = 0,
    /// Old-style duplicate page
    Duplicate = 1,
    HashUnsorted = 2,
    /// Btree internal node
    InternalBTree = 3,
    InternalRecno = 4,
    /// Btree leaf node: alternating key and data items
    LeafBTree = 5,
    LeafRecno = 6,
    /// Overflow page holding part of a large item
    Overflow = 7,
    HashMeta = 8,
    /// Btree metadata page
    BTreeMeta = 9,
    QueueMeta = 10,
    QueueData = 11,
    /// Off-page duplicate leaf: data items only
    LeafDuplicate = 12,
    Hash = 13,
    Unknown = 0xFF,
}

impl From<u8> for PageType {
    fn from(value: u8) -> Self {
        match value {
            0 => PageType::Invalid,
            1 => PageType::Duplicate,
            2 => PageType::HashUnsorted,
            3 => PageType::InternalBTree,
            4 => PageType::InternalRecno,
            5 => PageType::LeafBTree,
            6 => PageType::LeafRecno,
            7 => PageType::Overflow,
            8 => PageType::HashMeta,
            9 => PageType::BTreeMeta,
            10 => PageType::QueueMeta,
            11 => PageType::QueueData,
            12 => PageType::LeafDuplicate,
            13 => PageType::Hash,
            _ => PageType::Unknown,
        }
    }
}

/// How pages of one container are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub page_size: u32,
    pub endian: Endian,
    /// Offset of the item index (`inp[]`) within a page
    pub index_start: usize,
}

impl PageLayout {
    pub fn new(page_size: u32, endian: Endian, checksums: bool) -> Self {
        let index_start = if checksums {
            PAGE_HEADER_SIZE + CHECKSUM_SIZE
        } else {
            PAGE_HEADER_SIZE
        };
        PageLayout {
            page_size,
            endian,
            index_start,
        }
    }
}

/// Common page header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    pub page_number: u32,
    pub prev_page: u32,
    pub next_page: u32,
    /// Number of item index slots in use
    pub entries: u16,
    /// High free offset; on overflow pages, the number of payload bytes
    pub hf_offset: u16,
    /// Tree level, 1 for leaves
    pub level: u8,
    pub page_type: PageType,
}

impl PageHeader {
    /// Parse the header from the start of a page
    pub fn from_bytes(data: &[u8], endian: Endian) -> Option<Self> {
        if data.len() < PAGE_HEADER_SIZE {
            return None;
        }
        Some(PageHeader {
            page_number: endian.u32_at(data, 8)?,
            prev_page: endian.u32_at(data, 12)?,
            next_page: endian.u32_at(data, 16)?,
            entries: endian.u16_at(data, 20)?,
            hf_offset: endian.u16_at(data, 22)?,
            level: data[24],
            page_type: PageType::from(data[25]),
        })
    }
}

/// A page read from the container
#[derive(Clone)]
pub struct Page {
    pub header: PageHeader,
    pub layout: PageLayout,
    /// Raw page data; slices of it are handed out as record bytes
    pub data: Bytes,
}

impl Page {
    /// Wrap raw page data, checking that the header describes page `page_number`
    pub fn from_data(
        page_number: u32,
        data: Bytes,
        layout: PageLayout,
    ) -> Result<Self, ContainerError> {
        let header = PageHeader::from_bytes(&data, layout.endian)
            .ok_or_else(|| ContainerError::corrupt(page_number, "page shorter than its header"))?;

        if header.page_number != page_number {
            return Err(ContainerError::corrupt(
                page_number,
                format!("header claims to be page {}", header.page_number),
            ));
        }

        let index_end = layout.index_start + header.entries as usize * 2;
        if index_end > data.len() {
            return Err(ContainerError::corrupt(
                page_number,
                format!("{} entries overflow the page", header.entries),
            ));
        }

        Ok(Page {
            header,
            layout,
            data,
        })
    }

    pub fn page_number(&self) -> u32 {
        self.header.page_number
    }

    pub fn page_type(&self) -> PageType {
        self.header.page_type
    }

    pub fn entries(&self) -> u16 {
        self.header.entries
    }

    /// Offset of item `index` within the page
    pub fn item_offset(&self, index: u16) -> Result<usize, ContainerError> {
        if index >= self.header.entries {
            return Err(ContainerError::corrupt(
                self.page_number(),
                format!("item {} out of range ({} entries)", index, self.header.entries),
            ));
        }
        let slot = self.layout.index_start + index as usize * 2;
        let offset = self
            .layout
            .endian
            .u16_at(&self.data, slot)
            .ok_or_else(|| ContainerError::corrupt(self.page_number(), "item index truncated"))?;
        Ok(offset as usize)
    }

    /// Payload carried by an overflow page
    pub fn overflow_payload(&self) -> Result<Bytes, ContainerError> {
        let start = self.layout.index_start;
        let end = start + self.header.hf_offset as usize;
        if end > self.data.len() {
            return Err(ContainerError::corrupt(
                self.page_number(),
                format!("overflow length {} exceeds page", self.header.hf_offset),
            ));
        }
        Ok(self.data.slice(start..end))
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("page_number", &self.header.page_number)
            .field("page_type", &self.header.page_type)
            .field("entries", &self.header.entries)
            .field("next_page", &self.header.next_page)
            .finish()
    }
}

/// Read-only page access on a file
pub struct PageIO<F> {
    file: F,
    page_size: u32,
}

impl<F: Read + Seek> PageIO<F> {
    pub fn new(file: F, page_size: u32) -> Self {
        PageIO { file, page_size }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Read the raw bytes of a page
    pub fn read_page(&mut self, page_number: u32) -> io::Result<Bytes> {
        let offset = page_number as u64 * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut data = vec![0u8; self.page_size as usize];
        self.file.read_exact(&mut data)?;

        Ok(Bytes::from(data))
    }

    /// Number of whole pages in the file
    pub fn page_count(&mut self) -> io::Result<u32> {
        let end = self.file.seek(SeekFrom::End(0))?;
        Ok((end / self.page_size as u64).min(u32::MAX as u64) as u32)
    }
}
