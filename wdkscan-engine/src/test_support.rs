//! Fixture writer for tests: lays out btree pages byte-for-byte

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::Write;

use tempfile::NamedTempFile;

use crate::storage::meta::BTREE_MAGIC;
use crate::storage::page::{Endian, PageType, PAGE_HEADER_SIZE};

/// Item index offset on checksummed pages, as Berkeley DB writes them
pub const CHECKSUMMED_INDEX_START: usize = 32;

fn put_u16(endian: Endian, buf: &mut [u8], offset: usize, value: u16) {
    match endian {
        Endian::Little => LittleEndian::write_u16(&mut buf[offset..offset + 2], value),
        Endian::Big => BigEndian::write_u16(&mut buf[offset..offset + 2], value),
    }
}

fn put_u32(endian: Endian, buf: &mut [u8], offset: usize, value: u32) {
    match endian {
        Endian::Little => LittleEndian::write_u32(&mut buf[offset..offset + 4], value),
        Endian::Big => BigEndian::write_u32(&mut buf[offset..offset + 4], value),
    }
}

/// A btree metadata page
pub fn meta_page(
    endian: Endian,
    page_size: u32,
    page_number: u32,
    root: u32,
    last_page: u32,
    flags: u32,
) -> Vec<u8> {
    let mut data = vec![0u8; page_size as usize];
    put_u32(endian, &mut data, 8, page_number);
    put_u32(endian, &mut data, 12, BTREE_MAGIC);
    put_u32(endian, &mut data, 16, 9);
    put_u32(endian, &mut data, 20, page_size);
    data[25] = PageType::BTreeMeta as u8;
    put_u32(endian, &mut data, 32, last_page);
    put_u32(endian, &mut data, 48, flags);
    put_u32(endian, &mut data, 88, root);
    data
}

/// One entry of a page under construction
#[derive(Debug, Clone)]
pub enum Item {
    Data(Vec<u8>),
    Deleted(Vec<u8>),
    Overflow { first_page: u32, total_len: u32 },
    DuplicateTree { root: u32 },
    /// Internal-page pointer to a child
    Child(u32),
    /// Recno internal-page pointer to a child
    RecnoChild(u32),
}

impl Item {
    pub fn data(bytes: &[u8]) -> Self {
        Item::Data(bytes.to_vec())
    }
}

/// Builds a single non-metadata page
pub struct PageBuilder {
    endian: Endian,
    page_size: u32,
    page_number: u32,
    page_type: PageType,
    items: Vec<Item>,
    prev_page: u32,
    next_page: u32,
    payload: Option<Vec<u8>>,
    checksums: bool,
}

impl PageBuilder {
    pub fn new(endian: Endian, page_size: u32, page_number: u32, page_type: PageType) -> Self {
        PageBuilder {
            endian,
            page_size,
            page_number,
            page_type,
            items: Vec::new(),
            prev_page: 0,
            next_page: 0,
            payload: None,
            checksums: false,
        }
    }

    pub fn items(mut self, items: &[Item]) -> Self {
        self.items.extend_from_slice(items);
        self
    }

    pub fn prev(mut self, page: u32) -> Self {
        self.prev_page = page;
        self
    }

    pub fn next(mut self, page: u32) -> Self {
        self.next_page = page;
        self
    }

    /// Overflow page contents
    pub fn payload(mut self, bytes: &[u8]) -> Self {
        self.payload = Some(bytes.to_vec());
        self
    }

    pub fn checksums(mut self, on: bool) -> Self {
        self.checksums = on;
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let endian = self.endian;
        let mut data = vec![0u8; self.page_size as usize];
        put_u32(endian, &mut data, 8, self.page_number);
        put_u32(endian, &mut data, 12, self.prev_page);
        put_u32(endian, &mut data, 16, self.next_page);
        data[24] = match self.page_type {
            PageType::InternalBTree | PageType::InternalRecno => 2,
            _ => 1,
        };
        data[25] = self.page_type as u8;

        let index_start = if self.checksums {
            CHECKSUMMED_INDEX_START
        } else {
            PAGE_HEADER_SIZE
        };

        if let Some(payload) = &self.payload {
            data[index_start..index_start + payload.len()].copy_from_slice(payload);
            put_u16(endian, &mut data, 22, payload.len() as u16);
            return data;
        }

        let mut top = data.len();
        for (index, item) in self.items.iter().enumerate() {
            let encoded = encode_item(endian, item);
            top -= encoded.len();
            data[top..top + encoded.len()].copy_from_slice(&encoded);
            put_u16(endian, &mut data, index_start + index * 2, top as u16);
        }
        put_u16(endian, &mut data, 20, self.items.len() as u16);
        put_u16(endian, &mut data, 22, top as u16);
        data
    }
}

fn encode_item(endian: Endian, item: &Item) -> Vec<u8> {
    match item {
        Item::Data(bytes) | Item::Deleted(bytes) => {
            let mut out = vec![0u8; 3 + bytes.len()];
            put_u16(endian, &mut out, 0, bytes.len() as u16);
            out[2] = if matches!(item, Item::Deleted(_)) { 0x81 } else { 0x01 };
            out[3..].copy_from_slice(bytes);
            out
        }
        Item::Overflow {
            first_page,
            total_len,
        } => {
            let mut out = vec![0u8; 12];
            out[2] = 0x03;
            put_u32(endian, &mut out, 4, *first_page);
            put_u32(endian, &mut out, 8, *total_len);
            out
        }
        Item::DuplicateTree { root } => {
            let mut out = vec![0u8; 12];
            out[2] = 0x02;
            put_u32(endian, &mut out, 4, *root);
            out
        }
        Item::Child(page) => {
            let mut out = vec![0u8; 12];
            out[2] = 0x01;
            put_u32(endian, &mut out, 4, *page);
            out
        }
        Item::RecnoChild(page) => {
            let mut out = vec![0u8; 8];
            put_u32(endian, &mut out, 0, *page);
            put_u32(endian, &mut out, 4, 1);
            out
        }
    }
}

/// Assembles a whole container file page by page
pub struct FixtureFile {
    pub endian: Endian,
    pub page_size: u32,
    pages: Vec<Vec<u8>>,
}

impl FixtureFile {
    pub fn new(endian: Endian, page_size: u32) -> Self {
        FixtureFile {
            endian,
            page_size,
            pages: Vec::new(),
        }
    }

    /// Start a page builder for `page_number`
    pub fn page(&self, page_number: u32, page_type: PageType) -> PageBuilder {
        PageBuilder::new(self.endian, self.page_size, page_number, page_type)
    }

    pub fn put(&mut self, page_number: u32, data: Vec<u8>) -> &mut Self {
        let index = page_number as usize;
        if self.pages.len() <= index {
            self.pages.resize(index + 1, vec![0u8; self.page_size as usize]);
        }
        self.pages[index] = data;
        self
    }

    pub fn meta(&mut self, page_number: u32, root: u32, flags: u32) -> &mut Self {
        let last_page = self.pages.len().max(page_number as usize + 1) as u32 - 1;
        let data = meta_page(self.endian, self.page_size, page_number, root, last_page, flags);
        self.put(page_number, data)
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.pages.concat()
    }

    pub fn write(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.bytes()).unwrap();
        file.flush().unwrap();
        file
    }
}

/// Container with a single leaf root holding `records` in order
pub fn single_leaf(endian: Endian, records: &[(&[u8], &[u8])]) -> FixtureFile {
    let mut fixture = FixtureFile::new(endian, 512);
    let items: Vec<Item> = records
        .iter()
        .flat_map(|(k, v)| [Item::data(k), Item::data(v)])
        .collect();
    let leaf = fixture.page(1, PageType::LeafBTree).items(&items).finish();
    fixture.put(1, leaf);
    fixture.meta(0, 1, 0);
    fixture
}
