//! Items stored on btree pages
//!
//! Leaf pages hold a sorted array of item offsets; the items alternate key,
//! data. Each item starts with a small header whose third byte is the item
//! type. Internal pages hold child pointers instead.

use bytes::Bytes;

use super::page::Page;
use crate::error::ContainerError;

/// Item holding its bytes inline
pub const B_KEYDATA: u8 = 1;
/// Item pointing to an off-page duplicate tree
pub const B_DUPLICATE: u8 = 2;
/// Item pointing to a chain of overflow pages
pub const B_OVERFLOW: u8 = 3;
/// Set on items that were deleted but not yet reclaimed
pub const B_DELETE: u8 = 0x80;

/// Inline item header: len (u16), type (u8)
const KEYDATA_HEADER: usize = 3;
/// Overflow/duplicate item: unused (u16), type (u8), unused (u8), pgno (u32), tlen (u32)
const OVERFLOW_SIZE: usize = 12;
/// Internal item: len (u16), type (u8), unused (u8), pgno (u32), nrecs (u32), data
const INTERNAL_HEADER: usize = 12;
/// Recno internal item: pgno (u32), nrecs (u32)
const RECNO_INTERNAL_SIZE: usize = 8;

/// Where an item's bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemData {
    /// Bytes stored on the page itself
    Inline(Bytes),
    /// Bytes stored on a chain of overflow pages
    Overflow { first_page: u32, total_len: u32 },
    /// Root page of an off-page duplicate tree
    Duplicate { root: u32 },
}

/// An item read from a leaf page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafItem {
    pub data: ItemData,
    pub deleted: bool,
}

/// Decode leaf item `index` of `page`
pub fn leaf_item(page: &Page, index: u16) -> Result<LeafItem, ContainerError> {
    let page_number = page.page_number();
    let offset = page.item_offset(index)?;
    let data = &page.data;
    let endian = page.layout.endian;

    if offset < page.layout.index_start || offset + KEYDATA_HEADER > data.len() {
        return Err(ContainerError::corrupt(
            page_number,
            format!("item {} at offset {} lies outside the page", index, offset),
        ));
    }

    let raw_type = data[offset + 2];
    let deleted = raw_type & B_DELETE != 0;

    let item = match raw_type & !B_DELETE {
        B_KEYDATA => {
            let len = endian.u16_at(data, offset).unwrap_or_default() as usize;
            let start = offset + KEYDATA_HEADER;
            if start + len > data.len() {
                return Err(ContainerError::corrupt(
                    page_number,
                    format!("item {} length {} runs past the page", index, len),
                ));
            }
            ItemData::Inline(data.slice(start..start + len))
        }
        kind @ (B_OVERFLOW | B_DUPLICATE) => {
            if offset + OVERFLOW_SIZE > data.len() {
                return Err(ContainerError::corrupt(
                    page_number,
                    format!("item {} truncated", index),
                ));
            }
            let target = endian.u32_at(data, offset + 4).unwrap_or_default();
            if kind == B_OVERFLOW {
                ItemData::Overflow {
                    first_page: target,
                    total_len: endian.u32_at(data, offset + 8).unwrap_or_default(),
                }
            } else {
                ItemData::Duplicate { root: target }
            }
        }
        other => {
            return Err(ContainerError::corrupt(
                page_number,
                format!("item {} has unknown type {:#04x}", index, other),
            ));
        }
    };

    Ok(LeafItem {
        data: item,
        deleted,
    })
}

/// Child page referenced by internal item `index` of `page`
pub fn internal_child(page: &Page, index: u16) -> Result<u32, ContainerError> {
    let offset = page.item_offset(index)?;
    if offset < page.layout.index_start || offset + INTERNAL_HEADER > page.data.len() {
        return Err(ContainerError::corrupt(
            page.page_number(),
            format!("internal item {} at offset {} lies outside the page", index, offset),
        ));
    }
    Ok(page
        .layout
        .endian
        .u32_at(&page.data, offset + 4)
        .unwrap_or_default())
}

/// Child page referenced by recno internal item `index` of `page`
///
/// Unsorted off-page duplicate trees are recno trees; their internal items
/// carry no key and start with the child page number.
pub fn internal_recno_child(page: &Page, index: u16) -> Result<u32, ContainerError> {
    let offset = page.item_offset(index)?;
    if offset < page.layout.index_start || offset + RECNO_INTERNAL_SIZE > page.data.len() {
        return Err(ContainerError::corrupt(
            page.page_number(),
            format!("recno internal item {} at offset {} lies outside the page", index, offset),
        ));
    }
    Ok(page
        .layout
        .endian
        .u32_at(&page.data, offset)
        .unwrap_or_default())
}
