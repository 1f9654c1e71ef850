//! Forward-only cursor over the records of a btree
//!
//! The cursor descends once from the root to the leftmost leaf, then walks
//! the leaf chain through `next_page` links. Records come out in key order.
//! Off-page duplicate trees are walked in place, each duplicate yielding a
//! record that shares the parent key.

use bytes::Bytes;
use std::iter::FusedIterator;
use tracing::trace;

use super::container::{Container, ContainerInfo};
use crate::error::ContainerError;
use crate::storage::item::{self, ItemData};
use crate::storage::page::{Page, PageType};

/// A key/value pair read from the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Bytes,
    pub value: Bytes,
}

/// Where the cursor stands
enum CursorState {
    /// Not yet descended from the root
    Unpositioned,
    /// On leaf `page`, next key item at `index`
    Leaf { page: Page, index: u16 },
    /// Inside the duplicate tree of `key`; resumes the parent leaf afterwards
    Duplicates {
        key: Bytes,
        page: Page,
        index: u16,
        leaf: Page,
        leaf_index: u16,
    },
    /// Past the last record, or stopped by an error
    Exhausted,
}

/// Cursor position within one tree
pub(crate) struct Cursor {
    root: u32,
    state: CursorState,
    /// Leaf and duplicate pages entered through sibling links
    pages_walked: u32,
}

impl Cursor {
    pub(crate) fn new(root: u32) -> Self {
        Cursor {
            root,
            state: CursorState::Unpositioned,
            pages_walked: 0,
        }
    }

    /// Advance to the next record; `None` at the end and after any error
    pub(crate) fn next(
        &mut self,
        container: &mut Container,
    ) -> Option<Result<Record, ContainerError>> {
        if matches!(self.state, CursorState::Exhausted) {
            return None;
        }
        match self.advance(container) {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.state = CursorState::Exhausted;
                None
            }
            Err(e) => {
                self.state = CursorState::Exhausted;
                Some(Err(e))
            }
        }
    }

    /// Follow a sibling link, refusing chains longer than the file
    fn sibling(
        &mut self,
        container: &mut Container,
        from: u32,
        next: u32,
        page_type: PageType,
    ) -> Result<Page, ContainerError> {
        self.pages_walked += 1;
        if self.pages_walked > container.page_count() {
            return Err(ContainerError::corrupt(from, "leaf chain loops back on itself"));
        }
        container.page_of_type(next, page_type)
    }

    fn advance(&mut self, container: &mut Container) -> Result<Option<Record>, ContainerError> {
        loop {
            match std::mem::replace(&mut self.state, CursorState::Exhausted) {
                CursorState::Exhausted => return Ok(None),

                CursorState::Unpositioned => {
                    let page = container.descend(self.root, PageType::LeafBTree)?;
                    trace!("cursor positioned on leaf {}", page.page_number());
                    self.state = CursorState::Leaf { page, index: 0 };
                }

                CursorState::Leaf { page, index } => {
                    let page_number = page.page_number();
                    if index >= page.entries() {
                        let next = page.header.next_page;
                        if next == 0 {
                            return Ok(None);
                        }
                        let page = self.sibling(container, page_number, next, PageType::LeafBTree)?;
                        self.state = CursorState::Leaf { page, index: 0 };
                        continue;
                    }
                    if index + 1 >= page.entries() {
                        return Err(ContainerError::corrupt(
                            page_number,
                            format!("key item {} has no data item", index),
                        ));
                    }

                    let key_item = item::leaf_item(&page, index)?;
                    let data_item = item::leaf_item(&page, index + 1)?;
                    if key_item.deleted || data_item.deleted {
                        trace!("skipping deleted pair {} on page {}", index, page_number);
                        self.state = CursorState::Leaf {
                            page,
                            index: index + 2,
                        };
                        continue;
                    }

                    let key = container.resolve(page_number, key_item.data)?;
                    match data_item.data {
                        ItemData::Duplicate { root } => {
                            let dups = container.descend(root, PageType::LeafDuplicate)?;
                            self.state = CursorState::Duplicates {
                                key,
                                page: dups,
                                index: 0,
                                leaf: page,
                                leaf_index: index + 2,
                            };
                        }
                        data => {
                            let value = container.resolve(page_number, data)?;
                            self.state = CursorState::Leaf {
                                page,
                                index: index + 2,
                            };
                            return Ok(Some(Record { key, value }));
                        }
                    }
                }

                CursorState::Duplicates {
                    key,
                    page,
                    index,
                    leaf,
                    leaf_index,
                } => {
                    let page_number = page.page_number();
                    if index >= page.entries() {
                        let next = page.header.next_page;
                        self.state = if next == 0 {
                            CursorState::Leaf {
                                page: leaf,
                                index: leaf_index,
                            }
                        } else {
                            let page =
                                self.sibling(container, page_number, next, PageType::LeafDuplicate)?;
                            CursorState::Duplicates {
                                key,
                                page,
                                index: 0,
                                leaf,
                                leaf_index,
                            }
                        };
                        continue;
                    }

                    let dup = item::leaf_item(&page, index)?;
                    let value = if dup.deleted {
                        None
                    } else {
                        Some(container.resolve(page_number, dup.data)?)
                    };
                    let record = value.map(|value| Record {
                        key: key.clone(),
                        value,
                    });
                    self.state = CursorState::Duplicates {
                        key,
                        page,
                        index: index + 1,
                        leaf,
                        leaf_index,
                    };
                    if record.is_some() {
                        return Ok(record);
                    }
                }
            }
        }
    }
}

/// Lazy, forward-only sequence of records from a consumed container
///
/// Dropping the iterator releases the cursor first, then the container.
pub struct Records {
    cursor: Cursor,
    container: Container,
}

impl Records {
    pub(crate) fn new(cursor: Cursor, container: Container) -> Self {
        Records { cursor, container }
    }

    pub fn info(&self) -> ContainerInfo {
        self.container.info()
    }

    /// Stop iterating and release the container
    pub fn close(self) {
        drop(self);
    }
}

impl Iterator for Records {
    type Item = Result<Record, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next(&mut self.container)
    }
}

impl FusedIterator for Records {}
