//! Open container - a btree file opened read-only
//!
//! The container owns the file handle, the page cache, and the parsed
//! metadata. It is released exactly once: when `close` is called, or when
//! the container (or the `Records` iterator that consumed it) is dropped.

use bytes::{Bytes, BytesMut};
use std::fs::{File, TryLockError};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::cursor::{Cursor, Records};
use super::page_cache::{CacheStats, PageCache, DEFAULT_CAPACITY};
use crate::error::{ContainerError, OpenError};
use crate::storage::item::{self, ItemData};
use crate::storage::meta::{BTreeMeta, MetaError, META_SIZE};
use crate::storage::page::{Endian, Page, PageIO, PageLayout, PageType, PAGE_HEADER_SIZE};

/// Deepest tree the cursor will descend before assuming a loop
const MAX_DEPTH: usize = 255;

/// Options for opening a container
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Named sub-database to read instead of the top-level tree
    pub database: Option<String>,
    /// Page cache capacity in pages
    pub cache_pages: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            database: None,
            cache_pages: DEFAULT_CAPACITY,
        }
    }
}

impl OpenOptions {
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database = Some(name.into());
        self
    }
}

/// Summary of an open container, for logging and diagnostics
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub path: PathBuf,
    pub endian: Endian,
    pub version: u32,
    pub page_size: u32,
    pub page_count: u32,
    pub last_page: u32,
    pub checksums: bool,
    /// Whether the top-level tree is a sub-database directory
    pub has_subdatabases: bool,
    /// Sub-database being read, if any
    pub database: Option<String>,
    pub root: u32,
    pub key_count: u32,
    pub record_count: u32,
}

/// A btree container opened for reading
pub struct Container {
    path: PathBuf,
    pages: PageIO<File>,
    cache: PageCache,
    layout: PageLayout,
    page_count: u32,
    master: BTreeMeta,
    tree: BTreeMeta,
    database: Option<String>,
}

/// Take a shared advisory lock for as long as `file` stays open
///
/// An exclusive holder (a writer) makes the open fail with `Locked`.
fn lock_shared(file: &File, path: &Path) -> Result<(), OpenError> {
    match file.try_lock_shared() {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(OpenError::Locked {
            path: path.to_path_buf(),
        }),
        Err(TryLockError::Error(e)) if e.kind() == io::ErrorKind::Unsupported => {
            debug!("{}: advisory locks unsupported, reading unlocked", path.display());
            Ok(())
        }
        Err(TryLockError::Error(e)) => Err(OpenError::from_io(path, e)),
    }
}

fn meta_error(path: &Path, err: MetaError) -> OpenError {
    match err {
        MetaError::NotBTree(reason) => OpenError::NotBTree {
            path: path.to_path_buf(),
            reason,
        },
        MetaError::Unsupported(reason) => OpenError::Unsupported {
            path: path.to_path_buf(),
            reason,
        },
    }
}

impl Container {
    /// Open the top-level tree of a container
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        Self::open_with(path, &OpenOptions::default())
    }

    /// Open a container with explicit options
    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self, OpenError> {
        let path = path.as_ref();

        let mut file = File::open(path).map_err(|e| OpenError::from_io(path, e))?;
        let metadata = file.metadata().map_err(|e| OpenError::from_io(path, e))?;
        if !metadata.is_file() {
            return Err(OpenError::NotBTree {
                path: path.to_path_buf(),
                reason: "not a regular file".into(),
            });
        }
        lock_shared(&file, path)?;

        let mut header = [0u8; META_SIZE];
        file.read_exact(&mut header).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => OpenError::NotBTree {
                path: path.to_path_buf(),
                reason: format!("file is only {} bytes", metadata.len()),
            },
            _ => OpenError::from_io(path, e),
        })?;

        let master = BTreeMeta::from_bytes(0, &header).map_err(|e| meta_error(path, e))?;
        let mut pages = PageIO::new(file, master.page_size);
        let page_count = pages.page_count().map_err(|e| OpenError::from_io(path, e))?;
        if page_count == 0 {
            return Err(OpenError::NotBTree {
                path: path.to_path_buf(),
                reason: format!("file is shorter than one {}-byte page", master.page_size),
            });
        }

        debug!(
            "{}: btree v{}, {}, {} pages of {} bytes",
            path.display(),
            master.version,
            master.endian,
            page_count,
            master.page_size
        );

        let mut container = Container {
            path: path.to_path_buf(),
            pages,
            cache: PageCache::new(options.cache_pages),
            layout: master.layout(),
            page_count,
            tree: master.clone(),
            master,
            database: None,
        };

        if let Some(name) = &options.database {
            container.tree = container.find_subdatabase(name)?;
            container.database = Some(name.clone());
        } else if container.master.has_subdatabases() {
            info!(
                "{}: top-level tree is a sub-database directory; records are database names",
                path.display()
            );
        }

        Ok(container)
    }

    /// Locate the metadata page of sub-database `name`
    fn find_subdatabase(&mut self, name: &str) -> Result<BTreeMeta, OpenError> {
        let path = self.path.clone();
        let not_found = || OpenError::NoSuchDatabase {
            path: path.clone(),
            name: name.to_string(),
        };
        if !self.master.has_subdatabases() {
            return Err(not_found());
        }

        let meta_page = self
            .subdatabase_pages()
            .map_err(|source| OpenError::Damaged {
                path: path.clone(),
                source,
            })?
            .into_iter()
            .find(|(db_name, _)| db_name.as_ref() == name.as_bytes())
            .map(|(_, page)| page)
            .ok_or_else(not_found)?;

        if meta_page == 0 || meta_page >= self.page_count {
            return Err(OpenError::Damaged {
                path: self.path.clone(),
                source: ContainerError::corrupt(
                    meta_page,
                    format!("database {:?} points outside the file", name),
                ),
            });
        }

        let data = self
            .pages
            .read_page(meta_page)
            .map_err(|e| OpenError::from_io(&self.path, e))?;
        let meta = BTreeMeta::from_bytes(meta_page, &data).map_err(|e| meta_error(&self.path, e))?;
        if meta.page_size != self.master.page_size || meta.endian != self.master.endian {
            return Err(OpenError::NotBTree {
                path: self.path.clone(),
                reason: format!("database {:?} has a mismatched layout", name),
            });
        }

        debug!(
            "{}: database {:?} at meta page {}, root {}",
            self.path.display(),
            name,
            meta_page,
            meta.root
        );
        Ok(meta)
    }

    /// Walk the sub-database directory: (name, metadata page) pairs
    fn subdatabase_pages(&mut self) -> Result<Vec<(Bytes, u32)>, ContainerError> {
        let mut cursor = Cursor::new(self.master.root);
        let mut entries = Vec::new();
        while let Some(record) = cursor.next(self) {
            let record = record?;
            // Directory page numbers are stored in network byte order
            let page = Endian::Big.u32_at(&record.value, 0).filter(|_| record.value.len() == 4);
            match page {
                Some(page) => entries.push((record.key, page)),
                None => {
                    return Err(ContainerError::corrupt(
                        self.master.root,
                        format!("directory entry has a {}-byte value", record.value.len()),
                    ))
                }
            }
        }
        Ok(entries)
    }

    /// Names of the sub-databases stored in this file
    pub fn subdatabases(&mut self) -> Result<Vec<String>, ContainerError> {
        if !self.master.has_subdatabases() {
            return Ok(Vec::new());
        }
        Ok(self
            .subdatabase_pages()?
            .into_iter()
            .map(|(name, _)| String::from_utf8_lossy(&name).into_owned())
            .collect())
    }

    /// Consume the container into a forward-only record iterator
    pub fn records(self) -> Records {
        let root = self.tree.root;
        Records::new(Cursor::new(root), self)
    }

    /// Release the file handle and cached pages
    pub fn close(self) {
        drop(self);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn info(&self) -> ContainerInfo {
        ContainerInfo {
            path: self.path.clone(),
            endian: self.master.endian,
            version: self.master.version,
            page_size: self.master.page_size,
            page_count: self.page_count,
            last_page: self.master.last_page,
            checksums: self.layout.index_start != PAGE_HEADER_SIZE,
            has_subdatabases: self.master.has_subdatabases(),
            database: self.database.clone(),
            root: self.tree.root,
            key_count: self.tree.key_count,
            record_count: self.tree.record_count,
        }
    }

    /// Read a tree page through the cache
    pub(crate) fn page(&mut self, page_number: u32) -> Result<Page, ContainerError> {
        if page_number == 0 || page_number >= self.page_count {
            return Err(ContainerError::corrupt(
                page_number,
                format!("page reference outside the file ({} pages)", self.page_count),
            ));
        }

        if let Some(page) = self.cache.get(page_number) {
            return Ok(page);
        }

        let data = self
            .pages
            .read_page(page_number)
            .map_err(|source| ContainerError::Io {
                page: page_number,
                source,
            })?;
        let page = Page::from_data(page_number, data, self.layout)?;
        self.cache.put(page.clone());
        Ok(page)
    }

    /// Read a page and check its type
    pub(crate) fn page_of_type(
        &mut self,
        page_number: u32,
        expected: PageType,
    ) -> Result<Page, ContainerError> {
        let page = self.page(page_number)?;
        if page.page_type() != expected {
            return Err(ContainerError::corrupt(
                page_number,
                format!("expected {:?} page, found {:?}", expected, page.page_type()),
            ));
        }
        Ok(page)
    }

    /// Follow first children from `root` down to the leftmost leaf of type `leaf_type`
    pub(crate) fn descend(&mut self, root: u32, leaf_type: PageType) -> Result<Page, ContainerError> {
        let mut page_number = root;
        for _ in 0..MAX_DEPTH {
            let page = self.page(page_number)?;
            match page.page_type() {
                t if t == leaf_type => return Ok(page),
                PageType::InternalBTree => {
                    if page.entries() == 0 {
                        return Err(ContainerError::corrupt(page_number, "empty internal page"));
                    }
                    page_number = item::internal_child(&page, 0)?;
                }
                // Unsorted duplicate sets are stored as recno trees
                PageType::InternalRecno if leaf_type == PageType::LeafDuplicate => {
                    if page.entries() == 0 {
                        return Err(ContainerError::corrupt(page_number, "empty internal page"));
                    }
                    page_number = item::internal_recno_child(&page, 0)?;
                }
                other => {
                    return Err(ContainerError::corrupt(
                        page_number,
                        format!("unexpected {:?} page while descending to a leaf", other),
                    ));
                }
            }
        }
        Err(ContainerError::corrupt(
            root,
            format!("tree deeper than {} levels", MAX_DEPTH),
        ))
    }

    /// Reassemble an item stored on a chain of overflow pages
    pub(crate) fn read_overflow(
        &mut self,
        first_page: u32,
        total_len: u32,
    ) -> Result<Bytes, ContainerError> {
        let total = total_len as usize;
        let mut buf = BytesMut::with_capacity(self.overflow_capacity(total));
        let mut page_number = first_page;
        let mut hops = 0u32;

        while buf.len() < total {
            if page_number == 0 {
                return Err(ContainerError::corrupt(
                    first_page,
                    format!("overflow chain ended after {} of {} bytes", buf.len(), total),
                ));
            }
            hops += 1;
            if hops > self.page_count {
                return Err(ContainerError::corrupt(first_page, "overflow chain loops"));
            }

            let page = self.page_of_type(page_number, PageType::Overflow)?;
            let chunk = page.overflow_payload()?;
            let take = chunk.len().min(total - buf.len());
            if take == 0 {
                return Err(ContainerError::corrupt(page_number, "empty overflow page"));
            }
            buf.extend_from_slice(&chunk[..take]);
            page_number = page.header.next_page;
        }

        Ok(buf.freeze())
    }

    /// Bytes to reserve for an overflow item claiming `total` bytes; no more
    /// than the whole file could carry
    fn overflow_capacity(&self, total: usize) -> usize {
        let per_page = (self.layout.page_size as usize).saturating_sub(self.layout.index_start);
        total.min(per_page.saturating_mul(self.page_count as usize))
    }

    /// Materialize the bytes of a key or data item found on `page_number`
    pub(crate) fn resolve(&mut self, page_number: u32, data: ItemData) -> Result<Bytes, ContainerError> {
        match data {
            ItemData::Inline(bytes) => Ok(bytes),
            ItemData::Overflow {
                first_page,
                total_len,
            } => self.read_overflow(first_page, total_len),
            ItemData::Duplicate { .. } => Err(ContainerError::corrupt(
                page_number,
                "duplicate-tree reference where an item was expected",
            )),
        }
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        let stats = self.cache.stats();
        debug!(
            "closing {} (cache: {} hits, {} misses)",
            self.path.display(),
            stats.hits,
            stats.misses
        );
        self.cache.clear();
    }
}
