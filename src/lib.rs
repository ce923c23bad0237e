//! Pagepool - a page buffer cache for disk-backed storage engines
//!
//! This crate implements the buffer cache subsystem that mediates between an
//! on-disk page store and in-memory consumers. It owns a fixed pool of
//! frames, keeps at most one in-memory copy per disk page, and governs when
//! modified pages are written back.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk access
//!   - `DiskManager`: reads and writes pages to/from a database file and
//!     hands out fresh page IDs
//!   - `DiskScheduler`: asynchronous disk I/O through a background worker
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pins pages into frames and caches them in memory
//!   - `LruKReplacer`: LRU-K page replacement policy
//!   - `FrameHeader`: per-frame metadata and page image
//!   - `PageGuard`/`ReadPageGuard`/`WritePageGuard`: RAII pins; the latched
//!     variants are the only way to reach page bytes
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pagepool::buffer::BufferPoolManager;
//! use pagepool::storage::disk::DiskManager;
//!
//! // Create a disk manager for a database file
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//!
//! // Create a buffer pool with 100 frames and LRU-2 replacement
//! let bpm = BufferPoolManager::new(100, 2, disk_manager);
//!
//! // Allocate a new page and write to it
//! let page_id = {
//!     let guard = bpm.new_page().unwrap().expect("pool exhausted");
//!     let mut guard = guard.upgrade_write();
//!     guard.data_mut()[0] = 42;
//!     guard.page_id()
//! };
//!
//! // Flush changes to disk
//! bpm.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, PoolError, Result};
