use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// A slot in the buffer pool: one page image plus the metadata the pool
/// tracks for it.
///
/// Residency, pin, and dirty changes happen under the pool mutex; each is a
/// small atomic so readers such as guards and introspection never need that
/// mutex. The byte image sits behind its own reader/writer latch and is
/// reachable only through the latch methods the guards build on, or the
/// whole-image staging helpers used for disk I/O.
pub struct FrameHeader {
    /// Index of this frame in the pool, fixed at construction
    frame_id: FrameId,
    /// Raw ID of the resident page; `u32::MAX` when the frame is empty
    page_id: AtomicU32,
    /// Number of live users; a pinned frame is never an eviction victim
    pin_count: AtomicU32,
    /// Set when the image differs from the on-disk bytes
    is_dirty: AtomicBool,
    /// The page image behind its latch. Frames already live behind an Arc,
    /// so the image is stored inline rather than boxed.
    bytes: RwLock<[u8; PAGE_SIZE]>,
}

impl FrameHeader {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicU32::new(INVALID_PAGE_ID.as_u32()),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            bytes: RwLock::new([0u8; PAGE_SIZE]),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page resident in this frame, INVALID_PAGE_ID if none.
    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Acquire))
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.as_u32(), Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Adds a user, returning the new pin count.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drops a user, returning the new pin count. Returns None when the
    /// count is already zero; the count never goes below zero.
    pub fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .ok()
            .map(|previous| previous - 1)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Acquires the page latch in shared mode.
    pub(crate) fn latch_shared(&self) -> RwLockReadGuard<'_, [u8; PAGE_SIZE]> {
        self.bytes.read()
    }

    /// Acquires the page latch in exclusive mode.
    pub(crate) fn latch_exclusive(&self) -> RwLockWriteGuard<'_, [u8; PAGE_SIZE]> {
        self.bytes.write()
    }

    /// Attempts the exclusive latch without blocking.
    pub(crate) fn try_latch_exclusive(&self) -> Option<RwLockWriteGuard<'_, [u8; PAGE_SIZE]>> {
        self.bytes.try_write()
    }

    /// Replaces the page image, staging a page in from disk.
    pub fn write_image(&self, src: &[u8]) {
        assert_eq!(src.len(), PAGE_SIZE);
        self.latch_exclusive().copy_from_slice(src);
    }

    /// Copies the page image out, staging a page for write-back.
    pub fn read_image(&self, dst: &mut [u8]) {
        assert_eq!(dst.len(), PAGE_SIZE);
        dst.copy_from_slice(&*self.latch_shared());
    }

    /// Returns the frame to its empty state: no resident page, no users,
    /// clean, zeroed image.
    pub fn reset(&self) {
        self.set_page_id(INVALID_PAGE_ID);
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.latch_exclusive().fill(0);
    }
}
