use std::collections::{HashMap, LinkedList};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{FrameId, PageId, PoolError, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruKReplacer, PageGuard, ReadPageGuard, WritePageGuard};

/// Mutable pool bookkeeping, serialized under a single mutex.
pub(crate) struct PoolState {
    /// Maps resident page IDs to the frame holding them
    pub(crate) page_table: HashMap<PageId, FrameId>,
    /// Frames holding no resident page
    pub(crate) free_list: LinkedList<FrameId>,
}

/// State shared between the buffer pool manager and the guards it hands out.
pub(crate) struct PoolShared {
    /// One header per frame, fixed at construction
    pub(crate) frames: Vec<Arc<FrameHeader>>,
    /// Page table and free list under the pool mutex
    pub(crate) state: Mutex<PoolState>,
    /// Eviction policy; its public API is independently thread-safe
    pub(crate) replacer: LruKReplacer,
}

impl PoolShared {
    pub(crate) fn new(pool_size: usize, k: usize) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: LruKReplacer::new(k, pool_size),
        }
    }

    /// Releases one pin on a resident page, optionally marking it dirty.
    /// Returns false if the page ID is invalid, the page is not resident,
    /// or the pin count is already zero. When the pin count reaches zero
    /// the frame becomes an eviction candidate.
    pub(crate) fn unpin(&self, page_id: PageId, mark_dirty: bool) -> bool {
        if page_id == INVALID_PAGE_ID {
            return false;
        }

        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };

        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() == 0 {
            return false;
        }

        if mark_dirty {
            frame.set_dirty(true);
        }
        if let Some(0) = frame.unpin() {
            self.replacer.set_evictable(frame_id, true);
        }

        true
    }
}

/// BufferPoolManager mediates between the on-disk page store and in-memory
/// consumers. It owns a fixed pool of frames, keeps at most one in-memory
/// copy per disk page, evicts with the LRU-K policy, and writes dirty
/// victims back before their frame is reused. Page bytes are only reachable
/// through the guards returned by the fetch and new operations.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// State shared with outstanding guards
    shared: Arc<PoolShared>,
    /// Disk scheduler for page I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size, k value for
    /// LRU-K, and disk manager. All frames start on the free list.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Self {
        Self {
            pool_size,
            shared: Arc::new(PoolShared::new(pool_size, k)),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page and pins it into a frame.
    /// Returns a guard holding the pin, or None if every frame is pinned.
    pub fn new_page(&self) -> Result<Option<PageGuard>> {
        let state = &mut *self.shared.state.lock();

        let Some(frame_id) = self.acquire_frame(state)? else {
            return Ok(None);
        };

        let page_id = self.disk_scheduler.disk_manager().allocate_page()?;

        let frame = &self.shared.frames[frame_id.as_usize()];
        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();

        state.page_table.insert(page_id, frame_id);

        self.shared.replacer.record_access(frame_id);
        self.shared.replacer.set_evictable(frame_id, false);

        Ok(Some(PageGuard::new(
            Arc::clone(&self.shared),
            Arc::clone(frame),
            page_id,
        )))
    }

    /// Fetches a page and returns an unlatched guard holding its pin.
    /// Returns None if the page is not resident and every frame is pinned.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<Option<PageGuard>> {
        if page_id == INVALID_PAGE_ID {
            return Err(PoolError::InvalidPageId(page_id));
        }

        let Some(frame_id) = self.fetch_page(page_id)? else {
            return Ok(None);
        };

        let frame = Arc::clone(&self.shared.frames[frame_id.as_usize()]);
        Ok(Some(PageGuard::new(
            Arc::clone(&self.shared),
            frame,
            page_id,
        )))
    }

    /// Fetches a page for read access, holding its reader latch.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<Option<ReadPageGuard>> {
        Ok(self
            .fetch_page_basic(page_id)?
            .map(PageGuard::upgrade_read))
    }

    /// Fetches a page for write access, holding its writer latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<Option<WritePageGuard>> {
        Ok(self
            .fetch_page_basic(page_id)?
            .map(PageGuard::upgrade_write))
    }

    /// Releases one pin on a page. Guards call this on drop; it is also the
    /// escape hatch for callers holding no guard. Returns false if the page
    /// ID is invalid, the page is not resident, or the pin count is already
    /// zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.shared.unpin(page_id, is_dirty)
    }

    /// Writes a page's current bytes to disk and clears its dirty flag.
    /// Returns false if the page is not resident. Pin count and
    /// evictability are left untouched.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let state = self.shared.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };

        let frame = &self.shared.frames[frame_id.as_usize()];
        let mut data = [0u8; PAGE_SIZE];
        frame.read_image(&mut data);

        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);

        Ok(true)
    }

    /// Writes every resident page back to disk and clears the dirty flags.
    pub fn flush_all_pages(&self) -> Result<()> {
        let state = self.shared.state.lock();

        for (&page_id, &frame_id) in state.page_table.iter() {
            let frame = &self.shared.frames[frame_id.as_usize()];
            let mut data = [0u8; PAGE_SIZE];
            frame.read_image(&mut data);
            self.disk_scheduler.schedule_write_sync(page_id, &data)?;
            frame.set_dirty(false);
        }

        Ok(())
    }

    /// Deletes a page from the buffer pool and deallocates it on disk.
    /// Returns false if the page is resident and pinned; state is left
    /// unchanged in that case. Deleting a non-resident page only touches
    /// the disk store.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let state = &mut *self.shared.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            self.disk_scheduler.disk_manager().deallocate_page(page_id)?;
            return Ok(true);
        };

        let frame = &self.shared.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        state.page_table.remove(&page_id);
        self.shared.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);

        self.disk_scheduler.disk_manager().deallocate_page(page_id)?;

        Ok(true)
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.shared.state.lock();

        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.shared.frames[frame_id.as_usize()].pin_count())
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.shared.state.lock().free_list.len()
    }

    /// Pins a page into a frame and returns its frame ID.
    /// On a hit the pin count is bumped with no disk I/O. On a miss a frame
    /// is acquired, the page is read from disk, and the mapping installed.
    fn fetch_page(&self, page_id: PageId) -> Result<Option<FrameId>> {
        let state = &mut *self.shared.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.shared.frames[frame_id.as_usize()];
            frame.pin();
            self.shared.replacer.record_access(frame_id);
            self.shared.replacer.set_evictable(frame_id, false);
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.acquire_frame(state)? else {
            return Ok(None);
        };

        let frame = &self.shared.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        self.disk_scheduler.schedule_read_sync(page_id, &mut data)?;

        frame.set_page_id(page_id);
        frame.write_image(&data);
        frame.set_dirty(false);
        frame.pin();

        state.page_table.insert(page_id, frame_id);

        self.shared.replacer.record_access(frame_id);
        self.shared.replacer.set_evictable(frame_id, false);

        Ok(Some(frame_id))
    }

    /// Acquires an empty frame: free list first, otherwise an eviction
    /// victim. A dirty victim is written back under its old page ID before
    /// the frame is handed out. Returns None when every frame is pinned.
    ///
    /// Postcondition: the frame is clean, unmapped, and absent from the
    /// free list.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.shared.replacer.evict() else {
            return Ok(None);
        };

        let frame = &self.shared.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.read_image(&mut data);
            self.disk_scheduler.schedule_write_sync(old_page_id, &data)?;
        }

        state.page_table.remove(&old_page_id);
        frame.reset();

        Ok(Some(frame_id))
    }
}
