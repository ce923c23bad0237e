use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::PoolShared;
use super::FrameHeader;

struct GuardInner {
    /// Shared pool state, used to unpin the frame on release
    pool: Arc<PoolShared>,
    /// The guarded frame (kept alive for the guard's lifetime)
    frame: Arc<FrameHeader>,
    /// The page ID being guarded
    page_id: PageId,
}

/// Scoped pin on a buffer frame.
///
/// A live guard contributes exactly one to the frame's pin count and unpins
/// it when dropped. Guards are move-only; releasing twice is a no-op. Page
/// bytes are only reachable by upgrading to a latched read or write guard.
pub struct PageGuard {
    inner: Option<GuardInner>,
}

impl PageGuard {
    pub(crate) fn new(pool: Arc<PoolShared>, frame: Arc<FrameHeader>, page_id: PageId) -> Self {
        Self {
            inner: Some(GuardInner {
                pool,
                frame,
                page_id,
            }),
        }
    }

    /// Returns the page ID this guard pins.
    pub fn page_id(&self) -> PageId {
        self.inner.as_ref().expect("page guard already released").page_id
    }

    /// Upgrades to a read guard, acquiring the frame's reader latch.
    /// The latch is taken before ownership moves, so the pin is never
    /// released while the page sits un-latched.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        let data_guard = {
            let inner = self.inner.as_ref().expect("page guard already released");
            // The frame is kept alive by the Arc inside the guard, so the
            // latch may safely outlive the borrow of `inner`.
            let guard: RwLockReadGuard<'static, [u8; PAGE_SIZE]> =
                unsafe { std::mem::transmute(inner.frame.latch_shared()) };
            guard
        };

        ReadPageGuard {
            data_guard: Some(data_guard),
            base: PageGuard {
                inner: self.inner.take(),
            },
        }
    }

    /// Upgrades to a write guard, acquiring the frame's writer latch.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        let data_guard = {
            let inner = self.inner.as_ref().expect("page guard already released");
            // Same lifetime argument as in upgrade_read.
            let guard: RwLockWriteGuard<'static, [u8; PAGE_SIZE]> =
                unsafe { std::mem::transmute(inner.frame.latch_exclusive()) };
            guard
        };

        WritePageGuard {
            data_guard: Some(data_guard),
            base: PageGuard {
                inner: self.inner.take(),
            },
        }
    }

    /// Drops this guard, releasing the pin.
    pub fn drop_guard(self) {
        drop(self);
    }

    /// Marks the underlying frame dirty. The frame flag is the single
    /// source of truth; the guard itself carries no dirty state.
    fn mark_dirty(&self) {
        if let Some(inner) = &self.inner {
            inner.frame.set_dirty(true);
        }
    }

    fn release(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.pool.unpin(inner.page_id, false);
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// RAII guard for read-only access to a page.
/// Holds the frame's reader latch; on drop the latch is released first and
/// the page is unpinned after.
pub struct ReadPageGuard {
    /// Reader latch on the page bytes
    data_guard: Option<RwLockReadGuard<'static, [u8; PAGE_SIZE]>>,
    base: PageGuard,
}

impl ReadPageGuard {
    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.base.page_id()
    }

    /// Returns a reference to the page data.
    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Drops this guard, releasing the latch and the pin.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Release the reader latch before unpinning.
        self.data_guard.take();
        self.base.release();
    }
}

/// RAII guard for read-write access to a page.
/// Holds the frame's writer latch; mutable access marks the frame dirty.
pub struct WritePageGuard {
    /// Writer latch on the page bytes
    data_guard: Option<RwLockWriteGuard<'static, [u8; PAGE_SIZE]>>,
    base: PageGuard,
}

impl WritePageGuard {
    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.base.page_id()
    }

    /// Returns a reference to the page data.
    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Returns a mutable reference to the page data and marks the frame
    /// dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.base.mark_dirty();
        &mut self.data_guard.as_mut().unwrap()[..]
    }

    /// Drops this guard, releasing the latch and the pin.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Release the writer latch before unpinning.
        self.data_guard.take();
        self.base.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FrameId;

    fn test_pool(pool_size: usize) -> Arc<PoolShared> {
        Arc::new(PoolShared::new(pool_size, 2))
    }

    /// Installs a page into frame 0 with one pin, mirroring a fetch.
    fn install_pinned(pool: &Arc<PoolShared>, page_id: PageId) -> Arc<FrameHeader> {
        let frame_id = FrameId::new(0);
        let frame = Arc::clone(&pool.frames[0]);
        frame.set_page_id(page_id);
        frame.pin();
        pool.state.lock().page_table.insert(page_id, frame_id);
        pool.replacer.record_access(frame_id);
        pool.replacer.set_evictable(frame_id, false);
        frame
    }

    #[test]
    fn test_basic_guard_unpins_on_drop() {
        let pool = test_pool(1);
        let page_id = PageId::new(7);
        let frame = install_pinned(&pool, page_id);

        let guard = PageGuard::new(Arc::clone(&pool), Arc::clone(&frame), page_id);
        assert_eq!(guard.page_id(), page_id);
        assert_eq!(frame.pin_count(), 1);

        drop(guard);
        assert_eq!(frame.pin_count(), 0);
        // Pin reached zero, so the frame became evictable.
        assert_eq!(pool.replacer.size(), 1);
    }

    #[test]
    fn test_guard_move_transfers_ownership() {
        let pool = test_pool(1);
        let page_id = PageId::new(3);
        let frame = install_pinned(&pool, page_id);

        let guard = PageGuard::new(Arc::clone(&pool), Arc::clone(&frame), page_id);
        let moved = guard;
        assert_eq!(frame.pin_count(), 1);

        moved.drop_guard();
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_upgrade_read_releases_latch_then_unpins() {
        let pool = test_pool(1);
        let page_id = PageId::new(1);
        let frame = install_pinned(&pool, page_id);

        let mut image = [0u8; PAGE_SIZE];
        image[0] = 42;
        frame.write_image(&image);

        let read_guard = PageGuard::new(Arc::clone(&pool), Arc::clone(&frame), page_id)
            .upgrade_read();
        assert_eq!(read_guard.data()[0], 42);
        assert_eq!(read_guard.page_id(), page_id);
        assert_eq!(frame.pin_count(), 1);

        drop(read_guard);
        assert_eq!(frame.pin_count(), 0);
        // Latch must be free again.
        assert!(frame.try_latch_exclusive().is_some());
    }

    #[test]
    fn test_upgrade_write_marks_frame_dirty() {
        let pool = test_pool(1);
        let page_id = PageId::new(2);
        let frame = install_pinned(&pool, page_id);

        let mut write_guard = PageGuard::new(Arc::clone(&pool), Arc::clone(&frame), page_id)
            .upgrade_write();
        assert!(!frame.is_dirty());

        write_guard.data_mut()[0] = 99;
        assert!(frame.is_dirty());

        drop(write_guard);
        assert_eq!(frame.pin_count(), 0);
        assert!(frame.is_dirty());

        let mut image = [0u8; PAGE_SIZE];
        frame.read_image(&mut image);
        assert_eq!(image[0], 99);
    }

    #[test]
    fn test_read_guard_without_write_access_stays_clean() {
        let pool = test_pool(1);
        let page_id = PageId::new(4);
        let frame = install_pinned(&pool, page_id);

        let read_guard = PageGuard::new(Arc::clone(&pool), Arc::clone(&frame), page_id)
            .upgrade_read();
        let _ = read_guard.data()[0];
        drop(read_guard);

        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_concurrent_readers_share_latch() {
        let pool = test_pool(1);
        let page_id = PageId::new(5);
        let frame = install_pinned(&pool, page_id);
        frame.pin(); // second fetch

        let g1 = PageGuard::new(Arc::clone(&pool), Arc::clone(&frame), page_id).upgrade_read();
        let g2 = PageGuard::new(Arc::clone(&pool), Arc::clone(&frame), page_id).upgrade_read();

        assert_eq!(frame.pin_count(), 2);
        drop(g1);
        assert_eq!(frame.pin_count(), 1);
        drop(g2);
        assert_eq!(frame.pin_count(), 0);
    }
}
