//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;

use pagepool::buffer::BufferPoolManager;
use pagepool::common::{PageId, INVALID_PAGE_ID};
use pagepool::storage::disk::DiskManager;
use rand::Rng;
use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = BufferPoolManager::new(pool_size, 2, dm);
    (bpm, temp_file)
}

#[test]
fn test_buffer_pool_basic_operations() {
    let (bpm, _temp) = create_bpm(10);

    let page_id = bpm.new_page().unwrap().unwrap().page_id();
    assert_eq!(page_id, PageId::new(0));

    // Write data to the page
    {
        let mut guard = bpm.fetch_page_write(page_id).unwrap().unwrap();
        guard.data_mut()[0] = 0xDE;
        guard.data_mut()[1] = 0xAD;
        guard.data_mut()[2] = 0xBE;
        guard.data_mut()[3] = 0xEF;
    }

    // Read data back
    {
        let guard = bpm.fetch_page_read(page_id).unwrap().unwrap();
        assert_eq!(guard.data()[0], 0xDE);
        assert_eq!(guard.data()[1], 0xAD);
        assert_eq!(guard.data()[2], 0xBE);
        assert_eq!(guard.data()[3], 0xEF);
    }
}

#[test]
fn test_buffer_pool_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_id;
    let test_data = b"Persistence test data";

    // Write data
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        page_id = bpm.new_page().unwrap().unwrap().page_id();

        {
            let mut guard = bpm.fetch_page_write(page_id).unwrap().unwrap();
            guard.data_mut()[..test_data.len()].copy_from_slice(test_data);
        }

        bpm.flush_page(page_id).unwrap();
    }

    // Read data back with a new BPM
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        let guard = bpm.fetch_page_read(page_id).unwrap().unwrap();
        assert_eq!(&guard.data()[..test_data.len()], test_data);
    }
}

#[test]
fn test_buffer_pool_eviction() {
    let (bpm, _temp) = create_bpm(3);

    // Fill the buffer pool
    let mut page_ids = Vec::new();
    for i in 0..3 {
        let pid = bpm.new_page().unwrap().unwrap().page_id();
        {
            let mut guard = bpm.fetch_page_write(pid).unwrap().unwrap();
            guard.data_mut()[0] = i as u8;
        }
        page_ids.push(pid);
    }

    // All pages are unpinned now
    for &pid in &page_ids {
        assert_eq!(bpm.get_pin_count(pid), Some(0));
    }

    // Creating a new page evicts one of them, writing it back
    let new_pid = bpm.new_page().unwrap().unwrap().page_id();
    assert_eq!(new_pid, PageId::new(3));

    // Every original page is still readable; the victim comes from disk
    for (i, &pid) in page_ids.iter().enumerate() {
        let guard = bpm.fetch_page_read(pid).unwrap().unwrap();
        assert_eq!(guard.data()[0], i as u8);
    }
}

#[test]
fn test_buffer_pool_pin_prevents_eviction() {
    let (bpm, _temp) = create_bpm(2);

    let g1 = bpm.new_page().unwrap().unwrap();
    let g2 = bpm.new_page().unwrap().unwrap();

    // Both frames are pinned, so allocation finds no frame
    assert!(bpm.new_page().unwrap().is_none());

    // After one pin is released, allocation succeeds again
    drop(g1);
    assert!(bpm.new_page().unwrap().is_some());

    drop(g2);
}

#[test]
fn test_buffer_pool_delete_page() {
    let (bpm, _temp) = create_bpm(10);

    let pid = bpm.new_page().unwrap().unwrap().page_id();

    {
        let mut guard = bpm.fetch_page_write(pid).unwrap().unwrap();
        guard.data_mut()[0] = 42;
    }

    assert!(bpm.delete_page(pid).unwrap());

    // The page is no longer resident
    assert_eq!(bpm.get_pin_count(pid), None);
}

#[test]
fn test_buffer_pool_cannot_delete_pinned_page() {
    let (bpm, _temp) = create_bpm(10);

    let pid = bpm.new_page().unwrap().unwrap().page_id();
    let _guard = bpm.fetch_page_read(pid).unwrap().unwrap();

    assert!(!bpm.delete_page(pid).unwrap());
    assert_eq!(bpm.get_pin_count(pid), Some(1));
}

#[test]
fn test_buffer_pool_unpin_semantics() {
    let (bpm, _temp) = create_bpm(10);

    let pid = bpm.new_page().unwrap().unwrap().page_id();

    assert!(!bpm.unpin_page(INVALID_PAGE_ID, false));
    assert!(!bpm.unpin_page(PageId::new(17), false));
    // Already at pin count zero
    assert!(!bpm.unpin_page(pid, false));
}

#[test]
fn test_buffer_pool_flush_all() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_ids;

    // Write data to multiple pages
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        page_ids = (0..5)
            .map(|i| {
                let pid = bpm.new_page().unwrap().unwrap().page_id();
                {
                    let mut guard = bpm.fetch_page_write(pid).unwrap().unwrap();
                    guard.data_mut()[0] = i as u8;
                }
                pid
            })
            .collect::<Vec<_>>();

        bpm.flush_all_pages().unwrap();
    }

    // Read back with a new BPM
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        for (i, &pid) in page_ids.iter().enumerate() {
            let guard = bpm.fetch_page_read(pid).unwrap().unwrap();
            assert_eq!(guard.data()[0], i as u8);
        }
    }
}

#[test]
fn test_buffer_pool_concurrent_access() {
    let (bpm, _temp) = create_bpm(10);
    let bpm = Arc::new(bpm);

    let page_id = bpm.new_page().unwrap().unwrap().page_id();

    // Spawn multiple reader threads
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for _ in 0..100 {
                    let guard = bpm.fetch_page_read(page_id).unwrap().unwrap();
                    let _ = guard.data()[0]; // Just read
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(bpm.get_pin_count(page_id), Some(0));
}

#[test]
fn test_buffer_pool_large_workload() {
    let (bpm, _temp) = create_bpm(5); // Small pool to force evictions

    // Create many pages
    let page_ids: Vec<_> = (0..20)
        .map(|_| bpm.new_page().unwrap().unwrap().page_id())
        .collect();

    // Write each page's own ID into its bytes
    for &pid in &page_ids {
        let mut guard = bpm.fetch_page_write(pid).unwrap().unwrap();
        let id_bytes = pid.as_u32().to_le_bytes();
        guard.data_mut()[..4].copy_from_slice(&id_bytes);
    }

    // Read from each page and verify
    for &pid in &page_ids {
        let guard = bpm.fetch_page_read(pid).unwrap().unwrap();
        let id_bytes: [u8; 4] = guard.data()[..4].try_into().unwrap();
        assert_eq!(u32::from_le_bytes(id_bytes), pid.as_u32());
    }
}

#[test]
fn test_buffer_pool_random_workload() {
    let (bpm, _temp) = create_bpm(4); // Small pool to force evictions

    let page_ids: Vec<_> = (0..12)
        .map(|_| bpm.new_page().unwrap().unwrap().page_id())
        .collect();
    let mut expected = vec![0u8; page_ids.len()];

    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let i = rng.gen_range(0..page_ids.len());
        if rng.gen_bool(0.5) {
            let mut guard = bpm.fetch_page_write(page_ids[i]).unwrap().unwrap();
            let value = rng.gen::<u8>();
            guard.data_mut()[0] = value;
            expected[i] = value;
        } else {
            let guard = bpm.fetch_page_read(page_ids[i]).unwrap().unwrap();
            assert_eq!(guard.data()[0], expected[i]);
        }
    }

    for (i, &pid) in page_ids.iter().enumerate() {
        let guard = bpm.fetch_page_read(pid).unwrap().unwrap();
        assert_eq!(guard.data()[0], expected[i]);
    }
}
