use std::sync::Arc;

use pagepool::buffer::BufferPoolManager;
use pagepool::common::{DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K};
use pagepool::storage::disk::DiskManager;

fn main() {
    println!("Pagepool - a page buffer cache in Rust");
    println!("=======================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let bpm = BufferPoolManager::new(DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K, disk_manager);
    println!(
        "Created buffer pool manager with {} frames\n",
        bpm.pool_size()
    );

    // Allocate a new page and write a message into it
    let page_id = {
        let guard = bpm
            .new_page()
            .expect("Failed to allocate page")
            .expect("No frame available");
        let page_id = guard.page_id();
        println!("Allocated new page: {}", page_id);

        let mut guard = guard.upgrade_write();
        let message = b"Hello from the page buffer cache!";
        guard.data_mut()[..message.len()].copy_from_slice(message);
        println!("Wrote {} bytes", message.len());
        page_id
    };

    bpm.flush_page(page_id).expect("Failed to flush page");
    println!("Flushed page to disk");

    // Read the data back through a read guard
    {
        let guard = bpm
            .fetch_page_read(page_id)
            .expect("Failed to fetch page")
            .expect("No frame available");

        let text: Vec<u8> = guard.data().iter().copied().take_while(|&b| b != 0).collect();
        println!("Read back: {:?}", String::from_utf8_lossy(&text));
    }

    println!("Pin count: {:?}", bpm.get_pin_count(page_id));
    println!("Free frames: {}", bpm.free_frame_count());

    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}
