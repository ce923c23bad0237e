use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::common::{PageId, PoolError, Result, PAGE_SIZE};

use super::DiskManager;

/// A disk I/O job queued for the worker: direction, target page, the
/// caller's buffer, and the promise fulfilled on completion. Every job
/// carries a promise and every promise is awaited before the scheduling
/// call returns, so the buffer pointer stays valid for the job's lifetime.
pub(crate) struct DiskRequest {
    /// Whether this is a write (true) or read (false) request
    is_write: bool,
    /// The page ID to read/write
    page_id: PageId,
    /// The caller's buffer (PAGE_SIZE bytes): read target or write source
    data: *mut u8,
    /// Promise to signal completion
    promise: mpsc::Sender<bool>,
}

// Safety: DiskRequest is only used by the disk scheduler thread, and the
// submitting call blocks on the promise, keeping the data pointer valid
unsafe impl Send for DiskRequest {}

/// DiskScheduler manages a background worker thread that processes disk I/O
/// requests. Callers submit jobs through the synchronous wrappers, which
/// pair each job with a fresh one-shot promise and block until it is
/// fulfilled; a failed completion is surfaced as an error.
pub struct DiskScheduler {
    /// The disk manager for actual I/O operations
    disk_manager: Arc<DiskManager>,
    /// Channel sender for queuing requests
    request_sender: Sender<DiskRequest>,
    /// Flag to signal shutdown
    shutdown: Arc<AtomicBool>,
    /// Handle to the background worker thread
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a new DiskScheduler with the given DiskManager.
    /// Spawns a background worker thread to process requests.
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(128);
        let shutdown = Arc::new(AtomicBool::new(false));

        let dm_clone = Arc::clone(&disk_manager);
        let shutdown_clone = Arc::clone(&shutdown);

        let worker_handle = thread::spawn(move || {
            Self::run_worker(dm_clone, receiver, shutdown_clone);
        });

        Self {
            disk_manager,
            request_sender: sender,
            shutdown,
            worker_handle: Some(worker_handle),
        }
    }

    /// Schedules a read into `data` and waits for completion.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (promise, future) = mpsc::channel();
        self.submit(DiskRequest {
            is_write: false,
            page_id,
            data: data.as_mut_ptr(),
            promise,
        })?;

        Self::await_completion(future, page_id, "Read")
    }

    /// Schedules a write of `data` and waits for completion.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (promise, future) = mpsc::channel();
        // The worker only reads from the buffer for write jobs.
        self.submit(DiskRequest {
            is_write: true,
            page_id,
            data: data.as_ptr() as *mut u8,
            promise,
        })?;

        Self::await_completion(future, page_id, "Write")
    }

    /// Hands a job to the background worker.
    fn submit(&self, request: DiskRequest) -> Result<()> {
        self.request_sender
            .send(request)
            .map_err(|e| PoolError::DiskScheduler(format!("Failed to schedule request: {}", e)))
    }

    /// Blocks on a job's promise and maps a failed completion to an error.
    fn await_completion(future: mpsc::Receiver<bool>, page_id: PageId, op: &str) -> Result<()> {
        let success = future.recv().map_err(|e| {
            PoolError::DiskScheduler(format!("Lost completion signal for {}: {}", page_id, e))
        })?;

        if success {
            Ok(())
        } else {
            Err(PoolError::DiskScheduler(format!(
                "{} of {} failed",
                op, page_id
            )))
        }
    }

    /// The background worker thread function.
    /// Processes requests from the queue until shutdown is signaled.
    fn run_worker(
        disk_manager: Arc<DiskManager>,
        receiver: Receiver<DiskRequest>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                // Drain remaining requests before exiting
                while let Ok(request) = receiver.try_recv() {
                    Self::process_request(&disk_manager, request);
                }
                break;
            }

            match receiver.recv_timeout(std::time::Duration::from_millis(100)) {
                Ok(request) => {
                    Self::process_request(&disk_manager, request);
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    // Continue loop, check shutdown flag
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    break;
                }
            }
        }
    }

    /// Processes a single disk request and fulfills its promise.
    fn process_request(disk_manager: &DiskManager, request: DiskRequest) {
        let success = if request.is_write {
            // Safety: the submitting call blocks until the promise is
            // fulfilled, so the pointer is valid for PAGE_SIZE bytes
            let data = unsafe { std::slice::from_raw_parts(request.data, PAGE_SIZE) };
            disk_manager.write_page(request.page_id, data).is_ok()
        } else {
            // Safety: as above
            let data = unsafe { std::slice::from_raw_parts_mut(request.data, PAGE_SIZE) };
            disk_manager.read_page(request.page_id, data).is_ok()
        };

        // A receiver gone early means the caller panicked; nothing to do.
        let _ = request.promise.send(success);
    }

    /// Returns a reference to the underlying DiskManager.
    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}
