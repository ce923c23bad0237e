use std::collections::{BTreeMap, HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Access history for a single tracked frame.
///
/// The history holds the last min(k, access_count) timestamps, oldest at the
/// front. A node lives in the history ordering while it has fewer than k
/// accesses and moves to the cache ordering on the access that reaches k;
/// there is no reverse transition.
#[derive(Debug)]
struct LruKNode {
    /// Bounded window of access timestamps (oldest at front, at most k)
    history: VecDeque<Timestamp>,
    /// Total number of recorded accesses
    access_count: usize,
    /// Whether this frame is currently a legal eviction victim
    is_evictable: bool,
}

impl LruKNode {
    fn new(timestamp: Timestamp) -> Self {
        let mut history = VecDeque::new();
        history.push_back(timestamp);
        Self {
            history,
            access_count: 1,
            is_evictable: false,
        }
    }
}

#[derive(Default)]
struct ReplacerState {
    /// Logical clock, advanced once per recorded access
    current_timestamp: Timestamp,
    /// Number of tracked frames currently marked evictable
    evictable_count: usize,
    /// All tracked frames, value-owned
    node_store: HashMap<FrameId, LruKNode>,
    /// Frames with < k accesses, keyed by their most recent timestamp
    history_order: BTreeMap<Timestamp, FrameId>,
    /// Frames with >= k accesses, keyed by their k-th most recent timestamp
    cache_order: BTreeMap<Timestamp, FrameId>,
}

/// LRU-K replacement policy.
///
/// Evicts the evictable frame with the largest backward k-distance: the
/// difference between the current timestamp and the timestamp of the k-th
/// previous access. A frame with fewer than k recorded accesses has +inf
/// backward k-distance; among those, the frame with the earliest recent
/// access (classical LRU) is the victim. Scanning the history ordering
/// before the cache ordering yields exactly this priority.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Maximum number of frames the replacer can track
    max_frames: usize,
    /// Replacer state under a single mutex; the public API is thread-safe
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer with the given k value and maximum
    /// frame count.
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k > 0, "LRU-K requires k > 0");
        Self {
            k,
            max_frames,
            state: Mutex::new(ReplacerState::default()),
        }
    }

    /// Records that the given frame was accessed, stamping the event with a
    /// fresh logical timestamp. Untracked frames become tracked and start
    /// out non-evictable.
    ///
    /// Panics if `frame_id` is outside `[0, max_frames)`.
    pub fn record_access(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_usize() < self.max_frames,
            "{} out of range for replacer tracking {} frames",
            frame_id,
            self.max_frames
        );

        let state = &mut *self.state.lock();
        state.current_timestamp += 1;
        let now = state.current_timestamp;

        if !state.node_store.contains_key(&frame_id) {
            state.node_store.insert(frame_id, LruKNode::new(now));
            // With k == 1 a single access already fills the window.
            if self.k == 1 {
                state.cache_order.insert(now, frame_id);
            } else {
                state.history_order.insert(now, frame_id);
            }
            return;
        }

        let Some(node) = state.node_store.get_mut(&frame_id) else {
            return;
        };

        if node.access_count < self.k {
            // Still in the history ordering, keyed by its latest timestamp.
            if let Some(&latest) = node.history.back() {
                state.history_order.remove(&latest);
            }
            node.history.push_back(now);
            node.access_count += 1;

            if node.access_count == self.k {
                // K-th access: graduate to the cache ordering, keyed by the
                // oldest timestamp of the stored window.
                if let Some(&kth_oldest) = node.history.front() {
                    state.cache_order.insert(kth_oldest, frame_id);
                }
            } else {
                state.history_order.insert(now, frame_id);
            }
        } else {
            // Already in the cache ordering; re-key by the new k-th-oldest.
            if let Some(&old_kth) = node.history.front() {
                state.cache_order.remove(&old_kth);
            }
            node.history.push_back(now);
            if node.history.len() > self.k {
                node.history.pop_front();
            }
            node.access_count += 1;
            if let Some(&new_kth) = node.history.front() {
                state.cache_order.insert(new_kth, frame_id);
            }
        }
    }

    /// Evicts the frame with the largest backward k-distance.
    /// Returns None if there are no evictable frames.
    pub fn evict(&self) -> Option<FrameId> {
        let state = &mut *self.state.lock();

        if state.evictable_count == 0 {
            return None;
        }

        // Any frame with < k accesses (+inf distance) beats any frame with a
        // finite distance, so the history ordering is scanned first. Within
        // each ordering the smallest key wins.
        let mut victim: Option<(Timestamp, FrameId, bool)> = None;

        for (&key, &frame_id) in &state.history_order {
            if state
                .node_store
                .get(&frame_id)
                .is_some_and(|n| n.is_evictable)
            {
                victim = Some((key, frame_id, false));
                break;
            }
        }

        if victim.is_none() {
            for (&key, &frame_id) in &state.cache_order {
                if state
                    .node_store
                    .get(&frame_id)
                    .is_some_and(|n| n.is_evictable)
                {
                    victim = Some((key, frame_id, true));
                    break;
                }
            }
        }

        let (key, frame_id, cached) = victim?;
        if cached {
            state.cache_order.remove(&key);
        } else {
            state.history_order.remove(&key);
        }
        state.node_store.remove(&frame_id);
        state.evictable_count -= 1;

        Some(frame_id)
    }

    /// Sets whether a frame is evictable. No-op for untracked frames.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        let state = &mut *self.state.lock();

        let Some(node) = state.node_store.get_mut(&frame_id) else {
            return;
        };

        if node.is_evictable != is_evictable {
            node.is_evictable = is_evictable;
            if is_evictable {
                state.evictable_count += 1;
            } else {
                state.evictable_count -= 1;
            }
        }
    }

    /// Removes a frame from the replacer entirely, along with its access
    /// history. No-op for untracked frames. The caller guarantees the frame
    /// is not pinned.
    pub fn remove(&self, frame_id: FrameId) {
        let state = &mut *self.state.lock();

        let Some(node) = state.node_store.remove(&frame_id) else {
            return;
        };

        if node.access_count < self.k {
            if let Some(&latest) = node.history.back() {
                state.history_order.remove(&latest);
            }
        } else if let Some(&kth_oldest) = node.history.front() {
            state.cache_order.remove(&kth_oldest);
        }

        if node.is_evictable {
            state.evictable_count -= 1;
        }
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().evictable_count
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}
