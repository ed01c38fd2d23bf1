//! Shared work queues, one per worker duty.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

use crossbeam::queue::SegQueue;
use glam::Vec3;
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use parking_lot::Mutex;
use strata_core::math::Frustum;

use crate::chunk::column_bounds;
use crate::work::{RemeshKey, WorkItem};

/// The three independent kinds of background work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Duty {
    Generate,
    Remesh,
    Unload,
}

impl Duty {
    pub const ALL: [Self; 3] = [Self::Generate, Self::Remesh, Self::Unload];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Remesh => "remesh",
            Self::Unload => "unload",
        }
    }
}

impl fmt::Display for Duty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Viewer state used to order pending generation.
#[derive(Clone, Copy, Debug)]
pub struct LoadOrdering {
    /// Viewer position in world units.
    pub position: Vec3,
    pub frustum: Option<Frustum>,
    /// World units per block.
    pub block_scale: f32,
    /// Column height assumed for chunks that have no blocks yet.
    pub height_hint: f32,
}

impl LoadOrdering {
    /// Sort key: chunks in view first, then nearest to the viewer.
    fn key(&self, item: &WorkItem) -> (bool, f32) {
        let bounds = column_bounds(item.coord(), self.block_scale, self.height_hint);
        let visible = self.frustum.map_or(true, |frustum| frustum.test_aabb(&bounds));
        let center = bounds.center();
        let distance = Vec3::new(center.x, self.position.y, center.z).distance(self.position);
        (visible, distance)
    }

    /// Ordering where the preferred item compares as `Less`.
    pub fn compare(&self, a: &WorkItem, b: &WorkItem) -> Ordering {
        let (a_visible, a_distance) = self.key(a);
        let (b_visible, b_distance) = self.key(b);
        b_visible
            .cmp(&a_visible)
            .then_with(|| a_distance.total_cmp(&b_distance))
    }
}

struct LoadState {
    /// Stored worst-first so the best item pops off the end.
    items: Vec<WorkItem>,
    ordering: Option<LoadOrdering>,
    sorted: bool,
}

/// Pending chunk generation, re-sorted by viewer priority before dequeueing.
pub struct LoadQueue {
    state: Mutex<LoadState>,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoadState {
                items: Vec::new(),
                ordering: None,
                sorted: true,
            }),
        }
    }

    pub fn push(&self, item: WorkItem) {
        let mut state = self.state.lock();
        state.items.push(item);
        state.sorted = false;
    }

    /// Replace the viewer snapshot; the next pop re-sorts.
    pub fn set_ordering(&self, ordering: LoadOrdering) {
        let mut state = self.state.lock();
        state.ordering = Some(ordering);
        state.sorted = false;
    }

    /// Highest-priority item.
    pub fn pop(&self) -> Option<WorkItem> {
        let mut state = self.state.lock();
        if !state.sorted {
            if let Some(ordering) = state.ordering {
                state.items.sort_by(|a, b| ordering.compare(b, a));
            }
            state.sorted = true;
        }
        state.items.pop()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }
}

impl Default for LoadQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// FIFO remesh queue holding at most one pending item per chunk or segment.
///
/// A push for a key that is already pending is refused when the pending item
/// covers it. Otherwise (the pending item holds a handle to a chunk that has
/// since been replaced) the new item takes over the pending slot.
pub struct RemeshQueue {
    state: Mutex<RemeshState>,
}

#[derive(Default)]
struct RemeshState {
    order: VecDeque<RemeshKey>,
    pending: HashMap<RemeshKey, WorkItem>,
}

impl RemeshQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RemeshState::default()),
        }
    }

    /// Enqueue `item`; returns `false` if a pending item already does the same work.
    ///
    /// Items that are not remesh work are refused.
    pub fn push(&self, item: WorkItem) -> bool {
        let Some(key) = item.remesh_key() else {
            return false;
        };

        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.pending.entry(key) {
            Entry::Occupied(mut slot) => {
                if slot.get().covers(&item) {
                    return false;
                }
                *slot.get_mut() = item;
            }
            Entry::Vacant(slot) => {
                slot.insert(item);
                state.order.push_back(key);
            }
        }
        true
    }

    pub fn pop(&self) -> Option<WorkItem> {
        let mut state = self.state.lock();
        while let Some(key) = state.order.pop_front() {
            if let Some(item) = state.pending.remove(&key) {
                return Some(item);
            }
        }
        None
    }

    pub fn contains(&self, key: RemeshKey) -> bool {
        self.state.lock().pending.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }
}

impl Default for RemeshQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-free FIFO of pending unloads.
///
/// Duplicates are prevented upstream by the chunk state transition into
/// `QueuedForUnload`.
#[derive(Default)]
pub struct UnloadQueue {
    items: SegQueue<WorkItem>,
}

impl UnloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: WorkItem) {
        self.items.push(item);
    }

    pub fn pop(&self) -> Option<WorkItem> {
        self.items.pop()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The queue set shared by the world, the streaming controller and the workers.
#[derive(Default)]
pub struct WorkQueues {
    pub load: LoadQueue,
    pub remesh: RemeshQueue,
    pub unload: UnloadQueue,
}

impl WorkQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next item for `duty`.
    pub fn pop(&self, duty: Duty) -> Option<WorkItem> {
        match duty {
            Duty::Generate => self.load.pop(),
            Duty::Remesh => self.remesh.pop(),
            Duty::Unload => self.unload.pop(),
        }
    }

    /// Pending items for `duty`.
    pub fn len(&self, duty: Duty) -> usize {
        match duty {
            Duty::Generate => self.load.len(),
            Duty::Remesh => self.remesh.len(),
            Duty::Unload => self.unload.len(),
        }
    }

    /// Whether every queue is drained.
    pub fn is_idle(&self) -> bool {
        self.load.is_empty() && self.remesh.is_empty() && self.unload.is_empty()
    }
}
