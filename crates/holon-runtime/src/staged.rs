//! Staged collection with self-releasing cursors
//!
//! TigerStyle: Deferred mutation, scoped cursors, one notification per fold.
//!
//! A [`StagedCollection`] holds a *live* member list and two pending buffers.
//! Cursors iterate a snapshot of the live list. While any cursor is open every
//! mutation is buffered, and the release of the last open cursor is the event
//! that lets the buffers be folded into the live list.
//!
//! ```text
//!   add / remove / clear
//!          │
//!          ▼
//!   pending_add, pending_remove ──fold──► live: Arc<Vec<T>> ──► Cursor snapshot
//!                                  │
//!                                  └──► listeners (removed batch, added batch)
//! ```
//!
//! The live list is copy-on-write: a cursor holds an `Arc` of the list it was
//! opened on, so a fold never changes what an open cursor yields.

use holon_core::constants::{COLLECTION_CURSORS_OPEN_COUNT_MAX, COLLECTION_MEMBERS_COUNT_MAX};
use holon_core::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Ordering used to keep the live list sorted
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Observer of folded membership changes
///
/// Each fold delivers at most one `removed` batch followed by at most one
/// `added` batch. Listeners are called without the collection lock held, so
/// they may mutate the collection they observe.
pub trait StagedListener<T>: Send + Sync {
    /// Members that became visible
    fn on_added(&self, _added: &[T]) {}

    /// Members that stopped being visible
    fn on_removed(&self, _removed: &[T]) {}
}

/// Registration handle returned by [`StagedCollection::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// =============================================================================
// Options
// =============================================================================

/// Construction options for a [`StagedCollection`]
#[derive(Clone)]
pub struct StagedOptions<T> {
    /// Apply mutations immediately when no cursor is open, and fold when the
    /// last cursor is released. When false, only `synchronize` folds.
    pub auto_apply: bool,
    /// Keep the live list sorted (stable: new members go after equal ones)
    pub comparator: Option<Comparator<T>>,
    /// Upper bound on the number of members, pending additions included
    pub members_count_max: usize,
}

impl<T> Default for StagedOptions<T> {
    fn default() -> Self {
        Self {
            auto_apply: true,
            comparator: None,
            members_count_max: COLLECTION_MEMBERS_COUNT_MAX,
        }
    }
}

impl<T> fmt::Debug for StagedOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedOptions")
            .field("auto_apply", &self.auto_apply)
            .field("comparator", &self.comparator.is_some())
            .field("members_count_max", &self.members_count_max)
            .finish()
    }
}

impl<T> StagedOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_apply(mut self, auto_apply: bool) -> Self {
        self.auto_apply = auto_apply;
        self
    }

    pub fn with_comparator(
        mut self,
        comparator: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    pub fn with_members_count_max(mut self, members_count_max: usize) -> Self {
        self.members_count_max = members_count_max;
        self
    }
}

// =============================================================================
// State
// =============================================================================

struct State<T> {
    live: Arc<Vec<T>>,
    pending_add: Vec<T>,
    /// Only ever holds members of `live`
    pending_remove: Vec<T>,
    /// A clear is pending; folded before the buffers
    cleared: bool,
    cursors_open: HashSet<u64>,
    cursor_id_next: u64,
    listeners: Vec<(ListenerId, Arc<dyn StagedListener<T>>)>,
    listener_id_next: u64,
}

impl<T: Clone + PartialEq> State<T> {
    fn new() -> Self {
        Self {
            live: Arc::new(Vec::new()),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            cleared: false,
            cursors_open: HashSet::new(),
            cursor_id_next: 0,
            listeners: Vec::new(),
            listener_id_next: 0,
        }
    }

    /// Membership once every pending change is folded
    fn is_member(&self, item: &T) -> bool {
        if self.pending_add.contains(item) {
            return true;
        }
        if self.cleared || self.pending_remove.contains(item) {
            return false;
        }
        self.live.contains(item)
    }

    fn members_count(&self) -> usize {
        let kept = if self.cleared {
            0
        } else {
            self.live.len() - self.pending_remove.len()
        };
        kept + self.pending_add.len()
    }

    fn members(&self) -> Vec<T> {
        let mut members: Vec<T> = if self.cleared {
            Vec::new()
        } else {
            self.live
                .iter()
                .filter(|item| !self.pending_remove.contains(item))
                .cloned()
                .collect()
        };
        members.extend(self.pending_add.iter().cloned());
        members
    }

    fn has_pending(&self) -> bool {
        self.cleared || !self.pending_add.is_empty() || !self.pending_remove.is_empty()
    }

    fn insert_live(&mut self, item: T, comparator: Option<&Comparator<T>>) {
        let live = Arc::make_mut(&mut self.live);
        match comparator {
            Some(comparator) => {
                let position =
                    live.partition_point(|member| comparator(member, &item) != Ordering::Greater);
                live.insert(position, item);
            }
            None => live.push(item),
        }
    }

    fn remove_live(&mut self, item: &T) -> Option<T> {
        let position = self.live.iter().position(|member| member == item)?;
        Some(Arc::make_mut(&mut self.live).remove(position))
    }

    /// Fold the buffers into the live list: clear, then removals, then additions
    fn fold(&mut self, comparator: Option<&Comparator<T>>) -> (Vec<T>, Vec<T>) {
        let mut removed = Vec::new();
        if self.cleared {
            self.cleared = false;
            match Arc::try_unwrap(std::mem::take(&mut self.live)) {
                Ok(members) => removed.extend(members),
                Err(shared) => removed.extend(shared.iter().cloned()),
            }
        }

        for item in std::mem::take(&mut self.pending_remove) {
            if let Some(member) = self.remove_live(&item) {
                removed.push(member);
            }
        }

        let mut added = Vec::new();
        for item in std::mem::take(&mut self.pending_add) {
            if !self.live.contains(&item) {
                self.insert_live(item.clone(), comparator);
                added.push(item);
            }
        }

        debug_assert!(!self.has_pending());
        (added, removed)
    }

    fn listeners(&self) -> Vec<Arc<dyn StagedListener<T>>> {
        self.listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }
}

/// Changes to deliver once the lock is released
struct Delta<T> {
    added: Vec<T>,
    removed: Vec<T>,
    listeners: Vec<Arc<dyn StagedListener<T>>>,
}

impl<T> Delta<T> {
    fn notify(self) {
        if !self.removed.is_empty() {
            for listener in &self.listeners {
                listener.on_removed(&self.removed);
            }
        }
        if !self.added.is_empty() {
            for listener in &self.listeners {
                listener.on_added(&self.added);
            }
        }
    }
}

struct Shared<T> {
    options: StagedOptions<T>,
    state: Mutex<State<T>>,
}

// =============================================================================
// StagedCollection
// =============================================================================

/// Membership set whose mutations are buffered while it is being iterated
///
/// Cloning a `StagedCollection` clones the handle; both handles share members.
/// Read accessors (`len`, `get`, `contains`, ...) see the live list only.
pub struct StagedCollection<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for StagedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Default for StagedCollection<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StagedCollection<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a collection with default options
    pub fn new() -> Self {
        Self::with_options(StagedOptions::default())
    }

    /// Create a collection with explicit options
    pub fn with_options(options: StagedOptions<T>) -> Self {
        debug_assert!(options.members_count_max > 0);
        debug_assert!(options.members_count_max <= COLLECTION_MEMBERS_COUNT_MAX);

        Self {
            shared: Arc::new(Shared {
                options,
                state: Mutex::new(State::new()),
            }),
        }
    }

    pub fn options(&self) -> &StagedOptions<T> {
        &self.shared.options
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn comparator(&self) -> Option<&Comparator<T>> {
        self.shared.options.comparator.as_ref()
    }

    fn applies_now(&self, state: &State<T>) -> bool {
        let applies = self.shared.options.auto_apply && state.cursors_open.is_empty();
        debug_assert!(!applies || !state.has_pending());
        applies
    }

    /// Add a member
    ///
    /// Returns `Ok(false)` when the item is already a member (pending changes
    /// included). The change is buffered whenever a cursor is open.
    ///
    /// # Errors
    /// `CollectionCapacityExceeded` when the members limit is reached.
    pub fn add(&self, item: T) -> Result<bool> {
        let delta = {
            let mut state = self.lock();
            if state.is_member(&item) {
                return Ok(false);
            }

            // Re-adding a member whose removal is still pending cancels the removal
            if let Some(position) = state.pending_remove.iter().position(|m| *m == item) {
                state.pending_remove.remove(position);
                return Ok(true);
            }

            let count = state.members_count();
            let limit = self.shared.options.members_count_max;
            if count >= limit {
                return Err(Error::CollectionCapacityExceeded { count, limit });
            }

            if !self.applies_now(&state) {
                state.pending_add.push(item);
                return Ok(true);
            }

            state.insert_live(item.clone(), self.comparator());
            Delta {
                added: vec![item],
                removed: Vec::new(),
                listeners: state.listeners(),
            }
        };

        delta.notify();
        Ok(true)
    }

    /// Remove a member
    ///
    /// Returns false when the item is not a member (pending changes included).
    pub fn remove(&self, item: &T) -> bool {
        let delta = {
            let mut state = self.lock();
            if let Some(position) = state.pending_add.iter().position(|m| m == item) {
                state.pending_add.remove(position);
                return true;
            }

            if state.cleared || state.pending_remove.contains(item) || !state.live.contains(item)
            {
                return false;
            }

            if !self.applies_now(&state) {
                state.pending_remove.push(item.clone());
                return true;
            }

            match state.remove_live(item) {
                Some(member) => Delta {
                    added: Vec::new(),
                    removed: vec![member],
                    listeners: state.listeners(),
                },
                None => return false,
            }
        };

        delta.notify();
        true
    }

    /// Remove every member
    pub fn clear(&self) {
        let delta = {
            let mut state = self.lock();
            state.pending_add.clear();
            state.pending_remove.clear();
            state.cleared = true;

            if !self.shared.options.auto_apply || !state.cursors_open.is_empty() {
                return;
            }

            let (added, removed) = state.fold(self.comparator());
            Delta {
                added,
                removed,
                listeners: state.listeners(),
            }
        };

        delta.notify();
    }

    /// Remove every member for which `keep` returns false
    ///
    /// Returns the number of members removed.
    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let members = self.lock().members();
        members
            .iter()
            .filter(|member| !keep(member))
            .filter(|member| self.remove(member))
            .count()
    }

    /// Remove the live member at `index`
    pub fn remove_at(&self, index: usize) -> Option<T> {
        let item = self.get(index)?;
        if self.remove(&item) {
            Some(item)
        } else {
            None
        }
    }

    /// Open a cursor over the live members
    pub fn iter(&self) -> Cursor<T> {
        let mut state = self.lock();
        let id = state.cursor_id_next;
        state.cursor_id_next = state.cursor_id_next.wrapping_add(1);
        state.cursors_open.insert(id);

        debug_assert!(
            state.cursors_open.len() <= COLLECTION_CURSORS_OPEN_COUNT_MAX,
            "too many open cursors: {}",
            state.cursors_open.len()
        );

        Cursor {
            collection: self.clone(),
            snapshot: state.live.clone(),
            position: 0,
            last: None,
            id,
            released: false,
        }
    }

    /// Fold pending changes if no cursor is open
    ///
    /// Returns false when an open cursor prevented the fold.
    pub fn synchronize(&self) -> bool {
        self.apply_changes(false)
    }

    /// Fold pending changes
    ///
    /// With `force`, the fold happens even while cursors are open; those
    /// cursors are detached and keep iterating their own snapshot.
    pub fn apply_changes(&self, force: bool) -> bool {
        let delta = {
            let mut state = self.lock();
            if !state.cursors_open.is_empty() {
                if !force {
                    return false;
                }
                trace!(
                    detached = state.cursors_open.len(),
                    "Forced fold detaches open cursors"
                );
                state.cursors_open.clear();
            }

            if !state.has_pending() {
                return true;
            }

            let (added, removed) = state.fold(self.comparator());
            Delta {
                added,
                removed,
                listeners: state.listeners(),
            }
        };

        delta.notify();
        true
    }

    fn release(&self, cursor_id: u64) {
        let delta = {
            let mut state = self.lock();
            if !state.cursors_open.remove(&cursor_id) {
                return;
            }

            if !self.shared.options.auto_apply
                || !state.cursors_open.is_empty()
                || !state.has_pending()
            {
                return;
            }

            let (added, removed) = state.fold(self.comparator());
            Delta {
                added,
                removed,
                listeners: state.listeners(),
            }
        };

        delta.notify();
    }

    /// Whether buffered changes wait for a fold
    pub fn has_pending(&self) -> bool {
        self.lock().has_pending()
    }

    /// Number of buffered additions and removals
    pub fn pending_len(&self) -> usize {
        let state = self.lock();
        state.pending_add.len() + state.pending_remove.len()
    }

    /// Drop every buffered change, a pending clear included
    pub fn discard_pending(&self) {
        let mut state = self.lock();
        state.pending_add.clear();
        state.pending_remove.clear();
        state.cleared = false;
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.lock().live.get(index).cloned()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.lock().live.contains(item)
    }

    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().live.is_empty()
    }

    /// Copy of the live members
    pub fn to_vec(&self) -> Vec<T> {
        self.lock().live.as_ref().clone()
    }

    /// Shared snapshot of the live members
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.lock().live.clone()
    }

    pub fn open_cursor_count(&self) -> usize {
        self.lock().cursors_open.len()
    }

    /// Live members followed by the pending additions
    pub fn view(&self) -> StagedView<T> {
        let state = self.lock();
        StagedView {
            live: state.live.clone(),
            queued: state.pending_add.clone(),
        }
    }

    /// Live members the next fold will drop
    pub fn leaving(&self) -> Vec<T> {
        let state = self.lock();
        if state.cleared {
            return state.live.to_vec();
        }
        state
            .live
            .iter()
            .filter(|member| state.pending_remove.contains(member))
            .cloned()
            .collect()
    }

    pub fn add_listener(&self, listener: Arc<dyn StagedListener<T>>) -> ListenerId {
        let mut state = self.lock();
        let id = ListenerId(state.listener_id_next);
        state.listener_id_next += 1;
        state.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(listener_id, _)| *listener_id != id);
        state.listeners.len() != before
    }
}

impl<T> fmt::Debug for StagedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("StagedCollection")
            .field("live", &state.live.len())
            .field("pending_add", &state.pending_add.len())
            .field("pending_remove", &state.pending_remove.len())
            .field("cleared", &state.cleared)
            .field("cursors_open", &state.cursors_open.len())
            .finish()
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Scoped iteration handle over a [`StagedCollection`]
///
/// The cursor releases itself the first time `has_next` returns false or
/// `next` returns `None`, and on drop. Releasing is idempotent.
pub struct Cursor<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    collection: StagedCollection<T>,
    snapshot: Arc<Vec<T>>,
    position: usize,
    last: Option<T>,
    id: u64,
    released: bool,
}

impl<T> Cursor<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Whether another element follows; releases the cursor when not
    pub fn has_next(&mut self) -> bool {
        if self.position < self.snapshot.len() {
            return true;
        }
        self.release();
        false
    }

    /// Remove the element most recently returned by `next`
    ///
    /// Goes through the collection's buffered remove path.
    ///
    /// # Errors
    /// `CursorNoSuchElement` when no element was returned since the last
    /// `remove`, or when the collection no longer holds that element.
    pub fn remove(&mut self) -> Result<()> {
        let last = self
            .last
            .take()
            .ok_or_else(|| Error::no_such_element("cursor has not returned an element"))?;

        if self.collection.remove(&last) {
            Ok(())
        } else {
            Err(Error::no_such_element(
                "element is no longer held by the collection",
            ))
        }
    }

    /// Signal the collection that this cursor is done
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.collection.release(self.id);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Elements not yet returned
    pub fn remaining(&self) -> &[T] {
        &self.snapshot[self.position..]
    }

    /// Number of elements in the snapshot
    pub fn total_len(&self) -> usize {
        self.snapshot.len()
    }

    /// The whole snapshot, returned or not
    pub fn as_slice(&self) -> &[T] {
        &self.snapshot
    }
}

impl<T> Iterator for Cursor<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self.snapshot.get(self.position) {
            Some(item) => {
                let item = item.clone();
                self.position += 1;
                self.last = Some(item.clone());
                Some(item)
            }
            None => {
                self.release();
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.snapshot.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl<T> Drop for Cursor<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> fmt::Debug for Cursor<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("total_len", &self.snapshot.len())
            .field("released", &self.released)
            .finish()
    }
}

// =============================================================================
// Fused views
// =============================================================================

/// Read-only concatenation of two slices
///
/// Positions below `head.len()` resolve in `head`, the rest in `tail`.
#[derive(Debug)]
pub struct FusedView<'a, T> {
    head: &'a [T],
    tail: &'a [T],
}

impl<'a, T> Clone for FusedView<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for FusedView<'a, T> {}

impl<'a, T> FusedView<'a, T> {
    pub fn new(head: &'a [T], tail: &'a [T]) -> Self {
        Self { head, tail }
    }

    pub fn get(&self, index: usize) -> Option<&'a T> {
        if index < self.head.len() {
            self.head.get(index)
        } else {
            self.tail.get(index - self.head.len())
        }
    }

    pub fn len(&self) -> usize {
        self.head.len() + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.tail.is_empty()
    }

    pub fn iter(&self) -> std::iter::Chain<std::slice::Iter<'a, T>, std::slice::Iter<'a, T>> {
        self.head.iter().chain(self.tail.iter())
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.head.contains(item) || self.tail.contains(item)
    }
}

/// Owned snapshot: live members plus the additions still queued
#[derive(Debug, Clone)]
pub struct StagedView<T> {
    live: Arc<Vec<T>>,
    queued: Vec<T>,
}

impl<T> StagedView<T> {
    pub fn live(&self) -> &[T] {
        &self.live
    }

    pub fn queued(&self) -> &[T] {
        &self.queued
    }

    pub fn fused(&self) -> FusedView<'_, T> {
        FusedView::new(&self.live, &self.queued)
    }
}
