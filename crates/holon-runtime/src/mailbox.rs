//! Mailboxes
//!
//! TigerStyle: Buffered until synchronized, ordered by comparator, bounded depth.
//!
//! A mailbox is a per-entity inbound queue. Buffered mailboxes stage every
//! incoming message and only fold them into the ordered live queue when
//! [`BufferedMailbox::synchronize`] runs, normally once per tick before the
//! entity reads its queue. Live mailboxes insert straight into the ordered
//! queue.
//!
//! ```text
//!   add ──► buffer ──synchronize──► live queue (comparator order) ──► get/remove
//! ```
//!
//! Reading an empty queue, or one where nothing matches, yields `None`.
//! Running out of messages is the steady state, not a fault.

use crate::envelope::{Message, MessageId};
use crate::selector::Selector;
use holon_core::address::Address;
use holon_core::config::{MailboxConfig, MailboxKind};
use holon_core::constants::{MAILBOX_DEPTH_MAX, MAILBOX_POLL_INTERVAL_MS_DEFAULT};
use holon_core::error::{Error, Result};
use holon_core::io::TimeProvider;
use holon_core::metrics;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Total order over messages
pub type MessageComparator<M> = Arc<dyn Fn(&M, &M) -> Ordering + Send + Sync>;

/// Ascending creation time; equal timestamps keep their arrival order
pub fn by_creation_time<M: Message>() -> MessageComparator<M> {
    Arc::new(|a: &M, b: &M| a.created_at_ms().cmp(&b.created_at_ms()))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_depth(depth: usize, depth_max: usize) -> Result<()> {
    if depth >= depth_max {
        metrics::record_mailbox_rejected();
        return Err(Error::MailboxFull {
            depth,
            max: depth_max,
        });
    }
    Ok(())
}

// ============================================================================
// Live Queue
// ============================================================================

/// Messages in comparator order
pub struct LiveQueue<M> {
    messages: Vec<M>,
    comparator: MessageComparator<M>,
}

impl<M: Message> LiveQueue<M> {
    pub fn new(comparator: MessageComparator<M>) -> Self {
        Self {
            messages: Vec::new(),
            comparator,
        }
    }

    /// Insert after every message that does not sort after it
    ///
    /// Returns the index the message landed at.
    pub fn insert(&mut self, message: M) -> usize {
        let comparator = &self.comparator;
        let index = self
            .messages
            .partition_point(|existing| comparator(existing, &message) != Ordering::Greater);
        self.messages.insert(index, message);

        debug_assert!(self.is_sorted());
        index
    }

    fn is_sorted(&self) -> bool {
        self.messages
            .windows(2)
            .all(|pair| (self.comparator)(&pair[0], &pair[1]) != Ordering::Greater)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&M> {
        self.messages.get(index)
    }

    pub fn first(&self) -> Option<&M> {
        self.messages.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, M> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[M] {
        &self.messages
    }

    /// Index of the first message accepted by `selector`
    pub fn position(&self, selector: &dyn Selector<M>) -> Option<usize> {
        self.messages.iter().position(|m| selector.matches(m))
    }

    pub fn position_of(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id() == id)
    }

    pub fn remove_at(&mut self, index: usize) -> Option<M> {
        if index >= self.messages.len() {
            return None;
        }
        Some(self.messages.remove(index))
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<M> {
        let index = self.position_of(id)?;
        self.remove_at(index)
    }

    /// Remove every message accepted by `selector`, in queue order
    pub fn remove_matching(&mut self, selector: &dyn Selector<M>) -> Vec<M> {
        let (removed, kept): (Vec<M>, Vec<M>) = std::mem::take(&mut self.messages)
            .into_iter()
            .partition(|m| selector.matches(m));
        self.messages = kept;
        removed
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn comparator(&self) -> MessageComparator<M> {
        self.comparator.clone()
    }
}

impl<M: fmt::Debug> fmt::Debug for LiveQueue<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.messages.iter()).finish()
    }
}

// ============================================================================
// Mailbox Traits
// ============================================================================

/// Inbound message queue of one entity
///
/// Implementors provide insertion and access to their live queue, every
/// retrieval operation is derived from those. Callers must not invoke other
/// mailbox methods while holding the [`Mailbox::live_queue`] guard.
pub trait Mailbox<M: Message>: Send + Sync {
    /// Accept a message
    ///
    /// # Errors
    /// Returns `MailboxFull` when the mailbox already holds `depth_max`
    /// messages.
    fn add(&self, message: M) -> Result<()>;

    /// Lock the ordered live queue
    fn live_queue(&self) -> MutexGuard<'_, LiveQueue<M>>;

    /// Maximum number of messages held, buffered ones included
    fn depth_max(&self) -> usize;

    /// Number of readable messages
    fn len(&self) -> usize {
        self.live_queue().len()
    }

    fn is_empty(&self) -> bool {
        self.live_queue().is_empty()
    }

    fn contains(&self, message: &M) -> bool {
        self.live_queue().position_of(message.id()).is_some()
    }

    fn contains_matching(&self, selector: &dyn Selector<M>) -> bool {
        self.live_queue().position(selector).is_some()
    }

    /// Message at `index` in queue order, absent when out of range
    fn get(&self, index: usize) -> Option<M> {
        self.live_queue().get(index).cloned()
    }

    /// Peek at the head of the queue
    fn get_first(&self) -> Option<M> {
        self.live_queue().first().cloned()
    }

    /// Peek at the first message accepted by `selector`
    fn get_first_matching(&self, selector: &dyn Selector<M>) -> Option<M> {
        let queue = self.live_queue();
        let index = queue.position(selector)?;
        queue.get(index).cloned()
    }

    /// Remove the message with the same identifier
    fn remove(&self, message: &M) -> bool {
        self.live_queue().remove(message.id()).is_some()
    }

    fn remove_at(&self, index: usize) -> Option<M> {
        self.live_queue().remove_at(index)
    }

    /// Consume the head of the queue
    fn remove_first(&self) -> Option<M> {
        self.live_queue().remove_at(0)
    }

    /// Consume the first message accepted by `selector`
    fn remove_first_matching(&self, selector: &dyn Selector<M>) -> Option<M> {
        let mut queue = self.live_queue();
        let index = queue.position(selector)?;
        queue.remove_at(index)
    }

    /// Consume every message accepted by `selector`
    fn remove_all(&self, selector: &dyn Selector<M>) -> Vec<M> {
        self.live_queue().remove_matching(selector)
    }

    /// Drop every readable message
    fn clear(&self) {
        self.live_queue().clear();
    }

    /// Readable messages in queue order
    fn to_vec(&self) -> Vec<M> {
        self.live_queue().iter().cloned().collect()
    }

    fn comparator(&self) -> MessageComparator<M> {
        self.live_queue().comparator()
    }

    /// Replace the readable content with the readable content of `other`
    ///
    /// At most `depth_max` messages are copied.
    fn copy_from(&self, other: &dyn Mailbox<M>) {
        let messages = other.to_vec();
        let depth_max = self.depth_max();
        let mut queue = self.live_queue();
        queue.clear();
        for message in messages.into_iter().take(depth_max) {
            queue.insert(message);
        }
    }

    /// Iterate over the queue
    ///
    /// With `consume`, each message is removed as it is produced and the
    /// iteration cannot be restarted. Without it, the iteration walks a
    /// snapshot and leaves the queue intact.
    fn iter(&self, consume: bool) -> MailIter<'_, M> {
        if consume {
            MailIter::consuming(move || self.remove_first())
        } else {
            MailIter::snapshot(self.to_vec())
        }
    }

    /// Iterate over the messages accepted by `selector`
    fn iter_matching<'a>(
        &'a self,
        selector: &'a dyn Selector<M>,
        consume: bool,
    ) -> MailIter<'a, M> {
        if consume {
            MailIter::consuming(move || self.remove_first_matching(selector))
        } else {
            let messages = self
                .live_queue()
                .iter()
                .filter(|m| selector.matches(m))
                .cloned()
                .collect();
            MailIter::snapshot(messages)
        }
    }
}

/// Mailbox staging its input until synchronized
pub trait BufferedMailbox<M: Message>: Mailbox<M> {
    /// Fold the buffer into the live queue
    ///
    /// Returns the number of messages delivered.
    fn synchronize(&self) -> usize;

    /// Number of messages waiting for the next synchronization
    fn buffer_len(&self) -> usize;

    fn is_buffer_empty(&self) -> bool {
        self.buffer_len() == 0
    }

    /// Drop every buffered message
    fn clear_buffer(&self);

    fn as_mailbox(&self) -> &dyn Mailbox<M>;
}

/// Iterator produced by [`Mailbox::iter`]
pub struct MailIter<'a, M> {
    source: IterSource<'a, M>,
}

enum IterSource<'a, M> {
    Snapshot(std::vec::IntoIter<M>),
    Consuming(Box<dyn FnMut() -> Option<M> + 'a>),
}

impl<'a, M> MailIter<'a, M> {
    fn snapshot(messages: Vec<M>) -> Self {
        Self {
            source: IterSource::Snapshot(messages.into_iter()),
        }
    }

    fn consuming(next: impl FnMut() -> Option<M> + 'a) -> Self {
        Self {
            source: IterSource::Consuming(Box::new(next)),
        }
    }

    /// Whether produced messages are removed from the mailbox
    pub fn is_consuming(&self) -> bool {
        matches!(self.source, IterSource::Consuming(_))
    }
}

impl<M> Iterator for MailIter<'_, M> {
    type Item = M;

    fn next(&mut self) -> Option<M> {
        match &mut self.source {
            IterSource::Snapshot(messages) => messages.next(),
            IterSource::Consuming(next) => next(),
        }
    }
}

// ============================================================================
// Ordered Mailbox
// ============================================================================

/// Live mailbox: messages are readable as soon as they are added
pub struct OrderedMailbox<M> {
    live: Mutex<LiveQueue<M>>,
    depth_max: usize,
}

impl<M: Message> OrderedMailbox<M> {
    pub fn new() -> Self {
        Self::with_comparator(by_creation_time(), MAILBOX_DEPTH_MAX)
    }

    pub fn with_comparator(comparator: MessageComparator<M>, depth_max: usize) -> Self {
        assert!(depth_max > 0, "depth_max must be positive");
        Self {
            live: Mutex::new(LiveQueue::new(comparator)),
            depth_max,
        }
    }
}

impl<M: Message> Default for OrderedMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> Mailbox<M> for OrderedMailbox<M> {
    fn add(&self, message: M) -> Result<()> {
        let mut live = lock(&self.live);
        check_depth(live.len(), self.depth_max)?;
        live.insert(message);
        metrics::record_mailbox_delivered(1);
        Ok(())
    }

    fn live_queue(&self) -> MutexGuard<'_, LiveQueue<M>> {
        lock(&self.live)
    }

    fn depth_max(&self) -> usize {
        self.depth_max
    }
}

impl<M: Message> fmt::Debug for OrderedMailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMailbox")
            .field("len", &self.len())
            .field("depth_max", &self.depth_max)
            .finish()
    }
}

// ============================================================================
// Staged Mailbox
// ============================================================================

/// Buffered mailbox with one global buffer
///
/// Lock order: buffer, then live queue.
pub struct StagedMailbox<M> {
    buffer: Mutex<Vec<M>>,
    live: Mutex<LiveQueue<M>>,
    depth_max: usize,
}

impl<M: Message> StagedMailbox<M> {
    pub fn new() -> Self {
        Self::with_comparator(by_creation_time(), MAILBOX_DEPTH_MAX)
    }

    pub fn with_depth_max(depth_max: usize) -> Self {
        Self::with_comparator(by_creation_time(), depth_max)
    }

    pub fn with_comparator(comparator: MessageComparator<M>, depth_max: usize) -> Self {
        assert!(depth_max > 0, "depth_max must be positive");
        Self {
            buffer: Mutex::new(Vec::new()),
            live: Mutex::new(LiveQueue::new(comparator)),
            depth_max,
        }
    }
}

impl<M: Message> Default for StagedMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> Mailbox<M> for StagedMailbox<M> {
    fn add(&self, message: M) -> Result<()> {
        let mut buffer = lock(&self.buffer);
        let depth = buffer.len() + lock(&self.live).len();
        check_depth(depth, self.depth_max)?;
        buffer.push(message);
        Ok(())
    }

    fn live_queue(&self) -> MutexGuard<'_, LiveQueue<M>> {
        lock(&self.live)
    }

    fn depth_max(&self) -> usize {
        self.depth_max
    }
}

impl<M: Message> BufferedMailbox<M> for StagedMailbox<M> {
    fn synchronize(&self) -> usize {
        let mut buffer = lock(&self.buffer);
        if buffer.is_empty() {
            return 0;
        }

        let mut live = lock(&self.live);
        let count = buffer.len();
        for message in buffer.drain(..) {
            live.insert(message);
        }

        debug_assert!(live.len() <= self.depth_max);
        metrics::record_mailbox_delivered(count as u64);
        count
    }

    fn buffer_len(&self) -> usize {
        lock(&self.buffer).len()
    }

    fn clear_buffer(&self) {
        lock(&self.buffer).clear();
    }

    fn as_mailbox(&self) -> &dyn Mailbox<M> {
        self
    }
}

impl<M: Message> fmt::Debug for StagedMailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedMailbox")
            .field("len", &self.len())
            .field("buffer_len", &self.buffer_len())
            .field("depth_max", &self.depth_max)
            .finish()
    }
}

// ============================================================================
// Per-Sender Mailbox
// ============================================================================

struct SenderBatches<M> {
    batches: BTreeMap<Address, Vec<M>>,
    len: usize,
}

/// Buffered mailbox batching its input by sender
///
/// Synchronization folds the batches in address order, each batch in its
/// arrival order, so a burst from one sender is delivered as one batch.
/// Lock order: batches, then live queue.
pub struct PerSenderMailbox<M> {
    buffer: Mutex<SenderBatches<M>>,
    live: Mutex<LiveQueue<M>>,
    depth_max: usize,
}

impl<M: Message> PerSenderMailbox<M> {
    pub fn new() -> Self {
        Self::with_comparator(by_creation_time(), MAILBOX_DEPTH_MAX)
    }

    pub fn with_depth_max(depth_max: usize) -> Self {
        Self::with_comparator(by_creation_time(), depth_max)
    }

    pub fn with_comparator(comparator: MessageComparator<M>, depth_max: usize) -> Self {
        assert!(depth_max > 0, "depth_max must be positive");
        Self {
            buffer: Mutex::new(SenderBatches {
                batches: BTreeMap::new(),
                len: 0,
            }),
            live: Mutex::new(LiveQueue::new(comparator)),
            depth_max,
        }
    }

    /// Number of senders with buffered messages
    pub fn senders_count(&self) -> usize {
        lock(&self.buffer).batches.len()
    }
}

impl<M: Message> Default for PerSenderMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> Mailbox<M> for PerSenderMailbox<M> {
    fn add(&self, message: M) -> Result<()> {
        let mut buffer = lock(&self.buffer);
        let depth = buffer.len + lock(&self.live).len();
        check_depth(depth, self.depth_max)?;

        buffer
            .batches
            .entry(message.sender().clone())
            .or_default()
            .push(message);
        buffer.len += 1;
        Ok(())
    }

    fn live_queue(&self) -> MutexGuard<'_, LiveQueue<M>> {
        lock(&self.live)
    }

    fn depth_max(&self) -> usize {
        self.depth_max
    }
}

impl<M: Message> BufferedMailbox<M> for PerSenderMailbox<M> {
    fn synchronize(&self) -> usize {
        let mut buffer = lock(&self.buffer);
        if buffer.len == 0 {
            return 0;
        }

        let batches = std::mem::take(&mut buffer.batches);
        let count = std::mem::replace(&mut buffer.len, 0);
        let mut live = lock(&self.live);
        for message in batches.into_values().flatten() {
            live.insert(message);
        }

        metrics::record_mailbox_delivered(count as u64);
        count
    }

    fn buffer_len(&self) -> usize {
        lock(&self.buffer).len
    }

    fn clear_buffer(&self) {
        let mut buffer = lock(&self.buffer);
        buffer.batches.clear();
        buffer.len = 0;
    }

    fn as_mailbox(&self) -> &dyn Mailbox<M> {
        self
    }
}

impl<M: Message> fmt::Debug for PerSenderMailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerSenderMailbox")
            .field("len", &self.len())
            .field("buffer_len", &self.buffer_len())
            .field("depth_max", &self.depth_max)
            .finish()
    }
}

// ============================================================================
// Latest-Per-Sender Mailbox
// ============================================================================

/// Live mailbox keeping only the newest message of each sender
///
/// A message that sorts before the one already held for its sender is
/// dropped.
pub struct LatestPerSenderMailbox<M> {
    live: Mutex<LiveQueue<M>>,
    depth_max: usize,
}

impl<M: Message> LatestPerSenderMailbox<M> {
    pub fn new() -> Self {
        Self::with_comparator(by_creation_time(), MAILBOX_DEPTH_MAX)
    }

    pub fn with_comparator(comparator: MessageComparator<M>, depth_max: usize) -> Self {
        assert!(depth_max > 0, "depth_max must be positive");
        Self {
            live: Mutex::new(LiveQueue::new(comparator)),
            depth_max,
        }
    }
}

impl<M: Message> Default for LatestPerSenderMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> Mailbox<M> for LatestPerSenderMailbox<M> {
    fn add(&self, message: M) -> Result<()> {
        let mut live = lock(&self.live);
        let held = live
            .iter()
            .position(|existing| existing.sender() == message.sender());

        match held {
            Some(index) => {
                let comparator = live.comparator();
                let newer = live
                    .get(index)
                    .map_or(false, |existing| comparator(existing, &message) == Ordering::Less);
                if newer {
                    live.remove_at(index);
                    live.insert(message);
                    metrics::record_mailbox_delivered(1);
                }
            }
            None => {
                check_depth(live.len(), self.depth_max)?;
                live.insert(message);
                metrics::record_mailbox_delivered(1);
            }
        }
        Ok(())
    }

    fn live_queue(&self) -> MutexGuard<'_, LiveQueue<M>> {
        lock(&self.live)
    }

    fn depth_max(&self) -> usize {
        self.depth_max
    }
}

impl<M: Message> fmt::Debug for LatestPerSenderMailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatestPerSenderMailbox")
            .field("len", &self.len())
            .field("depth_max", &self.depth_max)
            .finish()
    }
}

// ============================================================================
// Black Hole Mailbox
// ============================================================================

/// Mailbox discarding every message
pub struct BlackHoleMailbox<M> {
    live: Mutex<LiveQueue<M>>,
}

impl<M: Message> BlackHoleMailbox<M> {
    pub fn new() -> Self {
        Self {
            live: Mutex::new(LiveQueue::new(by_creation_time())),
        }
    }
}

impl<M: Message> Default for BlackHoleMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> Mailbox<M> for BlackHoleMailbox<M> {
    fn add(&self, _message: M) -> Result<()> {
        Ok(())
    }

    fn live_queue(&self) -> MutexGuard<'_, LiveQueue<M>> {
        let queue = lock(&self.live);
        debug_assert!(queue.is_empty());
        queue
    }

    fn depth_max(&self) -> usize {
        0
    }

    fn copy_from(&self, _other: &dyn Mailbox<M>) {}
}

impl<M: Message> BufferedMailbox<M> for BlackHoleMailbox<M> {
    fn synchronize(&self) -> usize {
        0
    }

    fn buffer_len(&self) -> usize {
        0
    }

    fn clear_buffer(&self) {}

    fn as_mailbox(&self) -> &dyn Mailbox<M> {
        self
    }
}

impl<M> fmt::Debug for BlackHoleMailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlackHoleMailbox")
    }
}

// ============================================================================
// Construction and Waiting
// ============================================================================

/// Build the buffered mailbox described by `config`
pub fn build_mailbox<M: Message>(config: &MailboxConfig) -> Box<dyn BufferedMailbox<M>> {
    debug_assert!(config.depth_max > 0);

    match config.kind {
        MailboxKind::Staged => Box::new(StagedMailbox::with_depth_max(config.depth_max)),
        MailboxKind::PerSender => Box::new(PerSenderMailbox::with_depth_max(config.depth_max)),
        MailboxKind::BlackHole => Box::new(BlackHoleMailbox::new()),
    }
}

/// Consume the first message accepted by `selector`, waiting up to `timeout_ms`
///
/// The live queue is polled every `MAILBOX_POLL_INTERVAL_MS_DEFAULT`
/// through `time`. Buffered mailboxes only expose what their last
/// synchronization delivered. Returns `None` on timeout.
pub async fn wait_remove_first<M: Message>(
    mailbox: &dyn Mailbox<M>,
    selector: &dyn Selector<M>,
    timeout_ms: u64,
    time: &dyn TimeProvider,
) -> Option<M> {
    let deadline_ms = time.monotonic_ms().saturating_add(timeout_ms);

    loop {
        if let Some(message) = mailbox.remove_first_matching(selector) {
            return Some(message);
        }

        let now_ms = time.monotonic_ms();
        if now_ms >= deadline_ms {
            return None;
        }
        time.sleep_ms(MAILBOX_POLL_INTERVAL_MS_DEFAULT.min(deadline_ms - now_ms))
            .await;
    }
}
