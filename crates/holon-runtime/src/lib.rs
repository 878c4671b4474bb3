//! Holon Runtime
//!
//! Activation engine, staged collections and mailboxes for Holon agents.
//!
//! # Overview
//!
//! The runtime provides:
//! - Staged collections whose mutations become visible at explicit fold points
//! - Activators driving the initialization, live, destruction lifecycle
//! - Schedulers composing activators into trees
//! - Buffered and live mailboxes with selector-based retrieval
//! - A kernel loop pacing passes over the tree
//!
//! # TigerStyle
//! - Membership never changes under an open cursor
//! - Explicit lifecycle phases, each entity initialized and destroyed once
//! - Callback faults become outcomes, a pass always completes
//! - Bounded collections and mailboxes

pub mod activation;
pub mod envelope;
pub mod kernel;
pub mod mailbox;
pub mod scheduler;
pub mod selector;
pub mod staged;

pub use activation::{
    insertion_order, ordered_by, reverse_order, round_robin, ActivationParams, ActivationStage,
    ActivationStats, Activable, Activator, ActivatorNode, ExecutionPolicy, LifecyclePhase, Member,
};
pub use envelope::{Envelope, Message, MessageId};
pub use kernel::{Kernel, KernelHandle, KernelReport};
pub use mailbox::{
    build_mailbox, by_creation_time, wait_remove_first, BlackHoleMailbox, BufferedMailbox,
    LatestPerSenderMailbox, LiveQueue, MailIter, Mailbox, MessageComparator, OrderedMailbox,
    PerSenderMailbox, StagedMailbox,
};
pub use scheduler::Scheduler;
pub use selector::Selector;
pub use staged::{
    Comparator, Cursor, FusedView, ListenerId, StagedCollection, StagedListener, StagedOptions,
    StagedView,
};
