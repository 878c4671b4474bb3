//! Message selectors
//!
//! TigerStyle: Pure predicates, no side effects while a queue is locked.

use crate::envelope::{Envelope, Message};
use holon_core::address::Address;

/// Predicate choosing messages out of a mailbox
///
/// Selectors run while the mailbox queue is locked and must not touch the
/// mailbox they filter.
pub trait Selector<M>: Send + Sync {
    fn matches(&self, message: &M) -> bool;
}

impl<M, F> Selector<M> for F
where
    F: Fn(&M) -> bool + Send + Sync,
{
    fn matches(&self, message: &M) -> bool {
        self(message)
    }
}

/// Matches every message
pub fn any<M>() -> impl Selector<M> {
    |_: &M| true
}

/// Messages sent by `sender`
pub fn from_sender<M: Message>(sender: Address) -> impl Selector<M> {
    move |message: &M| message.sender() == &sender
}

/// Envelopes whose kind tag equals `kind`
pub fn of_kind(kind: impl Into<String>) -> impl Selector<Envelope> {
    let kind = kind.into();
    debug_assert!(!kind.is_empty(), "kind must not be empty");
    move |envelope: &Envelope| envelope.kind == kind
}

/// Matches when both selectors match
pub fn and<M, A, B>(left: A, right: B) -> impl Selector<M>
where
    A: Selector<M>,
    B: Selector<M>,
{
    move |message: &M| left.matches(message) && right.matches(message)
}

/// Matches when either selector matches
pub fn or<M, A, B>(left: A, right: B) -> impl Selector<M>
where
    A: Selector<M>,
    B: Selector<M>,
{
    move |message: &M| left.matches(message) || right.matches(message)
}

pub fn not<M, A>(inner: A) -> impl Selector<M>
where
    A: Selector<M>,
{
    move |message: &M| !inner.matches(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn envelope(sender: &str, kind: &str) -> Envelope {
        Envelope::new(Address::new(sender).unwrap(), kind, Bytes::new())
    }

    #[test]
    fn test_from_sender() {
        let selector = from_sender::<Envelope>(Address::new("alice").unwrap());
        assert!(selector.matches(&envelope("alice", "chat")));
        assert!(!selector.matches(&envelope("bob", "chat")));
    }

    #[test]
    fn test_combinators() {
        let alice = || from_sender::<Envelope>(Address::new("alice").unwrap());

        let both = and(alice(), of_kind("chat"));
        assert!(both.matches(&envelope("alice", "chat")));
        assert!(!both.matches(&envelope("alice", "ping")));

        let either = or(alice(), of_kind("ping"));
        assert!(either.matches(&envelope("bob", "ping")));
        assert!(!either.matches(&envelope("bob", "chat")));

        let others = not(alice());
        assert!(others.matches(&envelope("bob", "chat")));
    }

    #[test]
    fn test_closure_is_a_selector() {
        let large = |e: &Envelope| e.payload.len() > 2;
        let message = Envelope::new(
            Address::new("alice").unwrap(),
            "blob",
            Bytes::from_static(b"abcd"),
        );
        assert!(large.matches(&message));
    }
}
