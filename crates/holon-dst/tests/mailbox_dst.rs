//! DST tests for mailboxes
//!
//! TigerStyle: Random traffic against an ordered model, plus agents
//! exchanging messages under drop and reorder faults.
//!
//! Properties:
//! - A synchronized mailbox yields messages by creation time, ties in arrival order
//! - A latest-per-sender mailbox holds the newest message of each sender
//! - Bounded mailboxes reject messages past their depth

use holon_core::address::Address;
use holon_core::config::SchedulerConfig;
use holon_core::error::{Error, Result};
use holon_core::io::IoContext;
use holon_dst::{
    DeterministicRng, FaultConfig, FaultType, InvariantChecker, MailboxOrdering, SimAgent,
    SimConfig, Simulation, OPERATION_SEND,
};
use holon_runtime::activation::{ActivationParams, Activator};
use holon_runtime::envelope::Envelope;
use holon_runtime::mailbox::{
    BufferedMailbox, LatestPerSenderMailbox, Mailbox, PerSenderMailbox, StagedMailbox,
};
use std::collections::BTreeMap;
use std::sync::Arc;

const SENDERS_COUNT: u64 = 4;
const OPERATIONS_COUNT: usize = 1_000;
const CREATED_AT_RANGE_MS: u64 = 50;

fn sender(index: u64) -> Address {
    Address::new(format!("sender-{}", index)).unwrap()
}

/// Envelope carrying its arrival sequence number
fn numbered(sender_index: u64, seq: u64, created_at_ms: u64, io: &IoContext) -> Envelope {
    Envelope::json(sender(sender_index), "seq", &seq, io)
        .unwrap()
        .with_created_at_ms(created_at_ms)
}

fn seq_of(envelope: &Envelope) -> u64 {
    envelope.decode::<u64>().unwrap()
}

// =============================================================================
// Ordering
// =============================================================================

fn run_staged_traffic(rng: &DeterministicRng, io: &IoContext) {
    let mailbox: StagedMailbox<Envelope> = StagedMailbox::new();
    let mut buffered: Vec<(u64, u64)> = Vec::new();
    let mut live: Vec<(u64, u64)> = Vec::new();
    let mut seq = 0u64;

    for _ in 0..OPERATIONS_COUNT {
        match rng.next_range(0, 4) {
            0 | 1 => {
                let created_at_ms = rng.next_range(0, CREATED_AT_RANGE_MS);
                let sender_index = rng.next_range(0, SENDERS_COUNT);
                mailbox
                    .add(numbered(sender_index, seq, created_at_ms, io))
                    .unwrap();
                buffered.push((created_at_ms, seq));
                seq += 1;
            }
            2 => {
                assert_eq!(mailbox.synchronize(), buffered.len());
                live.append(&mut buffered);
                live.sort_by_key(|(created_at_ms, _)| *created_at_ms);
            }
            _ => {
                let expected = if live.is_empty() {
                    None
                } else {
                    Some(live.remove(0))
                };
                let removed = mailbox
                    .remove_first()
                    .map(|envelope| (envelope.created_at_ms, seq_of(&envelope)));
                assert_eq!(removed, expected);
            }
        }

        assert_eq!(mailbox.len(), live.len());
        assert_eq!(mailbox.buffer_len(), buffered.len());
    }

    mailbox.synchronize();
    let drained: Vec<u64> = mailbox
        .iter(true)
        .map(|envelope| envelope.created_at_ms)
        .collect();
    assert!(drained.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(mailbox.is_empty());
}

#[test]
fn test_dst_staged_mailbox_ordering() {
    let config = SimConfig::from_env_or_random();

    let result = Simulation::new(config).run(|env| async move {
        for _ in 0..4 {
            run_staged_traffic(&env.fork_rng(), &env.io_context);
        }
        Ok(())
    });

    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn test_dst_earlier_message_first() {
    let io = IoContext::production();
    let mailbox: StagedMailbox<Envelope> = StagedMailbox::new();

    let m1 = numbered(0, 1, 10, &io);
    let m2 = numbered(1, 2, 5, &io);
    mailbox.add(m1.clone()).unwrap();
    mailbox.add(m2.clone()).unwrap();
    assert!(mailbox.remove_first().is_none());

    mailbox.synchronize();
    assert_eq!(mailbox.remove_first().map(|m| m.id), Some(m2.id));
    assert_eq!(mailbox.remove_first().map(|m| m.id), Some(m1.id));
}

#[test]
fn test_dst_per_sender_mailbox_keeps_sender_order() {
    let rng = DeterministicRng::from_env_or_random();
    let io = IoContext::production();
    let mailbox: PerSenderMailbox<Envelope> = PerSenderMailbox::new();

    let mut seq = 0u64;
    for _ in 0..200 {
        let sender_index = rng.next_range(0, SENDERS_COUNT);
        // Same timestamp for everyone: order falls back to arrival
        mailbox.add(numbered(sender_index, seq, 7, &io)).unwrap();
        seq += 1;
    }
    assert!(mailbox.senders_count() <= SENDERS_COUNT as usize);
    assert_eq!(mailbox.synchronize(), 200);

    let mut last_seq: BTreeMap<Address, u64> = BTreeMap::new();
    for envelope in mailbox.iter(true) {
        let seq = seq_of(&envelope);
        if let Some(previous) = last_seq.insert(envelope.sender.clone(), seq) {
            assert!(previous < seq);
        }
    }
}

#[test]
fn test_dst_latest_per_sender_mailbox() {
    let rng = DeterministicRng::from_env_or_random();
    let io = IoContext::production();
    let mailbox: LatestPerSenderMailbox<Envelope> = LatestPerSenderMailbox::new();
    let mut newest: BTreeMap<u64, (u64, u64)> = BTreeMap::new();

    for seq in 0..500 {
        let sender_index = rng.next_range(0, SENDERS_COUNT);
        let created_at_ms = rng.next_range(0, CREATED_AT_RANGE_MS);
        mailbox
            .add(numbered(sender_index, seq, created_at_ms, &io))
            .unwrap();

        let held = newest.entry(sender_index).or_insert((created_at_ms, seq));
        if created_at_ms > held.0 {
            *held = (created_at_ms, seq);
        }
    }

    assert_eq!(mailbox.len(), newest.len());
    for (sender_index, (created_at_ms, seq)) in newest {
        let from = sender(sender_index);
        let held: Vec<Envelope> = mailbox
            .to_vec()
            .into_iter()
            .filter(|envelope| envelope.sender == from)
            .collect();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].created_at_ms, created_at_ms);
        assert_eq!(seq_of(&held[0]), seq);
    }
}

// =============================================================================
// Bounds
// =============================================================================

#[test]
fn test_dst_mailbox_depth_is_bounded() {
    let rng = DeterministicRng::from_env_or_random();
    let io = IoContext::production();

    for _ in 0..20 {
        let depth_max = rng.next_range(1, 32) as usize;
        let mailbox: StagedMailbox<Envelope> = StagedMailbox::with_depth_max(depth_max);

        let mut accepted = 0usize;
        for seq in 0..(depth_max as u64 * 2) {
            if rng.next_bool(0.3) {
                mailbox.synchronize();
            }
            match mailbox.add(numbered(0, seq, seq, &io)) {
                Ok(()) => accepted += 1,
                Err(error) => {
                    assert!(matches!(error, Error::MailboxFull { .. }));
                    assert!(error.is_retriable());
                }
            }
        }

        assert_eq!(accepted, depth_max);
        assert_eq!(mailbox.len() + mailbox.buffer_len(), depth_max);
    }
}

// =============================================================================
// Agents Under Message Faults
// =============================================================================

#[test]
fn test_dst_agents_exchange_under_message_faults() {
    let config = SimConfig::from_env_or_random().with_send_probability(1.0);

    let result = Simulation::new(config)
        .with_invariants(InvariantChecker::new().with_invariant(MailboxOrdering))
        .with_fault(FaultConfig::new(FaultType::MessageDrop, 0.1).with_filter(OPERATION_SEND))
        .with_fault(
            FaultConfig::new(FaultType::MessageReorder { skew_ms: 25 }, 0.2)
                .with_filter(OPERATION_SEND),
        )
        .run(|env| async move {
            let group = Arc::new(Activator::<SimAgent>::new("exchange"));
            let mut agents = Vec::new();
            for i in 0..8 {
                let agent = env.agent(&format!("agent-{}", i))?;
                group.add_member(agent.clone())?;
                agents.push(agent);
            }

            let kernel = env.kernel(group, SchedulerConfig::default())?;
            env.drive(&kernel, &ActivationParams::empty(), 40, |_| Ok(()))?;

            let sent: u64 = agents.iter().map(|agent| agent.sent_count()).sum();
            let received: u64 = agents.iter().map(|agent| agent.received_count()).sum();
            Ok::<_, Error>((sent, received, env.trace().deliveries.len()))
        });

    let (sent, received, deliveries) = result.expect("mailbox ordering holds");
    assert!(sent > 0);
    assert!(received <= sent);
    assert!(deliveries > 0);
}

#[test]
fn test_dst_agent_mailbox_waits_on_simulated_time() -> Result<()> {
    let result = Simulation::new(SimConfig::new(5)).run(|env| async move {
        let agent = env.agent("waiter")?;
        let selector = holon_runtime::selector::any::<Envelope>();

        let started_ms = env.now_ms();
        let waited = holon_runtime::mailbox::wait_remove_first(
            agent.mailbox().as_mailbox(),
            &selector,
            100,
            env.io_context.time.as_ref(),
        )
        .await;

        assert!(waited.is_none());
        assert!(env.now_ms() >= started_ms + 100);
        Ok(())
    });

    result.map_err(|e| Error::internal(e.to_string()))
}
