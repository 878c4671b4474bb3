//! DST tests for outcome aggregation
//!
//! TigerStyle: Random outcome trees, properties checked on every node.
//!
//! Properties:
//! - Aggregates keep the most severe outcome at the head, at every level
//! - Packing is idempotent and never changes severity or failure status
//! - A healthy aggregate packs to a single outcome

use holon_core::outcome::{MultipleOutcome, Outcome, Severity, SEVERITY_MASK_ALL};
use holon_dst::{DeterministicRng, SimConfig, Simulation};

const TREES_COUNT: usize = 500;
const TREE_DEPTH_MAX: u32 = 4;
const CHILDREN_COUNT_MAX: u64 = 6;

fn random_severity(rng: &DeterministicRng) -> Severity {
    Severity::ALL[rng.next_index(Severity::ALL.len())]
}

fn random_outcome(rng: &DeterministicRng, depth: u32) -> Outcome {
    if depth == 0 || rng.next_bool(0.5) {
        let provider = format!("p-{}", rng.next_range(0, 8));
        return Outcome::single(random_severity(rng), provider, rng.next_range(0, 3) as i32);
    }

    let children_count = rng.next_range(0, CHILDREN_COUNT_MAX);
    (0..children_count)
        .map(|_| random_outcome(rng, depth - 1))
        .collect::<MultipleOutcome>()
        .into()
}

fn check_ordering(outcome: &Outcome) {
    let children = outcome.children();
    assert!(children
        .windows(2)
        .all(|pair| pair[0].severity() >= pair[1].severity()));

    if let Some(most_severe) = children.iter().map(Outcome::severity).max() {
        assert_eq!(outcome.severity(), most_severe);
        assert_eq!(outcome.is_failure(), most_severe.is_failure());
    }

    for mask in 0..=SEVERITY_MASK_ALL {
        if let Outcome::Multiple(_) = outcome {
            let scanned = children
                .iter()
                .any(|child| child.severity().mask() & mask != 0);
            assert_eq!(outcome.matches_mask(mask), scanned, "mask {:#04x}", mask);
        }
    }

    children.iter().for_each(check_ordering);
}

fn check_pack(outcome: &Outcome) {
    let once = outcome.pack("root");
    let twice = once.pack("root");

    assert_eq!(once, twice);
    assert_eq!(once.severity(), outcome.severity());
    assert_eq!(once.is_failure(), outcome.is_failure());
    if once.severity() <= Severity::Info {
        assert!(matches!(once, Outcome::Single(_)), "{}", once);
    }
}

#[test]
fn test_dst_outcome_random_trees() {
    let config = SimConfig::from_env_or_random();

    let result = Simulation::new(config).run(|env| async move {
        let rng = env.fork_rng();
        for _ in 0..TREES_COUNT {
            let outcome = random_outcome(&rng, TREE_DEPTH_MAX);
            check_ordering(&outcome);
            check_pack(&outcome);
        }
        Ok(())
    });

    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn test_dst_outcome_mixed_severities_head_is_fatal() {
    let rng = DeterministicRng::from_env_or_random();

    for _ in 0..100 {
        let mut outcomes = vec![
            Outcome::warning("a", "slow"),
            Outcome::ok("b"),
            Outcome::single(Severity::Fatal, "c", 0),
            Outcome::single(Severity::Info, "d", 0),
        ];
        rng.shuffle(&mut outcomes);

        let aggregate: Outcome = outcomes.into_iter().collect::<MultipleOutcome>().into();

        assert_eq!(aggregate.children()[0].severity(), Severity::Fatal);
        assert_eq!(aggregate.severity(), Severity::Fatal);
        assert!(aggregate.is_failure());
    }
}

#[test]
fn test_dst_outcome_all_ok_packs_to_single_ok() {
    let rng = DeterministicRng::from_env_or_random();

    for _ in 0..100 {
        let count = rng.next_range(1, 10);
        let aggregate: Outcome = (0..count)
            .map(|i| Outcome::ok(format!("agent-{}", i)))
            .collect::<MultipleOutcome>()
            .into();

        let packed = aggregate.pack("root");
        assert!(matches!(packed, Outcome::Single(_)));
        assert_eq!(packed.severity(), Severity::Ok);
        assert_eq!(packed, packed.pack("root"));
    }
}

#[test]
fn test_dst_outcome_empty_aggregate_packs_to_ok() {
    let empty = Outcome::Multiple(MultipleOutcome::new());
    assert!(!empty.is_success());
    assert!(!empty.is_failure());

    let packed = empty.pack("root");
    assert_eq!(packed, Outcome::ok("root"));
    assert!(packed.is_success());
}
