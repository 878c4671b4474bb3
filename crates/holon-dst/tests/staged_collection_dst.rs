//! DST tests for staged collections and cursors
//!
//! TigerStyle: Random mutation sequences checked against a plain set model.
//!
//! Properties:
//! - Members added or removed under an open cursor never show up in that
//!   cursor, and show up once the last cursor is released
//! - An exhausted cursor releases itself, without an explicit release call

use holon_dst::{DeterministicRng, SimConfig, Simulation};
use holon_runtime::staged::{Cursor, StagedCollection};
use std::collections::BTreeSet;

const ITEM_RANGE: u64 = 32;
const OPERATIONS_COUNT: usize = 2_000;

fn sorted(items: &[u64]) -> Vec<u64> {
    let mut items = items.to_vec();
    items.sort_unstable();
    items
}

/// Membership after every buffered change is folded
struct Model {
    members: BTreeSet<u64>,
}

impl Model {
    fn add(&mut self, item: u64) -> bool {
        self.members.insert(item)
    }

    fn remove(&mut self, item: u64) -> bool {
        self.members.remove(&item)
    }

    fn to_vec(&self) -> Vec<u64> {
        self.members.iter().copied().collect()
    }
}

struct OpenCursor {
    cursor: Cursor<u64>,
    /// Live members when the cursor was opened
    expected: Vec<u64>,
    seen: Vec<u64>,
}

fn run_random_sequence(rng: &DeterministicRng) {
    let collection: StagedCollection<u64> = StagedCollection::new();
    let mut model = Model {
        members: BTreeSet::new(),
    };
    let mut cursors: Vec<OpenCursor> = Vec::new();
    // Live members as seen by the collection: frozen while a cursor is open
    let mut visible = model.to_vec();

    for _ in 0..OPERATIONS_COUNT {
        match rng.next_range(0, 6) {
            0 | 1 => {
                let item = rng.next_range(0, ITEM_RANGE);
                assert_eq!(collection.add(item).unwrap(), model.add(item));
            }
            2 => {
                let item = rng.next_range(0, ITEM_RANGE);
                assert_eq!(collection.remove(&item), model.remove(item));
            }
            3 => {
                let cursor = collection.iter();
                assert_eq!(sorted(cursor.as_slice()), visible);
                cursors.push(OpenCursor {
                    cursor,
                    expected: visible.clone(),
                    seen: Vec::new(),
                });
            }
            4 if !cursors.is_empty() => {
                let index = rng.next_index(cursors.len());
                let open = &mut cursors[index];
                let steps = rng.next_range(1, 4);
                for _ in 0..steps {
                    match open.cursor.next() {
                        Some(item) => open.seen.push(item),
                        None => break,
                    }
                }
                if !open.cursor.has_next() {
                    assert!(open.cursor.is_released());
                    let open = cursors.swap_remove(index);
                    assert_eq!(sorted(&open.seen), open.expected);
                }
            }
            _ if !cursors.is_empty() => {
                let index = rng.next_index(cursors.len());
                drop(cursors.swap_remove(index));
            }
            _ => {}
        }

        if cursors.is_empty() {
            visible = model.to_vec();
        }
        assert_eq!(sorted(&collection.to_vec()), visible);
        assert_eq!(collection.open_cursor_count(), cursors.len());
    }

    cursors.clear();
    assert!(collection.synchronize());
    assert_eq!(sorted(&collection.to_vec()), model.to_vec());
    assert!(!collection.has_pending());
}

#[test]
fn test_dst_staged_collection_matches_model() {
    let config = SimConfig::from_env_or_random();

    let result = Simulation::new(config).run(|env| async move {
        for _ in 0..8 {
            run_random_sequence(&env.fork_rng());
        }
        Ok(())
    });

    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn test_dst_staged_collection_fixed_seeds() {
    for seed in [0, 1, 42, 12345] {
        run_random_sequence(&DeterministicRng::new(seed));
    }
}

#[test]
fn test_dst_add_under_cursor_visible_after_sync() {
    let collection: StagedCollection<u64> = StagedCollection::new();
    collection.add(1).unwrap();

    let mut cursor = collection.iter();
    collection.add(2).unwrap();

    let seen: Vec<u64> = cursor.by_ref().collect();
    assert_eq!(seen, vec![1]);
    assert!(cursor.is_released());

    assert!(collection.synchronize());
    assert_eq!(collection.to_vec(), vec![1, 2]);
}

#[test]
fn test_dst_exhausted_cursor_releases_itself() {
    let collection: StagedCollection<u64> = StagedCollection::new();
    collection.add(1).unwrap();

    let mut cursor = collection.iter();
    collection.add(2).unwrap();
    while cursor.has_next() {
        cursor.next();
    }

    // No release call, cursor still in scope
    let fresh: Vec<u64> = collection.iter().collect();
    assert_eq!(fresh, vec![1, 2]);
    drop(cursor);
}
