// Concurrent use of the relations from scoped threads.
//
// These tests do not try to provoke specific interleavings; they check that
// the two-sided invariants hold once all writers are done, and that readers
// running alongside writers never observe half a pair.
use dual_index::{Lookup, LookupMap, Map};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

const THREADS: u32 = 8;
const PER_THREAD: u32 = 500;

#[test]
fn lookup_parallel_adds_on_shared_keys() {
    let lookup: Lookup<u32, u32> = Lookup::new();
    thread::scope(|s| {
        for t in 0..THREADS {
            let lookup = &lookup;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    lookup.add(i % 16, 10_000 + t * PER_THREAD + i).unwrap();
                    // Duplicates from every thread must collapse.
                    lookup.add(i % 16, i % 4).unwrap();
                }
            });
        }
    });
    assert_eq!(lookup.key_count(), 16);
    // Key k only ever receives the shared value k % 4.
    assert_eq!(lookup.count(), (THREADS * PER_THREAD) as usize + 16);
}

// Test: adds and removals of values racing on the same few keys.
// Verifies: no key survives with an empty group.
#[test]
fn lookup_add_remove_race_keeps_no_empty_groups() {
    let lookup: Lookup<u32, u32> = Lookup::new();
    thread::scope(|s| {
        for t in 0..THREADS {
            let lookup = &lookup;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let key = i % 3;
                    let value = (t + i) % 5;
                    if (t + i) % 2 == 0 {
                        lookup.add(key, value).unwrap();
                    } else {
                        lookup.remove_value(&key, &value).unwrap();
                    }
                }
            });
        }
    });
    for (key, values) in lookup.groups() {
        assert!(!values.is_empty(), "key {key} kept an empty group");
        assert_eq!(lookup.count_of(&key), Ok(values.len()));
    }
}

#[test]
fn map_contended_adds_keep_bijection() {
    let map: Map<u32, u32> = Map::new();
    thread::scope(|s| {
        for t in 0..THREADS {
            let map = &map;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    // Every thread competes for the same pairs and for
                    // crossing pairs; only one of each may win.
                    let _ = map.add(i, i + 1);
                    let _ = map.add(i + t, i);
                    if i % 7 == t {
                        let _ = map.forward().remove(&i);
                    }
                }
            });
        }
    });
    for (a, b) in map.all() {
        assert_eq!(map.reverse().get(&b), Ok(a));
    }
    assert_eq!(map.all_right().count(), map.count());
}

// Test: readers sampling the map while writers churn pairs.
// Verifies: a reverse entry found for a snapshotted pair always points
// back at the same left element.
#[test]
fn map_readers_see_consistent_pairs() {
    let map: Map<u32, u32> = Map::new();
    let done = AtomicBool::new(false);
    thread::scope(|s| {
        let (map, done) = (&map, &done);
        for _ in 0..2 {
            s.spawn(move || {
                for round in 0..200 {
                    for i in 0..32 {
                        let _ = map.add(i, 1000 + i);
                    }
                    for i in (round % 2..32).step_by(2) {
                        let _ = map.forward().remove(&i);
                    }
                }
            });
        }
        s.spawn(move || {
            while !done.load(Ordering::Relaxed) {
                for (a, b) in map.all() {
                    // Pairs are only ever (i, 1000 + i).
                    assert_eq!(b, 1000 + a);
                    if let Ok(back) = map.reverse().get(&b) {
                        assert_eq!(back, a);
                    }
                }
            }
        });
        s.spawn(move || {
            thread::sleep(std::time::Duration::from_millis(50));
            done.store(true, Ordering::Relaxed);
        });
    });
    for (a, b) in map.all() {
        assert_eq!(map.reverse().get(&b), Ok(a));
    }
}

#[test]
fn lookup_map_parallel_fan_out_removal() {
    let map: LookupMap<u32, u32> = LookupMap::new();
    thread::scope(|s| {
        for t in 0..THREADS {
            let map = &map;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    map.add(i % 10, (t + i) % 13).unwrap();
                    if i % 50 == 0 {
                        map.forward().remove(&(t % 10)).unwrap();
                    }
                    if i % 70 == 0 {
                        map.reverse().remove(&(t % 13)).unwrap();
                    }
                }
            });
        }
    });
    let mut forward = 0;
    for a in map.all_left() {
        for b in map.forward().get(&a) {
            assert!(map.reverse().get(&b).contains(&a), "{a} -> {b} not mirrored");
            forward += 1;
        }
    }
    let reverse: usize = map.all_right().map(|b| map.reverse().get(&b).len()).sum();
    assert_eq!(forward, map.count());
    assert_eq!(reverse, map.count());
}
