use lockwatch::{DeadlockKind, Mutex};
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
mod common;
use common::{DEADLOCK_TIMEOUT, expect_deadlock, start_detector};

#[test]
fn test_random_ring_deadlock() {
    let harness = start_detector();

    // Pick a random ring size between 3 and 8
    let mut rng = rand::rng();
    let n = rng.random_range(3..=8);
    println!("testing a ring of {n} threads");

    let locks: Vec<_> = (0..n)
        .map(|i| Arc::new(Mutex::new(format!("L{i}"))))
        .collect();

    // Run the ring members one at a time, in random order
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut rng);

    for i in order {
        let first = Arc::clone(&locks[i]);
        let second = Arc::clone(&locks[(i + 1) % n]);
        thread::spawn(move || {
            let mut rng = rand::rng();
            let _a = first.lock();
            thread::sleep(Duration::from_millis(rng.random_range(0..10)));
            let _b = second.lock();
        })
        .join()
        .unwrap();
    }

    let (kind, infos) = expect_deadlock(&harness, DEADLOCK_TIMEOUT);
    assert_eq!(kind, DeadlockKind::Cyclic);
    assert_eq!(
        infos.len(),
        n,
        "Expected a cycle of length {n}, got {infos:?}"
    );
}
