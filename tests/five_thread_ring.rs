use lockwatch::{DeadlockKind, Mutex};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
mod common;
use common::{DEADLOCK_TIMEOUT, NO_DEADLOCK_TIMEOUT, expect_deadlock, start_detector};

const RING: usize = 5;

#[test]
fn test_five_thread_ring() {
    let harness = start_detector();

    let locks: Vec<_> = (0..RING)
        .map(|i| Arc::new(Mutex::new(format!("L{i}"))))
        .collect();

    // Thread i takes L(i) then L(i+1); only the last thread closes the ring
    for i in 0..RING {
        let first = Arc::clone(&locks[i]);
        let second = Arc::clone(&locks[(i + 1) % RING]);
        thread::spawn(move || {
            let _a = first.lock();
            let _b = second.lock();
        })
        .join()
        .unwrap();
    }

    let (kind, infos) = expect_deadlock(&harness, DEADLOCK_TIMEOUT);
    assert_eq!(kind, DeadlockKind::Cyclic);
    assert_eq!(infos.len(), RING);

    let threads: HashSet<_> = infos.iter().map(|info| info.thread_id).collect();
    assert_eq!(threads.len(), RING, "one info per participating thread");
    assert!(infos.iter().all(|info| info.lock_path.len() == 2));

    assert!(
        harness.rx.recv_timeout(NO_DEADLOCK_TIMEOUT).is_err(),
        "Ring reported more than once"
    );
}
