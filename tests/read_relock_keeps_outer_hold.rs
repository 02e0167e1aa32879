use lockwatch::{DeadlockKind, Mutex, RwLock};
use std::sync::Arc;
use std::thread;
mod common;
use common::{DEADLOCK_TIMEOUT, expect_deadlock, start_detector};

#[test]
fn test_read_relock_keeps_outer_hold() {
    let harness = start_detector();

    let table = Arc::new(RwLock::new(0));
    let index = Arc::new(Mutex::new(0));

    // Re-entrant read: reported, then the outer read is still held when the
    // mutex is taken
    let (t, i) = (Arc::clone(&table), Arc::clone(&index));
    thread::spawn(move || {
        let outer = t.read();
        let inner = t.read();
        let sum = *outer + *inner;
        drop(inner);
        *i.lock() += sum;
    })
    .join()
    .unwrap();

    let (kind, infos) = expect_deadlock(&harness, DEADLOCK_TIMEOUT);
    assert_eq!(kind, DeadlockKind::SelfRelock);
    assert_eq!(infos[0].lock_path.len(), 2);

    // Inverted order against the table -> index edge kept above
    let (t, i) = (Arc::clone(&table), Arc::clone(&index));
    thread::spawn(move || {
        let _index = i.lock();
        *t.write() += 1;
    })
    .join()
    .unwrap();

    let (kind, infos) = expect_deadlock(&harness, DEADLOCK_TIMEOUT);
    assert_eq!(kind, DeadlockKind::Cyclic);
    assert_eq!(infos.len(), 2);
}
