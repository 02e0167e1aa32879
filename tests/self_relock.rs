use lockwatch::{DeadlockKind, Mutex};
use std::sync::Arc;
use std::thread;
mod common;
use common::{DEADLOCK_TIMEOUT, expect_deadlock, start_detector};

#[test]
fn test_self_relock() {
    let harness = start_detector();

    let outer = Arc::new(Mutex::new("outer"));
    let inner = Arc::new(Mutex::new("inner"));

    // Reported before the second lock blocks; the thread then hangs for good
    let _worker = thread::spawn(move || {
        let _guard_inner = inner.lock();
        let _guard_outer = outer.lock();
        let _again = inner.lock();
    });

    let (kind, infos) = expect_deadlock(&harness, DEADLOCK_TIMEOUT);
    assert_eq!(kind, DeadlockKind::SelfRelock);
    assert_eq!(infos.len(), 1);

    // Held stack followed by the offending attempt
    let path = &infos[0].lock_path;
    assert_eq!(path.len(), 3);
    assert!(path.iter().all(|loc| loc.starts_with("tests/self_relock.rs:")));
    assert_ne!(path[0], path[2]);
}
