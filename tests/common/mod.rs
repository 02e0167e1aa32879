use lockwatch::{DeadlockInfo, DeadlockKind, Lockwatch};
use std::sync::{Arc, Mutex as StdMutex, mpsc};
use std::time::Duration;

#[allow(dead_code)]
pub const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(3);
#[allow(dead_code)]
pub const NO_DEADLOCK_TIMEOUT: Duration = Duration::from_millis(500);

pub type Report = (DeadlockKind, Vec<DeadlockInfo>);

pub struct DetectorHarness {
    pub rx: mpsc::Receiver<Report>,
    pub detected: Arc<StdMutex<bool>>,
}

#[allow(dead_code)]
pub fn start_detector() -> DetectorHarness {
    start_with(Lockwatch::new())
}

/// Start detection from a partially configured builder; the callback is replaced
#[allow(dead_code)]
pub fn start_with(builder: Lockwatch) -> DetectorHarness {
    let (tx, rx) = mpsc::channel::<Report>();
    let detected = Arc::new(StdMutex::new(false));
    let flag = Arc::clone(&detected);

    builder
        .callback(move |kind, infos| {
            *flag.lock().unwrap() = true;
            let _ = tx.send((kind, infos));
        })
        .start()
        .expect("Failed to initialize detector");

    DetectorHarness { rx, detected }
}

#[allow(dead_code)]
pub fn expect_deadlock(h: &DetectorHarness, timeout: Duration) -> Report {
    match h.rx.recv_timeout(timeout) {
        Ok(report) => {
            assert!(*h.detected.lock().unwrap(), "Deadlock flag should be set");
            report
        }
        Err(_) => panic!("No deadlock detected within {timeout:?}"),
    }
}

#[allow(dead_code)]
pub fn assert_no_deadlock(h: &DetectorHarness, timeout: Duration) {
    assert!(
        h.rx.recv_timeout(timeout).is_err(),
        "Unexpected deadlock detected"
    );
    assert!(
        !*h.detected.lock().unwrap(),
        "Deadlock flag should not be set"
    );
}
