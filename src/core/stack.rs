//! Call-stack capture for lock operations
//!
//! Stacks are informational only. Capture never fails: anything that goes wrong
//! degrades to an untrimmed or empty string.

use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicBool, Ordering};

/// Frames whose symbol contains this prefix belong to the detector itself
const OWN_FRAME_MARKER: &str = "lockwatch::core::";

static STACK_CAPTURE: AtomicBool = AtomicBool::new(true);

/// Turn stack capture on or off for subsequent lock operations
pub fn set_stack_capture(enabled: bool) {
    STACK_CAPTURE.store(enabled, Ordering::Relaxed);
}

/// Whether lock operations currently capture a stack
pub fn stack_capture_enabled() -> bool {
    STACK_CAPTURE.load(Ordering::Relaxed)
}

/// Capture the current call stack with the detector's own frames removed
///
/// Returns an empty string when capture is disabled.
pub fn capture_stack() -> String {
    if !stack_capture_enabled() {
        return String::new();
    }
    trim_own_frames(&Backtrace::force_capture().to_string())
}

/// Drop every frame up to and including the last detector frame
///
/// Backtraces render as numbered symbol lines, each optionally followed by an
/// indented `at file:line` line. If no detector frame is present the text is
/// returned as is.
pub(crate) fn trim_own_frames(stack: &str) -> String {
    let lines: Vec<&str> = stack.lines().collect();
    let Some(last_own) = lines
        .iter()
        .rposition(|line| line.contains(OWN_FRAME_MARKER) && !is_location_line(line))
    else {
        return stack.to_string();
    };

    let mut first_kept = last_own + 1;
    while first_kept < lines.len() && is_location_line(lines[first_kept]) {
        first_kept += 1;
    }

    lines[first_kept..].join("\n")
}

fn is_location_line(line: &str) -> bool {
    line.trim_start().starts_with("at ")
}
