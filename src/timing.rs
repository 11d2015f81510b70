use std::time::{Duration, Instant};

use serde_json::json;

use crate::ui::prelude::*;

/// Run `op` and return its result together with the wall-clock time it took.
pub fn measure<T>(op: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let result = op();
    (result, start.elapsed())
}

/// Run `op`, report how long it took under `label`, and hand back its result
/// untouched. The report is emitted whether `op` succeeded or failed.
pub fn timed<T>(label: &str, op: impl FnOnce() -> T) -> T {
    let (result, elapsed) = measure(op);
    emit(
        Level::Info,
        "timing.operation",
        &format_elapsed(label, elapsed),
        Some(json!({
            "operation": label,
            "elapsed_secs": elapsed.as_secs_f64(),
        })),
    );
    result
}

fn format_elapsed(label: &str, elapsed: Duration) -> String {
    format!("{} completed in {:.6} seconds", label, elapsed.as_secs_f64())
}
