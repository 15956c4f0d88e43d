use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(2);

/// Exits the process once it has been re-parented away from
/// `expected_parent`. Nothing is started for pids <= 1, nor on platforms
/// without a parent pid lookup.
pub fn spawn_parent_watchdog(expected_parent: Option<u32>) -> Option<JoinHandle<()>> {
    let expected = expected_parent.filter(|pid| *pid > 1)?;
    if !cfg!(unix) {
        warn!(
            "parent watchdog unsupported on this platform, ignoring expected_ppid={}",
            expected
        );
        return None;
    }
    info!("parent watchdog started expected_ppid={}", expected);

    Some(tokio::spawn(async move {
        let current = watch_parent(expected, WATCHDOG_INTERVAL, current_parent).await;
        warn!(
            "parent watchdog: expected ppid={}, got={}; exiting",
            expected, current
        );
        std::process::exit(0);
    }))
}

/// Polls `current` every `period` and returns the first parent pid that
/// differs from `expected`. Readings of `None` (unknown) are skipped.
pub async fn watch_parent<F>(expected: u32, period: Duration, mut current: F) -> u32
where
    F: FnMut() -> Option<u32>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match current() {
            Some(parent) if parent != expected => return parent,
            _ => {}
        }
    }
}

#[cfg(unix)]
fn current_parent() -> Option<u32> {
    Some(std::os::unix::process::parent_id())
}

#[cfg(not(unix))]
fn current_parent() -> Option<u32> {
    None
}
