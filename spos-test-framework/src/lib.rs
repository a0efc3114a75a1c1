// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Helpers shared by the tests of the consensus crates

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::filter::LevelFilter;

/// Prints the traces of the test at debug level. Safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::prelude::*;
    let tracing_layer = tracing_subscriber::fmt::layer()
        .with_test_writer()
        .with_filter(LevelFilter::DEBUG);
    let _ = tracing_subscriber::registry().with(tracing_layer).try_init();
}

/// Polls `condition` every `period` until it holds or `timeout` elapses.
/// Returns whether the condition held.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, period: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(period);
    }
}

/// One-shot rendezvous between a test and the thread it drives
pub struct Breakpoint {
    mutex: Mutex<bool>,
    condvar: Condvar,
}

impl Default for Breakpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Breakpoint {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until `trigger` is called or `timeout` elapses. Returns whether it was triggered.
    pub fn wait(&self, timeout: Duration) -> bool {
        let started = self.mutex.lock().unwrap();
        let (started, _) = self
            .condvar
            .wait_timeout_while(started, timeout, |started| !*started)
            .unwrap();
        *started
    }

    pub fn trigger(&self) {
        let mut started = self.mutex.lock().unwrap();
        *started = true;
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_breakpoint_releases_waiter() {
        let breakpoint = Arc::new(Breakpoint::new());
        let remote = breakpoint.clone();
        let handle = std::thread::spawn(move || remote.trigger());
        assert!(breakpoint.wait(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_until_times_out() {
        assert!(!wait_until(Duration::from_millis(20), Duration::from_millis(5), || false));
        let mut calls = 0;
        assert!(wait_until(Duration::from_secs(1), Duration::from_millis(1), || {
            calls += 1;
            calls == 3
        }));
    }
}
