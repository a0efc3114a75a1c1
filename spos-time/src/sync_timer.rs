// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::{SposTime, TimeError};
use crossbeam_channel::{after, bounded, select, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Wall clock corrected by a drift offset
pub trait SyncTimer: Send + Sync {
    /// Cached drift between the local clock and the reference clock, in milliseconds
    fn clock_offset(&self) -> i64;

    /// Local time corrected by the cached offset
    fn current_time(&self) -> SposTime {
        SposTime::now().apply_offset(self.clock_offset())
    }

    /// `current_time` formatted as `YYYY-MM-DD hh:mm:ss.nnnnnnnnn`
    fn formatted_current_time(&self) -> String {
        self.current_time().format_instant()
    }
}

/// A reference clock that can tell how far the local clock drifted
pub trait TimeQuery: Send + Sync {
    /// Returns `reference - local` in milliseconds
    fn query_offset(&self) -> Result<i64, TimeError>;
}

/// `SyncTimer` whose offset is refreshed from a `TimeQuery` on a background thread.
/// Any failed query resets the offset to zero so the node falls back to its local clock.
pub struct NtpSyncTimer {
    offset: Arc<RwLock<i64>>,
    query: Arc<dyn TimeQuery>,
    refresh_period: Duration,
}

/// Handle on the refresh thread started by `NtpSyncTimer::start_sync`
pub struct NtpSyncHandle {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl NtpSyncHandle {
    /// Stops the refresh thread and waits for it
    pub fn stop(mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.join() {
                warn!("ntp sync thread panicked: {:?}", err);
            }
        }
    }
}

impl NtpSyncTimer {
    /// Creates a timer with a zero offset. Call `start_sync` to begin refreshing.
    pub fn new(query: Arc<dyn TimeQuery>, refresh_period: SposTime) -> Self {
        NtpSyncTimer {
            offset: Arc::new(RwLock::new(0)),
            query,
            refresh_period: refresh_period.to_duration(),
        }
    }

    /// Queries the reference clock once and stores the result.
    /// Returns the offset now in use.
    pub fn refresh(&self) -> i64 {
        refresh_offset(&*self.query, &self.offset)
    }

    /// Spawns the background thread that refreshes the offset every `refresh_period`
    pub fn start_sync(&self) -> Result<NtpSyncHandle, TimeError> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let offset = self.offset.clone();
        let query = self.query.clone();
        let period = self.refresh_period;
        let handle = std::thread::Builder::new()
            .name("ntp-sync".into())
            .spawn(move || loop {
                refresh_offset(&*query, &offset);
                select! {
                    recv(stop_rx) -> _ => {
                        debug!("ntp sync thread stopping");
                        break;
                    },
                    recv(after(period)) -> _ => {}
                }
            })
            .map_err(|err| TimeError::ThreadError(err.to_string()))?;
        Ok(NtpSyncHandle {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }
}

fn refresh_offset(query: &dyn TimeQuery, offset: &RwLock<i64>) -> i64 {
    let new_offset = match query.query_offset() {
        Ok(value) => value,
        Err(err) => {
            warn!("time source unavailable, falling back to local clock: {}", err);
            0
        }
    };
    let mut guard = offset.write();
    if *guard != new_offset {
        info!("clock offset updated from {}ms to {}ms", *guard, new_offset);
    }
    *guard = new_offset;
    new_offset
}

impl SyncTimer for NtpSyncTimer {
    fn clock_offset(&self) -> i64 {
        *self.offset.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedQuery {
        answers: Vec<Result<i64, TimeError>>,
        calls: AtomicUsize,
    }

    impl TimeQuery for ScriptedQuery {
        fn query_offset(&self) -> Result<i64, TimeError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .get(i)
                .cloned()
                .unwrap_or(Err(TimeError::TimeSourceError("exhausted".into())))
        }
    }

    #[test]
    fn test_failed_query_resets_offset() {
        let query = Arc::new(ScriptedQuery {
            answers: vec![
                Ok(250),
                Err(TimeError::TimeSourceError("timeout".into())),
            ],
            calls: AtomicUsize::new(0),
        });
        let timer = NtpSyncTimer::new(query, SposTime::from_millis(1000));
        assert_eq!(timer.refresh(), 250);
        assert_eq!(timer.clock_offset(), 250);
        assert_eq!(timer.refresh(), 0);
        assert_eq!(timer.clock_offset(), 0);
    }

    #[test]
    fn test_current_time_applies_offset() {
        let query = Arc::new(ScriptedQuery {
            answers: vec![Ok(60_000)],
            calls: AtomicUsize::new(0),
        });
        let timer = NtpSyncTimer::new(query, SposTime::from_millis(1000));
        timer.refresh();
        let local = SposTime::now();
        let synced = timer.current_time();
        assert!(synced.signed_diff(local) >= 59_900);
    }

    #[test]
    fn test_background_refresh_stops() {
        let query = Arc::new(ScriptedQuery {
            answers: vec![Ok(10), Ok(20), Ok(30)],
            calls: AtomicUsize::new(0),
        });
        let timer = NtpSyncTimer::new(query.clone(), SposTime::from_millis(5));
        let handle = timer.start_sync().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        handle.stop();
        let calls = query.calls.load(Ordering::SeqCst);
        assert!(calls >= 2);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(query.calls.load(Ordering::SeqCst), calls);
    }
}
