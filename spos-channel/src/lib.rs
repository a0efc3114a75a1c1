// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Named crossbeam channels whose length and throughput are exported as prometheus metrics
#![warn(unused_crate_dependencies)]

use std::sync::Arc;

use receiver::SposReceiver;
use sender::SposSender;

pub mod receiver;
pub mod sender;

#[derive(Clone)]
pub struct SposChannel {}

impl SposChannel {
    /// Creates a bounded channel when `capacity` is set, unbounded otherwise.
    /// Metric names are derived from `name`, which should be unique per process.
    #[allow(clippy::new_ret_no_self)]
    pub fn new<T>(name: String, capacity: Option<usize>) -> (SposSender<T>, SposReceiver<T>) {
        use prometheus::{Counter, Gauge};
        use tracing::debug;

        let (s, r) = if let Some(capacity) = capacity {
            crossbeam::channel::bounded::<T>(capacity)
        } else {
            crossbeam::channel::unbounded::<T>()
        };

        let metric_name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        // current number of queued messages
        let actual_len = Gauge::new(
            format!("{}_channel_actual_size", metric_name),
            "Actual length of channel",
        )
        .expect("Failed to create gauge");

        let received = Counter::new(
            format!("{}_channel_total_receive", metric_name),
            "Total received messages",
        )
        .expect("Failed to create counter");

        // several nodes of the same process (tests) share names: keep the first registration
        if let Err(e) = prometheus::register(Box::new(actual_len.clone())) {
            debug!("actual_len gauge for {} not registered: {}", name, e);
        }
        if let Err(e) = prometheus::register(Box::new(received.clone())) {
            debug!("received counter for {} not registered: {}", name, e);
        }

        let sender = SposSender {
            sender: s,
            name: name.clone(),
            actual_len: actual_len.clone(),
        };

        let receiver = SposReceiver {
            receiver: r,
            name,
            actual_len,
            received,
            ref_counter: Arc::new(()),
        };

        (sender, receiver)
    }
}
