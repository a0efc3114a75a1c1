// Copyright (c) 2022 MASSA LABS <info@massa.net>
use std::{ops::Deref, time::Duration};

use crossbeam::channel::{SendError, SendTimeoutError, Sender, TrySendError};
use prometheus::Gauge;

#[derive(Clone, Debug)]
pub struct SposSender<T> {
    pub(crate) sender: Sender<T>,
    pub(crate) name: String,
    /// channel size
    pub(crate) actual_len: Gauge,
}

impl<T> SposSender<T> {
    /// Send a message to the channel, blocking while it is full
    pub fn send(&self, msg: T) -> Result<(), SendError<T>> {
        self.sender.send(msg)?;
        self.actual_len.set(self.sender.len() as f64);
        Ok(())
    }

    pub fn send_timeout(&self, msg: T, duration: Duration) -> Result<(), SendTimeoutError<T>> {
        self.sender.send_timeout(msg, duration)?;
        self.actual_len.set(self.sender.len() as f64);
        Ok(())
    }

    /// Non-blocking send. On a capacity-1 channel this is a coalescing pulse.
    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        self.sender.try_send(msg)?;
        self.actual_len.set(self.sender.len() as f64);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Deref for SposSender<T> {
    type Target = Sender<T>;

    fn deref(&self) -> &Self::Target {
        &self.sender
    }
}
