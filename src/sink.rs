//! Completion delivery.
//!
//! Workers hand every finished load to a [`CompletionSink`]. The pool holds
//! the sink behind a mutex, so `deliver` is never entered concurrently.
//! [`completion_channel`] gives the usual setup: the sink half lives in the
//! pool, the receiver is drained on the consumer's own thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use tracing::trace;

use crate::request::LoadCompleted;

/// Receives completed loads from worker threads.
pub trait CompletionSink<K, I>: Send {
    fn deliver(&mut self, completed: LoadCompleted<K, I>);
}

impl<K, I, F> CompletionSink<K, I> for F
where
    F: FnMut(LoadCompleted<K, I>) + Send,
{
    fn deliver(&mut self, completed: LoadCompleted<K, I>) {
        self(completed)
    }
}

/// Sink half of a completion channel.
pub struct ChannelSink<K, I> {
    tx: Sender<LoadCompleted<K, I>>,
}

impl<K: Send, I: Send> CompletionSink<K, I> for ChannelSink<K, I> {
    fn deliver(&mut self, completed: LoadCompleted<K, I>) {
        // A dropped receiver means nobody wants results any more.
        if self.tx.send(completed).is_err() {
            trace!("completion receiver dropped, discarding result");
        }
    }
}

/// Consumer half of a completion channel.
pub struct CompletionReceiver<K, I> {
    rx: Receiver<LoadCompleted<K, I>>,
}

impl<K, I> CompletionReceiver<K, I> {
    /// Block until the next completion. `None` once the loader is gone and
    /// every result has been received.
    pub fn recv(&self) -> Option<LoadCompleted<K, I>> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<LoadCompleted<K, I>> {
        match self.rx.try_recv() {
            Ok(completed) => Some(completed),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoadCompleted<K, I>> {
        match self.rx.recv_timeout(timeout) {
            Ok(completed) => Some(completed),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drain everything delivered so far without blocking.
    pub fn try_iter(&self) -> impl Iterator<Item = LoadCompleted<K, I>> + '_ {
        self.rx.try_iter()
    }
}

/// Create a connected sink/receiver pair.
pub fn completion_channel<K, I>() -> (ChannelSink<K, I>, CompletionReceiver<K, I>) {
    let (tx, rx) = mpsc::channel();
    (ChannelSink { tx }, CompletionReceiver { rx })
}
