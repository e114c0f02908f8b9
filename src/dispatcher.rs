//! The dispatcher side of the reader → dispatcher handoff.
//!
//! The reader posts finished events through a [`DispatcherHandle`] into a bounded
//! `crossbeam-channel` queue; the [`InputDispatcher`] thread pops them in FIFO order and
//! hands them to a [`DispatchSink`], which stands in for window delivery.
//!
//! The handoff is strictly one-way. Posting never waits indefinitely:
//!
//! 1. `try_send` on the queue;
//! 2. when full, `send_timeout` for the configured post timeout;
//! 3. when still full, the event is dropped and counted, with a `warn!`.
//!
//! A single consumer preserves the posting order, so events of one device reach the sink
//! in synthesis order.

use crate::listener::InputListener;
use crate::notify::NotifyArgs;
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Final consumer of dispatched events. Runs on the dispatcher thread.
pub trait DispatchSink: Send {
    fn deliver(&mut self, args: NotifyArgs);
}

/// Delivers to an [`InputListener`] (a bus, a logger, ...) on the dispatcher thread.
pub struct ListenerSink<L>(pub L);

impl<L: InputListener> DispatchSink for ListenerSink<L> {
    fn deliver(&mut self, args: NotifyArgs) {
        self.0.notify(args);
    }
}

impl<S: DispatchSink + ?Sized> DispatchSink for Box<S> {
    fn deliver(&mut self, args: NotifyArgs) {
        (**self).deliver(args)
    }
}

/// Sink that keeps everything it receives. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<NotifyArgs>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Copy of everything delivered so far.
    pub fn events(&self) -> Vec<NotifyArgs> {
        self.events.lock().clone()
    }

    /// Removes and returns everything delivered so far.
    pub fn take(&self) -> Vec<NotifyArgs> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl DispatchSink for CollectingSink {
    fn deliver(&mut self, args: NotifyArgs) {
        self.events.lock().push(args);
    }
}

/// Post side of the queue. Owned by the reader as its downstream listener.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: Sender<NotifyArgs>,
    post_timeout: Duration,
    dropped: Arc<AtomicU64>,
}

impl DispatcherHandle {
    /// Events dropped because the queue stayed full past the post timeout.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Fire-and-forget post.
    pub fn post(&self, args: NotifyArgs) {
        let args = match self.tx.try_send(args) {
            Ok(()) => return,
            Err(TrySendError::Full(args)) => args,
            Err(TrySendError::Disconnected(args)) => {
                warn!(device_id = ?args.device_id(), "dispatcher gone, dropping event");
                return;
            }
        };
        match self.tx.send_timeout(args, self.post_timeout) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(args)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    device_id = ?args.device_id(),
                    timeout_ms = self.post_timeout.as_millis() as u64,
                    total,
                    "dispatcher queue full, dropping event"
                );
            }
            Err(SendTimeoutError::Disconnected(args)) => {
                warn!(device_id = ?args.device_id(), "dispatcher gone, dropping event");
            }
        }
    }
}

impl InputListener for DispatcherHandle {
    fn notify(&mut self, args: NotifyArgs) {
        self.post(args);
    }
}

/// Consumer side: the queue and the sink, run by the dispatcher thread.
pub struct InputDispatcher {
    rx: Receiver<NotifyArgs>,
    sink: Box<dyn DispatchSink>,
    delivered: u64,
}

impl InputDispatcher {
    /// Creates the queue with room for `capacity` events.
    pub fn new(
        capacity: usize,
        post_timeout: Duration,
        sink: impl DispatchSink + 'static,
    ) -> (Self, DispatcherHandle) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (
            Self {
                rx,
                sink: Box::new(sink),
                delivered: 0,
            },
            DispatcherHandle {
                tx,
                post_timeout,
                dropped: Arc::new(AtomicU64::new(0)),
            },
        )
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Delivers at most one event, waiting up to `timeout`. Returns `false` on timeout or
    /// when every handle is gone.
    pub fn dispatch_once(&mut self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(args) => {
                self.deliver(args);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Delivers everything already queued without waiting.
    pub fn drain(&mut self) -> usize {
        let mut n = 0;
        while let Ok(args) = self.rx.try_recv() {
            self.deliver(args);
            n += 1;
        }
        n
    }

    /// Dispatcher thread body: deliver until `stop` is set, then drain what is queued.
    pub(crate) fn run(&mut self, stop: &AtomicBool, poll: Duration) {
        loop {
            match self.rx.recv_timeout(poll) {
                Ok(args) => self.deliver(args),
                Err(RecvTimeoutError::Timeout) => {
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        let drained = self.drain();
        debug!(drained, delivered = self.delivered, "dispatcher loop finished");
    }

    fn deliver(&mut self, args: NotifyArgs) {
        if let NotifyArgs::DeviceReset { device_id, .. } = &args {
            debug!(device_id, "device reset reached dispatcher");
        }
        self.delivered += 1;
        self.sink.deliver(args);
    }
}
