//! Consumers of finished events.
//!
//! Everything downstream of the mappers is an [`InputListener`]. The reader pushes into a
//! [`QueuedInputListener`] while it holds its lock and flushes the batch, in order, once
//! the lock is released. Adapters compose on top:
//!
//! - [`FilteredListener`] forwards only events matching a predicate.
//! - [`LoggingListener`] logs each event through `tracing` and optionally forwards it.
//! - [`InputListenerBus`] fans out to several registered listeners with per-entry filters.
//!
//! # Conventions
//! - Listeners receive owned [`NotifyArgs`]; nothing is shared back with the sender.
//! - Order of delivery is the order of `notify` calls.

use crate::event::DeviceId;
use crate::notify::NotifyArgs;
use std::collections::BTreeMap;
use tracing::debug;

/// Receives finished events.
pub trait InputListener: Send {
    fn notify(&mut self, args: NotifyArgs);
}

impl<L: InputListener + ?Sized> InputListener for Box<L> {
    fn notify(&mut self, args: NotifyArgs) {
        (**self).notify(args)
    }
}

/// Batches events and flushes them to another listener in the order they were queued.
#[derive(Debug, Default)]
pub struct QueuedInputListener {
    queue: Vec<NotifyArgs>,
}

impl QueuedInputListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Direct access for producers that append to a `Vec`.
    pub(crate) fn queue_mut(&mut self) -> &mut Vec<NotifyArgs> {
        &mut self.queue
    }

    /// Hands every queued event to `inner`. Returns how many were flushed.
    pub fn flush(&mut self, inner: &mut dyn InputListener) -> usize {
        let n = self.queue.len();
        for args in self.queue.drain(..) {
            inner.notify(args);
        }
        n
    }
}

impl InputListener for QueuedInputListener {
    fn notify(&mut self, args: NotifyArgs) {
        self.queue.push(args);
    }
}

/// Wraps a listener and forwards only events accepted by a predicate.
pub struct FilteredListener {
    predicate: Box<dyn Fn(&NotifyArgs) -> bool + Send + Sync>,
    inner: Box<dyn InputListener>,
}

impl FilteredListener {
    pub fn new(
        predicate: impl Fn(&NotifyArgs) -> bool + Send + Sync + 'static,
        inner: Box<dyn InputListener>,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner,
        }
    }

    /// Forwards only events originating from `device_id`.
    pub fn for_device(device_id: DeviceId, inner: Box<dyn InputListener>) -> Self {
        Self::new(move |args| args.device_id() == Some(device_id), inner)
    }
}

impl InputListener for FilteredListener {
    fn notify(&mut self, args: NotifyArgs) {
        if (self.predicate)(&args) {
            self.inner.notify(args);
        }
    }
}

/// Logs every event at debug level, then forwards it if an inner listener is set.
#[derive(Default)]
pub struct LoggingListener {
    inner: Option<Box<dyn InputListener>>,
}

impl LoggingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap(inner: Box<dyn InputListener>) -> Self {
        Self { inner: Some(inner) }
    }
}

impl InputListener for LoggingListener {
    fn notify(&mut self, args: NotifyArgs) {
        match &args {
            NotifyArgs::Motion(m) => debug!(
                device_id = m.device_id,
                action = ?m.action,
                buttons = m.button_state.bits(),
                x = m.coords.x,
                y = m.coords.y,
                vscroll = m.coords.vscroll,
                hscroll = m.coords.hscroll,
                "motion"
            ),
            NotifyArgs::Key(k) => debug!(
                device_id = k.device_id,
                action = ?k.action,
                key = ?k.key_code,
                "key"
            ),
            NotifyArgs::DeviceReset { device_id, .. } => debug!(device_id, "device reset"),
            NotifyArgs::ConfigurationChanged { .. } => debug!("input configuration changed"),
        }
        if let Some(inner) = &mut self.inner {
            inner.notify(args);
        }
    }
}

/// Which kinds of events a bus entry wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    MotionOnly,
    KeysOnly,
    Custom(fn(&NotifyArgs) -> bool),
}

impl EventFilter {
    fn accepts(&self, args: &NotifyArgs) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::MotionOnly => matches!(args, NotifyArgs::Motion(_)),
            EventFilter::KeysOnly => matches!(args, NotifyArgs::Key(_)),
            EventFilter::Custom(f) => f(args),
        }
    }
}

struct ListenerEntry {
    listener: Box<dyn InputListener>,
    enabled: bool,
    filter: EventFilter,
    /// Only events from this device, if set. Lifecycle events without a device always pass.
    device: Option<DeviceId>,
}

/// Fan-out to registered listeners, each with its own filter and enable switch.
///
/// Entries are visited in registration order.
#[derive(Default)]
pub struct InputListenerBus {
    next_id: u64,
    listeners: BTreeMap<u64, ListenerEntry>,
}

impl InputListenerBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its handle.
    pub fn add_listener(
        &mut self,
        listener: impl InputListener + 'static,
        filter: EventFilter,
        device: Option<DeviceId>,
    ) -> u64 {
        let id = self.next_id;
        self.listeners.insert(
            id,
            ListenerEntry {
                listener: Box::new(listener),
                enabled: true,
                filter,
                device,
            },
        );
        self.next_id += 1;
        id
    }

    pub fn enable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = true;
        }
    }

    /// Mutes a listener without removing it.
    pub fn disable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = false;
        }
    }

    pub fn remove_listener(&mut self, id: u64) {
        self.listeners.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl InputListener for InputListenerBus {
    fn notify(&mut self, args: NotifyArgs) {
        for entry in self.listeners.values_mut() {
            if !entry.enabled || !entry.filter.accepts(&args) {
                continue;
            }
            if let (Some(wanted), Some(actual)) = (entry.device, args.device_id()) {
                if wanted != actual {
                    continue;
                }
            }
            entry.listener.notify(args.clone());
        }
    }
}
