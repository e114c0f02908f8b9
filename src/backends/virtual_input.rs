//! Programmatic device source.
//!
//! [`VirtualEventSource`] is the receiving half handed to the reader; any number of cloned
//! [`VirtualFeeder`]s inject batches from other threads. Each feeder call that produces
//! raw input closes its window with `SYN_REPORT`, so a batch is always a whole window.

use super::DeviceSource;
use crate::device::DeviceDescriptor;
use crate::error::{InputError, Result};
use crate::event::{
    now, DeviceId, Nsecs, RawEvent, SourceEvent, EV_KEY, EV_REL, REL_HWHEEL, REL_WHEEL, REL_X,
    REL_Y,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Receiving half; owned by the reader.
pub struct VirtualEventSource {
    rx: Receiver<Vec<SourceEvent>>,
}

/// Sending half. Cheap to clone.
#[derive(Clone)]
pub struct VirtualFeeder {
    tx: Sender<Vec<SourceEvent>>,
}

impl VirtualEventSource {
    /// Creates a connected source/feeder pair.
    pub fn new() -> (Self, VirtualFeeder) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { rx }, VirtualFeeder { tx })
    }
}

impl DeviceSource for VirtualEventSource {
    fn read_batch(&mut self, timeout: Duration) -> Result<Vec<SourceEvent>> {
        let mut batch = match self.rx.recv_timeout(timeout) {
            Ok(batch) => batch,
            Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(InputError::Source("all virtual feeders dropped".into()))
            }
        };
        // Drain whatever else is already queued; order is preserved.
        while let Ok(more) = self.rx.try_recv() {
            batch.extend(more);
        }
        Ok(batch)
    }
}

impl VirtualFeeder {
    /// Sends a batch as-is.
    pub fn send(&self, batch: Vec<SourceEvent>) -> Result<()> {
        self.tx
            .send(batch)
            .map_err(|_| InputError::Source("virtual source dropped".into()))
    }

    pub fn add_device(&self, descriptor: DeviceDescriptor) -> Result<()> {
        self.send(vec![SourceEvent::DeviceAdded {
            when: now(),
            descriptor,
        }])
    }

    pub fn remove_device(&self, device_id: DeviceId) -> Result<()> {
        self.send(vec![SourceEvent::DeviceRemoved {
            when: now(),
            device_id,
        }])
    }

    /// Sends one window of `(type, code, value)` tuples stamped `when`, followed by `SYN_REPORT`.
    pub fn window_at(
        &self,
        when: Nsecs,
        device_id: DeviceId,
        events: &[(u16, u16, i32)],
    ) -> Result<()> {
        let mut batch: Vec<SourceEvent> = events
            .iter()
            .map(|&(kind, code, value)| RawEvent::new(when, device_id, kind, code, value).into())
            .collect();
        batch.push(RawEvent::sync(when, device_id).into());
        self.send(batch)
    }

    /// Like [`window_at`](Self::window_at), stamped with the current time.
    pub fn window(&self, device_id: DeviceId, events: &[(u16, u16, i32)]) -> Result<()> {
        self.window_at(now(), device_id, events)
    }

    pub fn move_by(&self, device_id: DeviceId, dx: i32, dy: i32) -> Result<()> {
        self.window(device_id, &[(EV_REL, REL_X, dx), (EV_REL, REL_Y, dy)])
    }

    pub fn press(&self, device_id: DeviceId, button: u16) -> Result<()> {
        self.window(device_id, &[(EV_KEY, button, 1)])
    }

    pub fn release(&self, device_id: DeviceId, button: u16) -> Result<()> {
        self.window(device_id, &[(EV_KEY, button, 0)])
    }

    pub fn scroll(&self, device_id: DeviceId, vertical: i32, horizontal: i32) -> Result<()> {
        self.window(
            device_id,
            &[(EV_REL, REL_WHEEL, vertical), (EV_REL, REL_HWHEEL, horizontal)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{BTN_LEFT, SYN_REPORT};

    #[test]
    fn batches_are_drained_in_order() {
        let (mut source, feeder) = VirtualEventSource::new();
        feeder.add_device(DeviceDescriptor::mouse(1, "m")).unwrap();
        feeder.window_at(5, 1, &[(EV_REL, REL_X, 3)]).unwrap();
        feeder.press(1, BTN_LEFT).unwrap();

        let batch = source.read_batch(Duration::from_millis(10)).unwrap();
        assert_eq!(batch.len(), 5);
        assert!(matches!(batch[0], SourceEvent::DeviceAdded { .. }));
        match (&batch[1], &batch[2]) {
            (SourceEvent::Raw(a), SourceEvent::Raw(b)) => {
                assert_eq!((a.when, a.code, a.value), (5, REL_X, 3));
                assert_eq!(b.code, SYN_REPORT);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn timeout_yields_empty_batch() {
        let (mut source, _feeder) = VirtualEventSource::new();
        assert!(source.read_batch(Duration::from_millis(1)).unwrap().is_empty());
    }

    #[test]
    fn dropped_feeders_end_the_source() {
        let (mut source, feeder) = VirtualEventSource::new();
        drop(feeder);
        assert!(matches!(
            source.read_batch(Duration::from_millis(1)),
            Err(InputError::Source(_))
        ));
    }
}
