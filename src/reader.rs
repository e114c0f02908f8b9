//! The reader: device table, raw event routing and configuration refresh.
//!
//! [`InputReader`] is owned by the reader thread. Each [`loop_once`](InputReader::loop_once)
//! applies pending configuration, waits once on the [`DeviceSource`], routes the batch to
//! the devices it names, and flushes everything the mappers produced to the downstream
//! [`InputListener`] in synthesis order.
//!
//! Other threads interact through a cloneable [`ReaderHandle`]: they can request a
//! configuration refresh (applied by the reader thread on its next loop), queue new device
//! properties, query button state and take diagnostic snapshots. Queries read under the
//! reader lock; they never call into a mapper's mutating operations.
//!
//! The lock is held while a batch is routed and released before the source wait and
//! before events are flushed downstream.

use crate::backends::DeviceSource;
use crate::config::{ConfigurationChanges, DeviceConfiguration, InputReaderConfiguration};
use crate::device::{DeviceClasses, DeviceDescriptor, InputDevice};
use crate::error::{InputError, Result};
use crate::event::{now, DeviceId, Nsecs, RawEvent, SourceEvent};
use crate::listener::{InputListener, QueuedInputListener};
use crate::mapper::KeyState;
use crate::metadata::DeviceIdentifier;
use crate::notify::{NotifyArgs, Source};
use crate::pointer::PointerController;
use crate::snapshot::{ConfigurationSummary, ReaderSnapshot};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Host-side hooks the reader consults.
pub trait InputReaderPolicy: Send + Sync {
    /// Current configuration bundle. Called at startup and on every refresh.
    fn reader_configuration(&self) -> InputReaderConfiguration;

    /// Pointer controller for a cursor device, if the display side has one.
    fn obtain_pointer_controller(
        &self,
        _device_id: DeviceId,
    ) -> Option<Arc<dyn PointerController>> {
        None
    }

    /// Properties for a device whose source did not supply any.
    fn device_configuration(&self, _identifier: &DeviceIdentifier) -> DeviceConfiguration {
        DeviceConfiguration::default()
    }
}

/// Policy backed by values the host sets directly.
///
/// One pointer controller is shared by every cursor device. Per-device properties come from
/// `<config_dir>/<identifier.config_file_name()>` when a directory is set.
#[derive(Default)]
pub struct SimpleReaderPolicy {
    configuration: Mutex<InputReaderConfiguration>,
    pointer_controller: Option<Arc<dyn PointerController>>,
    config_dir: Option<PathBuf>,
}

impl SimpleReaderPolicy {
    pub fn new(configuration: InputReaderConfiguration) -> Self {
        Self {
            configuration: Mutex::new(configuration),
            ..Self::default()
        }
    }

    pub fn with_pointer_controller(mut self, controller: Arc<dyn PointerController>) -> Self {
        self.pointer_controller = Some(controller);
        self
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Edits the bundle. Follow with [`ReaderHandle::request_refresh_configuration`] naming
    /// the fields that changed.
    pub fn update(&self, f: impl FnOnce(&mut InputReaderConfiguration)) {
        f(&mut self.configuration.lock());
    }
}

impl InputReaderPolicy for SimpleReaderPolicy {
    fn reader_configuration(&self) -> InputReaderConfiguration {
        self.configuration.lock().clone()
    }

    fn obtain_pointer_controller(
        &self,
        _device_id: DeviceId,
    ) -> Option<Arc<dyn PointerController>> {
        self.pointer_controller.clone()
    }

    fn device_configuration(&self, identifier: &DeviceIdentifier) -> DeviceConfiguration {
        let Some(dir) = &self.config_dir else {
            return DeviceConfiguration::default();
        };
        match DeviceConfiguration::find(dir, identifier) {
            Ok(Some(configuration)) => {
                debug!(%identifier, "loaded device configuration");
                configuration
            }
            Ok(None) => DeviceConfiguration::default(),
            Err(e) => {
                warn!(%identifier, error = %e, "bad device configuration, using defaults");
                DeviceConfiguration::default()
            }
        }
    }
}

/// Reader state shared with [`ReaderHandle`]s.
struct ReaderState {
    config: InputReaderConfiguration,
    pending_changes: ConfigurationChanges,
    pending_device_configs: Vec<(DeviceId, DeviceConfiguration)>,
    devices: BTreeMap<DeviceId, InputDevice>,
}

impl ReaderState {
    fn apply_pending(
        &mut self,
        when: Nsecs,
        policy: &dyn InputReaderPolicy,
        out: &mut Vec<NotifyArgs>,
    ) {
        for (device_id, configuration) in std::mem::take(&mut self.pending_device_configs) {
            let Some(device) = self.devices.get_mut(&device_id) else {
                warn!(device_id, "device went away before its configuration was applied");
                continue;
            };
            device.set_configuration(configuration);
            if device.configure(when, &self.config, ConfigurationChanges::MUST_REOPEN) {
                out.push(NotifyArgs::DeviceReset {
                    event_time: when,
                    device_id,
                });
            }
        }

        let changes = std::mem::take(&mut self.pending_changes);
        if changes.is_empty() {
            return;
        }
        self.config = policy.reader_configuration();
        debug!(?changes, "refreshing reader configuration");
        for (&device_id, device) in &mut self.devices {
            if device.configure(when, &self.config, changes) {
                out.push(NotifyArgs::DeviceReset {
                    event_time: when,
                    device_id,
                });
            }
        }
    }

    fn process_events(
        &mut self,
        events: &[SourceEvent],
        policy: &dyn InputReaderPolicy,
        out: &mut Vec<NotifyArgs>,
    ) {
        // Consecutive raw events of one device are routed together.
        let mut run: Vec<RawEvent> = Vec::new();
        for event in events {
            match event {
                SourceEvent::Raw(raw) => {
                    if run.last().is_some_and(|r| r.device_id != raw.device_id) {
                        self.process_run(&run, out);
                        run.clear();
                    }
                    run.push(*raw);
                }
                SourceEvent::DeviceAdded { when, descriptor } => {
                    self.process_run(&run, out);
                    run.clear();
                    self.add_device(*when, descriptor.clone(), policy, out);
                }
                SourceEvent::DeviceRemoved { when, device_id } => {
                    self.process_run(&run, out);
                    run.clear();
                    self.remove_device(*when, *device_id, out);
                }
            }
        }
        self.process_run(&run, out);
    }

    fn process_run(&mut self, run: &[RawEvent], out: &mut Vec<NotifyArgs>) {
        let Some(first) = run.first() else {
            return;
        };
        match self.devices.get_mut(&first.device_id) {
            Some(device) if !device.is_ignored() => device.process(run, out),
            Some(_) => {}
            None => warn!(
                device_id = first.device_id,
                count = run.len(),
                "discarding events for unknown device"
            ),
        }
    }

    fn add_device(
        &mut self,
        when: Nsecs,
        descriptor: DeviceDescriptor,
        policy: &dyn InputReaderPolicy,
        out: &mut Vec<NotifyArgs>,
    ) {
        let id = descriptor.id;
        if self.devices.contains_key(&id) {
            warn!(device_id = id, "device id already in use, ignoring added device");
            return;
        }

        let configuration = descriptor
            .configuration
            .clone()
            .unwrap_or_else(|| policy.device_configuration(&descriptor.identifier));
        let pointer_controller = if descriptor.classes.contains(DeviceClasses::CURSOR) {
            policy.obtain_pointer_controller(id)
        } else {
            None
        };

        let mut device = InputDevice::new(descriptor, configuration, pointer_controller);
        device.configure(when, &self.config, ConfigurationChanges::empty());
        device.reset(when, out);

        if device.is_ignored() {
            info!(
                device_id = id,
                identifier = %device.identifier(),
                "device added (ignored, no mappers)"
            );
        } else {
            info!(
                device_id = id,
                identifier = %device.identifier(),
                sources = device.sources().bits(),
                "device added"
            );
        }
        self.devices.insert(id, device);
        out.push(NotifyArgs::ConfigurationChanged { event_time: when });
    }

    fn remove_device(&mut self, when: Nsecs, device_id: DeviceId, out: &mut Vec<NotifyArgs>) {
        let Some(mut device) = self.devices.remove(&device_id) else {
            warn!(device_id, "removal of unknown device");
            return;
        };
        info!(device_id, identifier = %device.identifier(), "device removed");
        if !device.is_ignored() {
            device.reset(when, out);
        }
        out.push(NotifyArgs::ConfigurationChanged { event_time: when });
    }
}

/// Owns the device source, the devices and the downstream listener.
pub struct InputReader {
    source: Box<dyn DeviceSource>,
    policy: Arc<dyn InputReaderPolicy>,
    shared: Arc<Mutex<ReaderState>>,
    queued: QueuedInputListener,
    listener: Box<dyn InputListener>,
}

impl InputReader {
    pub fn new(
        source: impl DeviceSource + 'static,
        policy: Arc<dyn InputReaderPolicy>,
        listener: impl InputListener + 'static,
    ) -> Self {
        let config = policy.reader_configuration();
        Self {
            source: Box::new(source),
            policy,
            shared: Arc::new(Mutex::new(ReaderState {
                config,
                pending_changes: ConfigurationChanges::empty(),
                pending_device_configs: Vec::new(),
                devices: BTreeMap::new(),
            })),
            queued: QueuedInputListener::new(),
            listener: Box::new(listener),
        }
    }

    pub fn handle(&self) -> ReaderHandle {
        ReaderHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// One reader iteration. Returns how many events went downstream.
    ///
    /// A source error is returned as-is; the devices keep their state.
    pub fn loop_once(&mut self, timeout: Duration) -> Result<usize> {
        self.shared
            .lock()
            .apply_pending(now(), &*self.policy, self.queued.queue_mut());
        let mut flushed = self.queued.flush(&mut *self.listener);

        let events = self.source.read_batch(timeout)?;
        if !events.is_empty() {
            self.shared
                .lock()
                .process_events(&events, &*self.policy, self.queued.queue_mut());
            flushed += self.queued.flush(&mut *self.listener);
        }
        Ok(flushed)
    }

    /// Resets every device, discarding partially accumulated windows.
    pub fn reset_devices(&mut self) -> usize {
        let when = now();
        {
            let mut state = self.shared.lock();
            let out = self.queued.queue_mut();
            for device in state.devices.values_mut() {
                if !device.is_ignored() {
                    device.reset(when, out);
                }
            }
        }
        self.queued.flush(&mut *self.listener)
    }
}

/// Control-side view of a reader. Cheap to clone; usable from any thread.
#[derive(Clone)]
pub struct ReaderHandle {
    shared: Arc<Mutex<ReaderState>>,
}

impl ReaderHandle {
    /// Asks the reader to re-read the policy configuration and apply `changes` on its next
    /// loop. Requests accumulate until applied; an empty mask is ignored.
    pub fn request_refresh_configuration(&self, changes: ConfigurationChanges) {
        if changes.is_empty() {
            return;
        }
        self.shared.lock().pending_changes |= changes;
    }

    /// Queues new properties for an attached device; the reader applies them as a full
    /// reconfiguration on its next loop.
    pub fn update_device_configuration(
        &self,
        device_id: DeviceId,
        configuration: DeviceConfiguration,
    ) -> Result<()> {
        let mut state = self.shared.lock();
        if !state.devices.contains_key(&device_id) {
            return Err(InputError::DeviceNotFound(device_id));
        }
        state.pending_device_configs.push((device_id, configuration));
        Ok(())
    }

    /// Up/down state of a button on one device.
    pub fn get_scan_code_state(
        &self,
        device_id: DeviceId,
        source_mask: Source,
        scan_code: u16,
    ) -> Result<KeyState> {
        let state = self.shared.lock();
        let device = state
            .devices
            .get(&device_id)
            .ok_or(InputError::DeviceNotFound(device_id))?;
        Ok(device.scan_code_state(source_mask, scan_code))
    }

    /// Up/down state of a button across all devices; `Down` if any device has it down.
    pub fn get_scan_code_state_any(&self, source_mask: Source, scan_code: u16) -> KeyState {
        let state = self.shared.lock();
        let mut result = KeyState::Unknown;
        for device in state.devices.values() {
            match device.scan_code_state(source_mask, scan_code) {
                KeyState::Down => return KeyState::Down,
                KeyState::Up => result = KeyState::Up,
                KeyState::Unknown => {}
            }
        }
        result
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.shared.lock().devices.keys().copied().collect()
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        let state = self.shared.lock();
        ReaderSnapshot {
            configuration: ConfigurationSummary::from(&state.config),
            pending_changes: state.pending_changes.bits(),
            devices: state.devices.values().map(InputDevice::dump).collect(),
        }
    }
}
