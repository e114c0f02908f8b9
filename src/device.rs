//! Per-device sessions.
//!
//! An [`InputDevice`] exists from the moment its source reports it until it is removed.
//! It owns the device's mappers (chosen once from its [`DeviceClasses`]) and the
//! [`DeviceContext`] they read capabilities and configuration from.
//!
//! The device also guards the stream itself: after a `SYN_DROPPED` marker it resets every
//! mapper and discards events up to and including the next `SYN_REPORT`, so a window with
//! missing events is never synthesized.

use crate::config::{ConfigurationChanges, DeviceConfiguration, DisplayId, InputReaderConfiguration};
use crate::event::{DeviceId, Nsecs, RawEvent, REL_HWHEEL, REL_WHEEL, REL_X, REL_Y};
use crate::mapper::{CursorInputMapper, InputMapper, KeyState};
use crate::metadata::DeviceIdentifier;
use crate::notify::{NotifyArgs, Source};
use crate::pointer::PointerController;
use bitflags::bitflags;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

bitflags! {
    /// Broad capability classes a source assigns to a device.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct DeviceClasses: u32 {
        /// Relative pointer: mouse, trackball, spaceball-style cursor.
        const CURSOR = 1 << 0;
        const KEYBOARD = 1 << 1;
        const TOUCH = 1 << 2;
        const JOYSTICK = 1 << 3;
    }
}

/// Value range of one absolute axis, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct AbsoluteAxisInfo {
    pub code: u16,
    pub min: i32,
    pub max: i32,
}

impl AbsoluteAxisInfo {
    pub const fn new(code: u16, min: i32, max: i32) -> Self {
        Self { code, min, max }
    }
}

/// What a device source knows about a device when it appears.
#[derive(Clone, Debug, Default)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub identifier: DeviceIdentifier,
    pub classes: DeviceClasses,
    /// `REL_*` codes the device reports.
    pub relative_axes: Vec<u16>,
    /// Absolute axes the device reports, with their ranges.
    pub absolute_axes: Vec<AbsoluteAxisInfo>,
    /// Device properties. `None` lets the reader policy supply them.
    pub configuration: Option<DeviceConfiguration>,
}

impl DeviceDescriptor {
    /// A wheel mouse.
    pub fn mouse(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            identifier: DeviceIdentifier::named(name),
            classes: DeviceClasses::CURSOR,
            relative_axes: vec![REL_X, REL_Y, REL_WHEEL, REL_HWHEEL],
            absolute_axes: Vec::new(),
            configuration: None,
        }
    }

    /// A trackball used as a d-pad.
    pub fn trackball(id: DeviceId, name: impl Into<String>) -> Self {
        let mut configuration = DeviceConfiguration::default();
        configuration.cursor.mode = crate::config::CursorMode::Navigation;
        Self {
            id,
            identifier: DeviceIdentifier::named(name),
            classes: DeviceClasses::CURSOR,
            relative_axes: vec![REL_X, REL_Y],
            absolute_axes: Vec::new(),
            configuration: Some(configuration),
        }
    }
}

/// Read-only view of a device that mappers and accumulators consult.
pub trait DeviceContext {
    fn device_id(&self) -> DeviceId;

    /// External devices wake the system when used.
    fn is_external(&self) -> bool;

    fn configuration(&self) -> &DeviceConfiguration;

    fn has_relative_axis(&self, code: u16) -> bool;

    fn absolute_axis_info(&self, code: u16) -> Option<AbsoluteAxisInfo>;

    fn has_absolute_axis(&self, code: u16) -> bool {
        self.absolute_axis_info(code).is_some()
    }

    /// Pointer controller for pointer-mode mappers, if the display side provided one.
    fn pointer_controller(&self) -> Option<Arc<dyn PointerController>>;
}

/// Device data shared with mappers, split from the mapper list so both can be borrowed.
struct DeviceState {
    id: DeviceId,
    identifier: DeviceIdentifier,
    classes: DeviceClasses,
    relative_axes: Vec<u16>,
    absolute_axes: Vec<AbsoluteAxisInfo>,
    configuration: DeviceConfiguration,
    pointer_controller: Option<Arc<dyn PointerController>>,
}

impl DeviceContext for DeviceState {
    fn device_id(&self) -> DeviceId {
        self.id
    }

    fn is_external(&self) -> bool {
        self.identifier.external
    }

    fn configuration(&self) -> &DeviceConfiguration {
        &self.configuration
    }

    fn has_relative_axis(&self, code: u16) -> bool {
        self.relative_axes.contains(&code)
    }

    fn absolute_axis_info(&self, code: u16) -> Option<AbsoluteAxisInfo> {
        self.absolute_axes.iter().find(|a| a.code == code).copied()
    }

    fn pointer_controller(&self) -> Option<Arc<dyn PointerController>> {
        self.pointer_controller.clone()
    }
}

/// Serializable summary of one device session.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceDump {
    pub id: DeviceId,
    pub identifier: DeviceIdentifier,
    pub classes: DeviceClasses,
    pub sources: u32,
    pub dropping_until_sync: bool,
    pub mappers: Vec<serde_json::Value>,
}

/// One attached device and its mappers.
pub struct InputDevice {
    state: DeviceState,
    mappers: Vec<Box<dyn InputMapper>>,
    drop_until_next_sync: bool,
}

impl InputDevice {
    /// Builds the session and picks mappers from the device classes.
    ///
    /// The device is not usable until [`configure`](Self::configure) has run with an empty
    /// change mask and [`reset`](Self::reset) has followed.
    pub fn new(
        descriptor: DeviceDescriptor,
        configuration: DeviceConfiguration,
        pointer_controller: Option<Arc<dyn PointerController>>,
    ) -> Self {
        let mut mappers: Vec<Box<dyn InputMapper>> = Vec::new();
        if descriptor.classes.contains(DeviceClasses::CURSOR) {
            mappers.push(Box::new(CursorInputMapper::new()));
        }

        Self {
            state: DeviceState {
                id: descriptor.id,
                identifier: descriptor.identifier,
                classes: descriptor.classes,
                relative_axes: descriptor.relative_axes,
                absolute_axes: descriptor.absolute_axes,
                configuration,
                pointer_controller,
            },
            mappers,
            drop_until_next_sync: false,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.state.id
    }

    pub fn identifier(&self) -> &DeviceIdentifier {
        &self.state.identifier
    }

    pub fn classes(&self) -> DeviceClasses {
        self.state.classes
    }

    /// A device with no mappers produces nothing; the reader keeps it only for bookkeeping.
    pub fn is_ignored(&self) -> bool {
        self.mappers.is_empty()
    }

    pub fn sources(&self) -> Source {
        self.mappers
            .iter()
            .fold(Source::empty(), |acc, m| acc | m.sources())
    }

    pub fn configuration(&self) -> &DeviceConfiguration {
        &self.state.configuration
    }

    /// Replaces the device properties. Mappers see them on the next `configure`.
    pub fn set_configuration(&mut self, configuration: DeviceConfiguration) {
        self.state.configuration = configuration;
    }

    /// Applies configuration to every mapper. Returns `true` if any mapper reset.
    pub fn configure(
        &mut self,
        when: Nsecs,
        config: &InputReaderConfiguration,
        changes: ConfigurationChanges,
    ) -> bool {
        let mut reset = false;
        for mapper in &mut self.mappers {
            reset |= mapper.configure(when, config, changes, &self.state);
        }
        reset
    }

    /// Resets every mapper and tells the dispatcher the device's gestures are gone.
    pub fn reset(&mut self, when: Nsecs, out: &mut Vec<NotifyArgs>) {
        for mapper in &mut self.mappers {
            mapper.reset(when, &self.state);
        }
        out.push(NotifyArgs::DeviceReset {
            event_time: when,
            device_id: self.state.id,
        });
    }

    /// Feeds raw events, in order, to every mapper.
    pub fn process(&mut self, raw_events: &[RawEvent], out: &mut Vec<NotifyArgs>) {
        for raw in raw_events {
            if self.drop_until_next_sync {
                if raw.is_sync_report() {
                    self.drop_until_next_sync = false;
                    debug!(device_id = self.state.id, "recovered from dropped events");
                }
                continue;
            }
            if raw.is_sync_dropped() {
                warn!(device_id = self.state.id, "input buffer overrun, dropping until next sync");
                self.drop_until_next_sync = true;
                self.reset(raw.when, out);
                continue;
            }
            for mapper in &mut self.mappers {
                mapper.process(raw, &self.state, out);
            }
        }
    }

    /// Key/button state across mappers whose sources match `source_mask`.
    pub fn scan_code_state(&self, source_mask: Source, scan_code: u16) -> KeyState {
        let mut result = KeyState::Unknown;
        for mapper in &self.mappers {
            if !mapper.sources().contains(source_mask) {
                continue;
            }
            match mapper.scan_code_state(source_mask, scan_code) {
                KeyState::Down => return KeyState::Down,
                KeyState::Up => result = KeyState::Up,
                KeyState::Unknown => {}
            }
        }
        result
    }

    pub fn associated_display_id(&self) -> Option<DisplayId> {
        self.mappers.iter().find_map(|m| m.associated_display_id())
    }

    pub fn dump(&self) -> DeviceDump {
        DeviceDump {
            id: self.state.id,
            identifier: self.state.identifier.clone(),
            classes: self.state.classes,
            sources: self.sources().bits(),
            dropping_until_sync: self.drop_until_next_sync,
            mappers: self.mappers.iter().map(|m| m.dump()).collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::event::*;
    use crate::notify::MotionAction;

    /// Hand-built context for accumulator and mapper tests.
    #[derive(Clone, Default)]
    pub(crate) struct TestContext {
        pub device_id: DeviceId,
        pub external: bool,
        pub configuration: DeviceConfiguration,
        pub relative_axes: Vec<u16>,
        pub absolute_axes: Vec<AbsoluteAxisInfo>,
        pub pointer_controller: Option<Arc<dyn PointerController>>,
    }

    impl DeviceContext for TestContext {
        fn device_id(&self) -> DeviceId {
            self.device_id
        }
        fn is_external(&self) -> bool {
            self.external
        }
        fn configuration(&self) -> &DeviceConfiguration {
            &self.configuration
        }
        fn has_relative_axis(&self, code: u16) -> bool {
            self.relative_axes.contains(&code)
        }
        fn absolute_axis_info(&self, code: u16) -> Option<AbsoluteAxisInfo> {
            self.absolute_axes.iter().find(|a| a.code == code).copied()
        }
        fn pointer_controller(&self) -> Option<Arc<dyn PointerController>> {
            self.pointer_controller.clone()
        }
    }

    fn attached(descriptor: DeviceDescriptor) -> InputDevice {
        let configuration = descriptor.configuration.clone().unwrap_or_default();
        let mut device = InputDevice::new(descriptor, configuration, None);
        device.configure(0, &InputReaderConfiguration::default(), ConfigurationChanges::empty());
        device.reset(0, &mut Vec::new());
        device
    }

    #[test]
    fn cursor_class_gets_cursor_mapper() {
        let device = attached(DeviceDescriptor::mouse(3, "mouse"));
        assert!(!device.is_ignored());
        assert_eq!(device.sources(), Source::MOUSE);

        let device = attached(DeviceDescriptor::trackball(4, "ball"));
        assert_eq!(device.sources(), Source::TRACKBALL);

        let keyboard = attached(DeviceDescriptor {
            id: 5,
            classes: DeviceClasses::KEYBOARD,
            ..DeviceDescriptor::default()
        });
        assert!(keyboard.is_ignored());
        assert_eq!(keyboard.scan_code_state(Source::KEYBOARD, BTN_LEFT), KeyState::Unknown);
    }

    #[test]
    fn sync_dropped_discards_window_and_resets() {
        let mut device = attached(DeviceDescriptor::mouse(1, "mouse"));
        let mut out = Vec::new();
        device.process(
            &[
                RawEvent::new(10, 1, EV_KEY, BTN_LEFT, 1),
                RawEvent::new(10, 1, EV_SYN, SYN_DROPPED, 0),
                RawEvent::new(11, 1, EV_REL, REL_X, 50),
                RawEvent::sync(12, 1),
            ],
            &mut out,
        );
        assert_eq!(out, vec![NotifyArgs::DeviceReset { event_time: 10, device_id: 1 }]);
        assert_eq!(device.scan_code_state(Source::MOUSE, BTN_LEFT), KeyState::Up);

        out.clear();
        device.process(
            &[RawEvent::new(20, 1, EV_REL, REL_X, 1), RawEvent::sync(20, 1)],
            &mut out,
        );
        let motion = out[0].as_motion().unwrap();
        assert_eq!(motion.action, MotionAction::HoverMove);
        assert_eq!(motion.coords.x, 1.0);
    }

    #[test]
    fn reconfigure_reports_material_change() {
        let mut device = attached(DeviceDescriptor::mouse(1, "mouse"));
        let mut config = InputReaderConfiguration::default();
        assert!(!device.configure(5, &config, ConfigurationChanges::POINTER_SPEED));
        config.pointer_capture_enabled = true;
        assert!(device.configure(5, &config, ConfigurationChanges::POINTER_CAPTURE));
        assert_eq!(device.sources(), Source::MOUSE_RELATIVE);
    }

    #[test]
    fn dump_lists_mappers() {
        let device = attached(DeviceDescriptor::trackball(9, "ball"));
        let dump = device.dump();
        assert_eq!(dump.mappers.len(), 1);
        assert_eq!(dump.mappers[0]["parameters"]["mode"], "Navigation");
        assert_eq!(device.identifier().name, "ball");
    }
}
