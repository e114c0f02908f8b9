//! Cursor mapper for mice, trackballs and other relative pointing devices.
//!
//! The mapper forwards every raw event to its four accumulators and, on each `SYN_REPORT`,
//! runs one synthesis pass over what they collected:
//!
//! 1. read relative motion, buttons and wheel deltas;
//! 2. rotate motion by the display orientation (orientation-aware devices only);
//! 3. run motion and each wheel through its own [`VelocityControl`];
//! 4. apply the per-device scale factors;
//! 5. emit events according to the operating [`Mode`];
//! 6. end the window on every accumulator.
//!
//! ## Modes
//! - [`Mode::Pointer`] moves the shared pointer controller and reports absolute positions.
//! - [`Mode::PointerRelative`] reports deltas and leaves the cursor alone (pointer capture).
//! - [`Mode::Navigation`] emits no motion at all. Motion is summed per axis into a
//!   remainder that carries across windows; each [`TRACKBALL_MOVEMENT_THRESHOLD`] consumed
//!   yields one d-pad key press/release pair.

use super::{InputMapper, KeyState};
use crate::accumulator::{
    CursorButtonAccumulator, CursorMotionAccumulator, CursorPositionAccumulator,
    CursorScrollAccumulator,
};
use crate::config::{
    ConfigurationChanges, CursorMode, DeviceConfiguration, DisplayId, InputReaderConfiguration,
    Orientation,
};
use crate::device::DeviceContext;
use crate::event::{DeviceId, Nsecs, RawEvent, BTN_JOYSTICK, BTN_MOUSE};
use crate::notify::{
    KeyAction, KeyCode, MotionAction, MotionButtons, NotifyArgs, NotifyKeyArgs, NotifyMotionArgs,
    PointerCoords, PolicyFlags, Source,
};
use crate::pointer::PointerController;
use crate::velocity::{VelocityControl, VelocityControlParameters};
use serde::Serialize;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Raw counts a trackball must travel along one axis to produce one d-pad key.
pub const TRACKBALL_MOVEMENT_THRESHOLD: i32 = 6;

/// Change bits the cursor mapper knows how to apply incrementally.
const HANDLED_CHANGES: ConfigurationChanges = ConfigurationChanges::POINTER_SPEED
    .union(ConfigurationChanges::DISPLAY_INFO)
    .union(ConfigurationChanges::POINTER_CAPTURE)
    .union(ConfigurationChanges::DEVICE_ALIAS);

/// Buttons that also produce key events in pointer modes.
const BUTTON_KEYS: [(MotionButtons, KeyCode); 2] = [
    (MotionButtons::BACK, KeyCode::Back),
    (MotionButtons::FORWARD, KeyCode::Forward),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    #[default]
    Pointer,
    PointerRelative,
    Navigation,
}

/// Per-device parameters, fixed between material configuration changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Parameters {
    pub mode: Mode,
    pub has_associated_display: bool,
    pub orientation_aware: bool,
}

impl Parameters {
    /// Derives parameters from device properties and the runtime bundle.
    ///
    /// The mode decides everything: pointer capture only turns a pointer into a relative
    /// pointer, and only pointers (or orientation-aware trackballs) have a display.
    pub fn derive(device: &DeviceConfiguration, config: &InputReaderConfiguration) -> Self {
        let mode = match device.cursor.mode {
            CursorMode::Navigation => Mode::Navigation,
            CursorMode::Pointer if config.pointer_capture_enabled => Mode::PointerRelative,
            CursorMode::Pointer => Mode::Pointer,
        };
        let orientation_aware = device.cursor.orientation_aware;
        let has_associated_display = match mode {
            Mode::Pointer => true,
            Mode::PointerRelative => false,
            Mode::Navigation => orientation_aware,
        };
        Self {
            mode,
            has_associated_display,
            orientation_aware,
        }
    }
}

/// Rotates a delta pair to follow the display orientation.
///
/// | orientation | result     |
/// |-------------|------------|
/// | 0           | `( x,  y)` |
/// | 90          | `( y, -x)` |
/// | 180         | `(-x, -y)` |
/// | 270         | `(-y,  x)` |
pub fn rotate_delta(orientation: Orientation, x: i32, y: i32) -> (i32, i32) {
    match orientation {
        Orientation::Rotation0 => (x, y),
        Orientation::Rotation90 => (y, x.saturating_neg()),
        Orientation::Rotation180 => (x.saturating_neg(), y.saturating_neg()),
        Orientation::Rotation270 => (y.saturating_neg(), x),
    }
}

/// Button transition across one sync window.
#[derive(Clone, Copy, Debug)]
struct ButtonChanges {
    last: MotionButtons,
    current: MotionButtons,
    pressed: MotionButtons,
    released: MotionButtons,
}

impl ButtonChanges {
    fn new(last: MotionButtons, current: MotionButtons) -> Self {
        Self {
            last,
            current,
            pressed: current - last,
            released: last - current,
        }
    }
}

/// Maps relative pointing devices to pointer, scroll and d-pad events.
pub struct CursorInputMapper {
    parameters: Parameters,
    initialized: bool,

    button_accumulator: CursorButtonAccumulator,
    motion_accumulator: CursorMotionAccumulator,
    position_accumulator: CursorPositionAccumulator,
    scroll_accumulator: CursorScrollAccumulator,

    source: Source,
    x_scale: f32,
    y_scale: f32,
    x_precision: f32,
    y_precision: f32,
    vwheel_scale: f32,
    hwheel_scale: f32,

    // Wheels get their own controls so scroll gain stays independent of pointer gain.
    pointer_velocity: VelocityControl,
    wheel_x_velocity: VelocityControl,
    wheel_y_velocity: VelocityControl,

    orientation: Orientation,
    display_id: Option<DisplayId>,
    pointer_controller: Option<Weak<dyn PointerController>>,

    device_id: DeviceId,
    external: bool,

    button_state: MotionButtons,
    down_time: Option<Nsecs>,
    navigation_remainder: (i32, i32),
}

impl Default for CursorInputMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorInputMapper {
    /// Creates an unconfigured mapper. The owner must `configure` (empty change mask) and
    /// `reset` it before the first raw event.
    pub fn new() -> Self {
        Self {
            parameters: Parameters::default(),
            initialized: false,
            button_accumulator: CursorButtonAccumulator::new(),
            motion_accumulator: CursorMotionAccumulator::new(),
            position_accumulator: CursorPositionAccumulator::new(),
            scroll_accumulator: CursorScrollAccumulator::new(),
            source: Source::MOUSE,
            x_scale: 1.0,
            y_scale: 1.0,
            x_precision: 1.0,
            y_precision: 1.0,
            vwheel_scale: 1.0,
            hwheel_scale: 1.0,
            pointer_velocity: VelocityControl::default(),
            wheel_x_velocity: VelocityControl::default(),
            wheel_y_velocity: VelocityControl::default(),
            orientation: Orientation::Rotation0,
            display_id: None,
            pointer_controller: None,
            device_id: 0,
            external: false,
            button_state: MotionButtons::empty(),
            down_time: None,
            navigation_remainder: (0, 0),
        }
    }

    pub fn parameters(&self) -> Parameters {
        self.parameters
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Motion not yet converted into d-pad keys (navigation mode).
    pub fn navigation_remainder(&self) -> (i32, i32) {
        self.navigation_remainder
    }

    pub fn down_time(&self) -> Option<Nsecs> {
        self.down_time
    }

    pub fn button_state(&self) -> MotionButtons {
        self.button_state
    }

    fn configure_mode(&mut self, ctx: &dyn DeviceContext) {
        match self.parameters.mode {
            Mode::Pointer => {
                self.source = Source::MOUSE;
                self.x_precision = 1.0;
                self.y_precision = 1.0;
                self.pointer_controller = ctx
                    .pointer_controller()
                    .map(|pc| Arc::downgrade(&pc));
            }
            Mode::PointerRelative => {
                self.source = Source::MOUSE_RELATIVE;
                self.x_precision = 1.0;
                self.y_precision = 1.0;
                self.pointer_controller = None;
            }
            Mode::Navigation => {
                self.source = Source::TRACKBALL;
                self.x_precision = TRACKBALL_MOVEMENT_THRESHOLD as f32;
                self.y_precision = TRACKBALL_MOVEMENT_THRESHOLD as f32;
                self.pointer_controller = None;
            }
        }
        self.x_scale = 1.0;
        self.y_scale = 1.0;
        self.vwheel_scale = 1.0;
        self.hwheel_scale = 1.0;
    }

    fn policy_flags(&self, wake: bool) -> PolicyFlags {
        if wake && self.external {
            PolicyFlags::WAKE
        } else {
            PolicyFlags::empty()
        }
    }

    fn sync(&mut self, when: Nsecs, out: &mut Vec<NotifyArgs>) {
        debug_assert!(self.initialized, "cursor mapper synced before reset");

        let buttons = ButtonChanges::new(self.button_state, self.button_accumulator.button_state());
        self.button_state = buttons.current;

        let was_down = !buttons.last.is_empty();
        let down = !buttons.current.is_empty();
        if down && !was_down {
            self.down_time = Some(when);
        }

        let (rel_x, rel_y) = (
            self.motion_accumulator.relative_x(),
            self.motion_accumulator.relative_y(),
        );
        let (rel_x, rel_y) = if self.parameters.orientation_aware {
            rotate_delta(self.orientation, rel_x, rel_y)
        } else {
            (rel_x, rel_y)
        };

        if self.parameters.mode == Mode::Navigation {
            self.sync_navigation(when, rel_x, rel_y, buttons, out);
        } else {
            self.sync_pointer(when, rel_x, rel_y, buttons, out);
        }

        if !down {
            self.down_time = None;
        }

        self.button_accumulator.finish_sync();
        self.motion_accumulator.finish_sync();
        self.position_accumulator.finish_sync();
        self.scroll_accumulator.finish_sync();
    }

    fn sync_pointer(
        &mut self,
        when: Nsecs,
        rel_x: i32,
        rel_y: i32,
        buttons: ButtonChanges,
        out: &mut Vec<NotifyArgs>,
    ) {
        let ButtonChanges {
            last: last_buttons,
            current: current_buttons,
            pressed,
            released,
        } = buttons;
        let was_down = !last_buttons.is_empty();
        let down = !current_buttons.is_empty();
        let down_changed = was_down != down;
        let buttons_changed = last_buttons != current_buttons;

        let mut dx = rel_x as f32;
        let mut dy = rel_y as f32;
        let mut vscroll = self.scroll_accumulator.relative_vwheel() as f32;
        let mut hscroll = self.scroll_accumulator.relative_hwheel() as f32;

        self.pointer_velocity.apply(when, Some(&mut dx), Some(&mut dy));
        self.wheel_y_velocity.apply(when, None, Some(&mut vscroll));
        self.wheel_x_velocity.apply(when, Some(&mut hscroll), None);

        dx *= self.x_scale;
        dy *= self.y_scale;
        vscroll *= self.vwheel_scale;
        hscroll *= self.hwheel_scale;

        let warped = self.parameters.mode == Mode::Pointer && self.position_accumulator.reported();
        let moved = dx != 0.0 || dy != 0.0 || warped;
        let scrolled = vscroll != 0.0 || hscroll != 0.0;

        let mut coords = PointerCoords {
            relative_x: dx,
            relative_y: dy,
            pressure: if down { 1.0 } else { 0.0 },
            ..PointerCoords::default()
        };
        let mut cursor_position = None;
        let mut display_id = None;

        let controller = match self.parameters.mode {
            Mode::Pointer => self.pointer_controller.as_ref().and_then(Weak::upgrade),
            _ => None,
        };
        match controller {
            Some(pc) => {
                if warped {
                    let (x, y) = match pc.bounds() {
                        Some((max_x, max_y)) => self.position_accumulator.scaled(max_x, max_y),
                        None => (
                            self.position_accumulator.x() as f32,
                            self.position_accumulator.y() as f32,
                        ),
                    };
                    pc.set_position(x, y);
                }
                if dx != 0.0 || dy != 0.0 {
                    pc.move_by(dx, dy);
                }
                if buttons_changed {
                    pc.set_button_state(current_buttons);
                }
                let (x, y) = pc.position();
                coords.x = x;
                coords.y = y;
                cursor_position = Some((x, y));
                display_id = pc.display_id().or(self.display_id);
            }
            None => {
                // Relative pointer, or the display side dropped the controller.
                coords.x = dx;
                coords.y = dy;
            }
        }

        let policy_flags = self.policy_flags(!pressed.is_empty() || moved || scrolled);
        self.synthesize_button_keys(when, KeyAction::Down, pressed, display_id, policy_flags, out);

        if down_changed || moved || scrolled || buttons_changed {
            let down_time = self.down_time.unwrap_or(when);
            let action = if down_changed {
                if down {
                    MotionAction::Down
                } else {
                    MotionAction::Up
                }
            } else if down || self.parameters.mode != Mode::Pointer {
                MotionAction::Move
            } else {
                MotionAction::HoverMove
            };

            let motion = |action: MotionAction,
                          action_button: MotionButtons,
                          button_state: MotionButtons,
                          coords: PointerCoords| {
                NotifyArgs::Motion(NotifyMotionArgs {
                    event_time: when,
                    device_id: self.device_id,
                    source: self.source,
                    display_id,
                    policy_flags,
                    action,
                    action_button,
                    button_state,
                    coords,
                    x_precision: self.x_precision,
                    y_precision: self.y_precision,
                    cursor_position,
                    down_time,
                })
            };

            let mut button_state = last_buttons;
            for button in released.iter() {
                button_state.remove(button);
                out.push(motion(MotionAction::ButtonRelease, button, button_state, coords));
            }

            out.push(motion(action, MotionButtons::empty(), current_buttons, coords));

            for button in pressed.iter() {
                button_state.insert(button);
                out.push(motion(MotionAction::ButtonPress, button, button_state, coords));
            }
            debug_assert_eq!(button_state, current_buttons);

            // Tell the application the mouse is hovering again.
            if action == MotionAction::Up && self.parameters.mode == Mode::Pointer {
                out.push(motion(
                    MotionAction::HoverMove,
                    MotionButtons::empty(),
                    current_buttons,
                    coords,
                ));
            }

            if scrolled {
                let scroll_coords = PointerCoords {
                    vscroll,
                    hscroll,
                    ..coords
                };
                out.push(motion(
                    MotionAction::Scroll,
                    MotionButtons::empty(),
                    current_buttons,
                    scroll_coords,
                ));
            }
        }

        self.synthesize_button_keys(when, KeyAction::Up, released, display_id, policy_flags, out);
    }

    fn synthesize_button_keys(
        &self,
        when: Nsecs,
        action: KeyAction,
        changed: MotionButtons,
        display_id: Option<DisplayId>,
        policy_flags: PolicyFlags,
        out: &mut Vec<NotifyArgs>,
    ) {
        for (button, key_code) in BUTTON_KEYS {
            if changed.contains(button) {
                out.push(NotifyArgs::Key(NotifyKeyArgs {
                    event_time: when,
                    device_id: self.device_id,
                    source: Source::KEYBOARD,
                    display_id,
                    policy_flags,
                    action,
                    key_code,
                    scan_code: 0,
                    down_time: when,
                }));
            }
        }
    }

    fn sync_navigation(
        &mut self,
        when: Nsecs,
        rel_x: i32,
        rel_y: i32,
        buttons: ButtonChanges,
        out: &mut Vec<NotifyArgs>,
    ) {
        let ButtonChanges { pressed, released, .. } = buttons;
        let (mut rem_x, mut rem_y) = self.navigation_remainder;
        rem_x = rem_x.saturating_add(rel_x);
        rem_y = rem_y.saturating_add(rel_y);

        let moved = rel_x != 0 || rel_y != 0;
        let policy_flags = self.policy_flags(moved || !pressed.is_empty());

        if pressed.contains(MotionButtons::PRIMARY) {
            self.push_key(when, when, KeyAction::Down, KeyCode::DpadCenter, policy_flags, out);
        }

        self.consume_axis(
            when,
            &mut rem_x,
            KeyCode::DpadRight,
            KeyCode::DpadLeft,
            policy_flags,
            out,
        );
        self.consume_axis(
            when,
            &mut rem_y,
            KeyCode::DpadDown,
            KeyCode::DpadUp,
            policy_flags,
            out,
        );

        if released.contains(MotionButtons::PRIMARY) {
            let down_time = self.down_time.unwrap_or(when);
            self.push_key(when, down_time, KeyAction::Up, KeyCode::DpadCenter, policy_flags, out);
        }

        self.navigation_remainder = (rem_x, rem_y);
    }

    /// Turns whole thresholds of `remainder` into key pairs; the partial rest stays.
    fn consume_axis(
        &self,
        when: Nsecs,
        remainder: &mut i32,
        positive: KeyCode,
        negative: KeyCode,
        policy_flags: PolicyFlags,
        out: &mut Vec<NotifyArgs>,
    ) {
        // Truncating division keeps the sign, so the rest stays below one threshold.
        let steps = *remainder / TRACKBALL_MOVEMENT_THRESHOLD;
        let key_code = if steps > 0 { positive } else { negative };
        for _ in 0..steps.unsigned_abs() {
            self.push_key(when, when, KeyAction::Down, key_code, policy_flags, out);
            self.push_key(when, when, KeyAction::Up, key_code, policy_flags, out);
        }
        *remainder -= steps * TRACKBALL_MOVEMENT_THRESHOLD;
    }

    fn push_key(
        &self,
        when: Nsecs,
        down_time: Nsecs,
        action: KeyAction,
        key_code: KeyCode,
        policy_flags: PolicyFlags,
        out: &mut Vec<NotifyArgs>,
    ) {
        out.push(NotifyArgs::Key(NotifyKeyArgs {
            event_time: when,
            device_id: self.device_id,
            source: self.source,
            display_id: self.display_id,
            policy_flags,
            action,
            key_code,
            scan_code: 0,
            down_time,
        }));
    }
}

impl InputMapper for CursorInputMapper {
    fn sources(&self) -> Source {
        self.source
    }

    fn configure(
        &mut self,
        when: Nsecs,
        config: &InputReaderConfiguration,
        changes: ConfigurationChanges,
        ctx: &dyn DeviceContext,
    ) -> bool {
        let initial = changes.is_empty();
        // Anything we cannot apply piecewise is applied in full, followed by a reset.
        let unhandled = !changes.difference(HANDLED_CHANGES).is_empty();
        let everything = initial || unhandled;
        let mut material = unhandled;

        if everything || changes.contains(ConfigurationChanges::POINTER_CAPTURE) {
            let parameters = Parameters::derive(ctx.configuration(), config);
            material |= !initial && parameters != self.parameters;
            self.parameters = parameters;
            self.configure_mode(ctx);
        }

        if everything
            || changes.intersects(
                ConfigurationChanges::POINTER_SPEED | ConfigurationChanges::POINTER_CAPTURE,
            )
        {
            let pointer = match self.parameters.mode {
                Mode::Pointer => config.pointer_velocity_parameters(),
                _ => VelocityControlParameters::default(),
            };
            self.pointer_velocity.set_parameters(pointer);
            self.wheel_x_velocity.set_parameters(config.wheel_velocity);
            self.wheel_y_velocity.set_parameters(config.wheel_velocity);
        }

        if everything
            || changes.intersects(
                ConfigurationChanges::DISPLAY_INFO | ConfigurationChanges::POINTER_CAPTURE,
            )
        {
            let orientation = if self.parameters.orientation_aware {
                config.display_orientation
            } else {
                Orientation::Rotation0
            };
            let display_id = if self.parameters.has_associated_display {
                config.display_association
            } else {
                None
            };
            material |=
                !initial && (orientation != self.orientation || display_id != self.display_id);
            self.orientation = orientation;
            self.display_id = display_id;
        }

        if material {
            debug!(
                device_id = ctx.device_id(),
                ?changes,
                mode = ?self.parameters.mode,
                orientation = self.orientation.degrees(),
                "cursor mapper reconfigured, resetting"
            );
            self.reset(when, ctx);
        }
        material
    }

    fn reset(&mut self, _when: Nsecs, ctx: &dyn DeviceContext) {
        self.device_id = ctx.device_id();
        self.external = ctx.is_external();
        self.button_state = MotionButtons::empty();
        self.down_time = None;
        self.navigation_remainder = (0, 0);

        self.pointer_velocity.reset();
        self.wheel_x_velocity.reset();
        self.wheel_y_velocity.reset();

        self.button_accumulator.reset(ctx);
        self.motion_accumulator.reset(ctx);
        self.position_accumulator.reset(ctx);
        self.scroll_accumulator.reset(ctx);

        self.initialized = true;
    }

    fn process(&mut self, raw: &RawEvent, _ctx: &dyn DeviceContext, out: &mut Vec<NotifyArgs>) {
        trace!(
            device_id = raw.device_id,
            kind = raw.kind,
            code = raw.code,
            value = raw.value,
            "raw"
        );
        self.button_accumulator.process(raw);
        self.motion_accumulator.process(raw);
        self.position_accumulator.process(raw);
        self.scroll_accumulator.process(raw);

        if raw.is_sync_report() {
            self.sync(raw.when, out);
        }
    }

    fn scan_code_state(&self, source_mask: Source, scan_code: u16) -> KeyState {
        if !self.source.contains(source_mask) || !(BTN_MOUSE..BTN_JOYSTICK).contains(&scan_code) {
            return KeyState::Unknown;
        }
        if self.button_accumulator.is_pressed(scan_code) {
            KeyState::Down
        } else {
            KeyState::Up
        }
    }

    fn associated_display_id(&self) -> Option<DisplayId> {
        if !self.parameters.has_associated_display {
            return None;
        }
        let from_controller = match self.parameters.mode {
            Mode::Pointer => self
                .pointer_controller
                .as_ref()
                .and_then(Weak::upgrade)
                .and_then(|pc| pc.display_id()),
            _ => None,
        };
        from_controller.or(self.display_id)
    }

    fn dump(&self) -> serde_json::Value {
        let pointer_controller = self
            .pointer_controller
            .as_ref()
            .is_some_and(|w| w.strong_count() > 0);
        serde_json::json!({
            "mapper": "cursor",
            "parameters": self.parameters,
            "source": self.source.bits(),
            "x_scale": self.x_scale,
            "y_scale": self.y_scale,
            "x_precision": self.x_precision,
            "y_precision": self.y_precision,
            "vwheel_scale": self.vwheel_scale,
            "hwheel_scale": self.hwheel_scale,
            "have_vwheel": self.scroll_accumulator.have_wheel(),
            "have_hwheel": self.scroll_accumulator.have_hwheel(),
            "have_absolute": self.position_accumulator.has_absolute(),
            "orientation": self.orientation.degrees(),
            "display_id": self.display_id,
            "pointer_controller": pointer_controller,
            "button_state": self.button_state.bits(),
            "down_time": self.down_time,
            "navigation_remainder": [self.navigation_remainder.0, self.navigation_remainder.1],
            "pointer_velocity": self.pointer_velocity.parameters(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::raw_mouse;
    use crate::device::tests::TestContext;
    use crate::device::AbsoluteAxisInfo;
    use crate::event::*;
    use crate::pointer::BoundedPointerController;
    use std::sync::Arc;

    const MS: Nsecs = 1_000_000;

    struct Harness {
        mapper: CursorInputMapper,
        ctx: TestContext,
        config: InputReaderConfiguration,
        now: Nsecs,
    }

    impl Harness {
        fn new(ctx: TestContext) -> Self {
            let mut config = InputReaderConfiguration::default();
            // Keep gain at 1 so expectations stay in raw counts.
            config.pointer_velocity = VelocityControlParameters::default();
            config.wheel_velocity = VelocityControlParameters::default();
            Self::with_config(ctx, config)
        }

        fn with_config(ctx: TestContext, config: InputReaderConfiguration) -> Self {
            let mut mapper = CursorInputMapper::new();
            mapper.configure(0, &config, ConfigurationChanges::empty(), &ctx);
            mapper.reset(0, &ctx);
            Self {
                mapper,
                ctx,
                config,
                now: 0,
            }
        }

        fn pointer() -> (Self, Arc<BoundedPointerController>) {
            let pc = Arc::new(BoundedPointerController::new());
            pc.set_display(0, 1000, 1000);
            pc.set_position(500.0, 500.0);
            let ctx = TestContext {
                pointer_controller: Some(pc.clone()),
                ..TestContext::default()
            };
            (Self::new(ctx), pc)
        }

        fn navigation() -> Self {
            let mut ctx = TestContext::default();
            ctx.configuration.cursor.mode = CursorMode::Navigation;
            Self::new(ctx)
        }

        fn raw(&mut self, kind: u16, code: u16, value: i32) -> Vec<NotifyArgs> {
            let mut out = Vec::new();
            let ev = RawEvent::new(self.now, self.ctx.device_id, kind, code, value);
            self.mapper.process(&ev, &self.ctx, &mut out);
            out
        }

        /// Feeds a batch followed by SYN_REPORT and returns what the sync produced.
        fn window(&mut self, events: &[(u16, u16, i32)]) -> Vec<NotifyArgs> {
            self.now += 10 * MS;
            for &(kind, code, value) in events {
                assert!(self.raw(kind, code, value).is_empty());
            }
            self.raw(EV_SYN, SYN_REPORT, 0)
        }

        fn reconfigure(&mut self, changes: ConfigurationChanges) -> bool {
            self.mapper.configure(self.now, &self.config, changes, &self.ctx)
        }
    }

    fn motions(out: &[NotifyArgs]) -> Vec<&NotifyMotionArgs> {
        out.iter().filter_map(NotifyArgs::as_motion).collect()
    }

    fn keys(out: &[NotifyArgs]) -> Vec<(KeyAction, KeyCode)> {
        out.iter()
            .filter_map(NotifyArgs::as_key)
            .map(|k| (k.action, k.key_code))
            .collect()
    }

    #[test]
    fn rotation_table() {
        let cases = [
            (Orientation::Rotation0, (5, 0), (5, 0)),
            (Orientation::Rotation90, (5, 0), (0, -5)),
            (Orientation::Rotation180, (5, 0), (-5, 0)),
            (Orientation::Rotation270, (5, 0), (0, 5)),
            (Orientation::Rotation0, (0, 3), (0, 3)),
            (Orientation::Rotation90, (0, 3), (3, 0)),
            (Orientation::Rotation180, (0, 3), (0, -3)),
            (Orientation::Rotation270, (0, 3), (-3, 0)),
        ];
        for (orientation, (x, y), want) in cases {
            assert_eq!(rotate_delta(orientation, x, y), want, "{orientation:?}");
        }
    }

    #[test]
    fn hover_move_updates_pointer() {
        let (mut h, pc) = Harness::pointer();
        let out = h.window(&[(EV_REL, REL_X, 10), (EV_REL, REL_Y, -4)]);
        let m = motions(&out);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].action, MotionAction::HoverMove);
        assert_eq!(m[0].source, Source::MOUSE);
        assert_eq!(m[0].cursor_position, Some((510.0, 496.0)));
        assert_eq!((m[0].coords.relative_x, m[0].coords.relative_y), (10.0, -4.0));
        assert_eq!(m[0].display_id, Some(0));
        assert_eq!(pc.position(), (510.0, 496.0));
    }

    #[test]
    fn pointer_is_clamped_by_controller() {
        let (mut h, pc) = Harness::pointer();
        h.window(&[(EV_REL, REL_X, 5000)]);
        assert_eq!(pc.position(), (999.0, 500.0));
    }

    #[test]
    fn empty_window_emits_nothing() {
        let (mut h, _pc) = Harness::pointer();
        assert!(h.window(&[]).is_empty());
    }

    #[test]
    fn press_and_release_sequence() {
        let (mut h, _pc) = Harness::pointer();

        let out = h.window(&[(EV_KEY, BTN_LEFT, 1)]);
        let actions: Vec<_> = motions(&out).iter().map(|m| m.action).collect();
        assert_eq!(actions, vec![MotionAction::Down, MotionAction::ButtonPress]);
        let press_time = h.now;
        assert_eq!(motions(&out)[1].action_button, MotionButtons::PRIMARY);
        assert_eq!(motions(&out)[0].down_time, press_time);
        assert_eq!(motions(&out)[0].coords.pressure, 1.0);

        let out = h.window(&[(EV_REL, REL_X, 3)]);
        let m = motions(&out);
        assert_eq!(m[0].action, MotionAction::Move);
        assert_eq!(m[0].down_time, press_time);

        let out = h.window(&[(EV_KEY, BTN_LEFT, 0)]);
        let actions: Vec<_> = motions(&out).iter().map(|m| m.action).collect();
        assert_eq!(
            actions,
            vec![MotionAction::ButtonRelease, MotionAction::Up, MotionAction::HoverMove]
        );
        assert!(motions(&out).iter().all(|m| m.down_time == press_time));
        assert_eq!(h.mapper.down_time(), None);
    }

    #[test]
    fn single_down_time_per_continuous_press() {
        let (mut h, _pc) = Harness::pointer();
        h.window(&[(EV_KEY, BTN_LEFT, 1)]);
        let press_time = h.now;

        let mut ups = 0;
        for i in 0..5 {
            // A second button joining mid-press must not restart the span.
            let extra = if i == 2 { vec![(EV_KEY, BTN_RIGHT, 1)] } else { vec![] };
            let mut events = vec![(EV_REL, REL_Y, 1)];
            events.extend(extra);
            for m in motions(&h.window(&events)) {
                assert_eq!(m.down_time, press_time);
                ups += (m.action == MotionAction::Up) as usize;
            }
        }
        h.window(&[(EV_KEY, BTN_RIGHT, 0)]);
        let out = h.window(&[(EV_KEY, BTN_LEFT, 0)]);
        for m in motions(&out) {
            assert_eq!(m.down_time, press_time);
            ups += (m.action == MotionAction::Up) as usize;
        }
        assert_eq!(ups, 1);
    }

    #[test]
    fn scroll_is_reported_separately() {
        let (mut h, _pc) = Harness::pointer();
        let out = h.window(&[(EV_REL, REL_WHEEL, 2), (EV_REL, REL_HWHEEL, -1)]);
        let m = motions(&out);
        assert_eq!(m.len(), 2);
        assert_eq!(m[0].action, MotionAction::HoverMove);
        assert_eq!(m[1].action, MotionAction::Scroll);
        assert_eq!((m[1].coords.vscroll, m[1].coords.hscroll), (2.0, -1.0));
        assert_eq!(m[0].coords.vscroll, 0.0);
    }

    #[test]
    fn back_button_synthesizes_keys_around_motion() {
        let (mut h, _pc) = Harness::pointer();
        let out = h.window(&[(EV_KEY, BTN_SIDE, 1)]);
        let key = out.first().and_then(NotifyArgs::as_key).map(|k| (k.action, k.key_code));
        assert_eq!(key, Some((KeyAction::Down, KeyCode::Back)));

        let out = h.window(&[(EV_KEY, BTN_SIDE, 0)]);
        let key = out.last().and_then(NotifyArgs::as_key).map(|k| (k.action, k.key_code));
        assert_eq!(key, Some((KeyAction::Up, KeyCode::Back)));
    }

    #[test]
    fn absolute_position_warps_pointer() {
        let pc = Arc::new(BoundedPointerController::new());
        pc.set_display(0, 1000, 1000);
        let ctx = TestContext {
            pointer_controller: Some(pc.clone()),
            absolute_axes: vec![
                AbsoluteAxisInfo::new(ABS_X, 0, 999),
                AbsoluteAxisInfo::new(ABS_Y, 0, 999),
            ],
            ..TestContext::default()
        };
        let mut h = Harness::new(ctx);
        let out = h.window(&[(EV_ABS, ABS_X, 300), (EV_ABS, ABS_Y, 200), (EV_REL, REL_X, 2)]);
        assert_eq!(pc.position(), (302.0, 200.0));
        assert_eq!(motions(&out)[0].cursor_position, Some((302.0, 200.0)));
    }

    #[test]
    fn normalized_absolute_range_lands_inside_display() {
        let pc = Arc::new(BoundedPointerController::new());
        pc.set_display(0, 1001, 501);
        let ctx = TestContext {
            pointer_controller: Some(pc.clone()),
            absolute_axes: raw_mouse::raw_input_absolute_axes().to_vec(),
            ..TestContext::default()
        };
        let mut h = Harness::new(ctx);
        h.window(&[(EV_ABS, ABS_X, 13107), (EV_ABS, ABS_Y, 32767)]);
        let (x, y) = pc.position();
        assert_eq!(x, 200.0);
        assert!((249.0..=250.0).contains(&y), "y = {y}");

        h.window(&[(EV_ABS, ABS_X, 65535), (EV_ABS, ABS_Y, 65535)]);
        assert_eq!(pc.position(), (1000.0, 500.0));
    }

    #[test]
    fn relative_mode_reports_deltas_only() {
        let (mut h, pc) = Harness::pointer();
        h.config.pointer_capture_enabled = true;
        assert!(h.reconfigure(ConfigurationChanges::POINTER_CAPTURE));
        assert_eq!(h.mapper.parameters().mode, Mode::PointerRelative);
        assert_eq!(h.mapper.sources(), Source::MOUSE_RELATIVE);

        let out = h.window(&[(EV_REL, REL_X, 7)]);
        let m = motions(&out);
        assert_eq!(m[0].action, MotionAction::Move);
        assert_eq!((m[0].coords.x, m[0].coords.y), (7.0, 0.0));
        assert_eq!(m[0].cursor_position, None);
        assert_eq!(m[0].display_id, None);
        assert_eq!(pc.position(), (500.0, 500.0));
    }

    #[test]
    fn orientation_aware_pointer_rotates_before_moving() {
        let pc = Arc::new(BoundedPointerController::new());
        pc.set_display(0, 1000, 1000);
        pc.set_position(500.0, 500.0);
        let mut ctx = TestContext {
            pointer_controller: Some(pc.clone()),
            ..TestContext::default()
        };
        ctx.configuration.cursor.orientation_aware = true;
        let mut config = InputReaderConfiguration::default();
        config.pointer_velocity = VelocityControlParameters::default();
        config.display_orientation = Orientation::Rotation90;
        let mut h = Harness::with_config(ctx, config);

        h.window(&[(EV_REL, REL_X, 5)]);
        assert_eq!(pc.position(), (500.0, 495.0));
    }

    #[test]
    fn navigation_threshold_exact_multiple() {
        let mut h = Harness::navigation();
        let mut all = Vec::new();
        for _ in 0..3 {
            all.extend(h.window(&[(EV_REL, REL_X, 2)]));
        }
        assert!(motions(&all).is_empty());
        assert_eq!(
            keys(&all),
            vec![(KeyAction::Down, KeyCode::DpadRight), (KeyAction::Up, KeyCode::DpadRight)]
        );
        assert_eq!(h.mapper.navigation_remainder(), (0, 0));
    }

    #[test]
    fn navigation_remainder_carries() {
        let mut h = Harness::navigation();
        assert!(h.window(&[(EV_REL, REL_Y, -2), (EV_REL, REL_Y, -2)]).is_empty());
        assert_eq!(h.mapper.navigation_remainder(), (0, -4));

        let out = h.window(&[(EV_REL, REL_Y, -2)]);
        assert_eq!(
            keys(&out),
            vec![(KeyAction::Down, KeyCode::DpadUp), (KeyAction::Up, KeyCode::DpadUp)]
        );
        assert_eq!(h.mapper.navigation_remainder(), (0, 0));
    }

    #[test]
    fn navigation_emits_one_pair_per_threshold() {
        let mut h = Harness::navigation();
        let out = h.window(&[(EV_REL, REL_X, -13), (EV_REL, REL_Y, 6)]);
        assert_eq!(
            keys(&out),
            vec![
                (KeyAction::Down, KeyCode::DpadLeft),
                (KeyAction::Up, KeyCode::DpadLeft),
                (KeyAction::Down, KeyCode::DpadLeft),
                (KeyAction::Up, KeyCode::DpadLeft),
                (KeyAction::Down, KeyCode::DpadDown),
                (KeyAction::Up, KeyCode::DpadDown),
            ]
        );
        assert_eq!(h.mapper.navigation_remainder(), (-1, 0));
        assert!(out.iter().filter_map(NotifyArgs::as_key).all(|k| k.source == Source::TRACKBALL));
    }

    #[test]
    fn fast_roll_is_fully_consumed_in_one_window() {
        let mut h = Harness::navigation();
        let out = h.window(&[(EV_REL, REL_X, TRACKBALL_MOVEMENT_THRESHOLD * 70)]);
        let k = keys(&out);
        assert_eq!(k.len(), 140);
        let pair = [
            (KeyAction::Down, KeyCode::DpadRight),
            (KeyAction::Up, KeyCode::DpadRight),
        ];
        assert!(k.chunks(2).all(|chunk| chunk == pair));
        assert_eq!(h.mapper.navigation_remainder(), (0, 0));

        // Only the partial threshold waits for the next window.
        let out = h.window(&[(EV_REL, REL_Y, -(TRACKBALL_MOVEMENT_THRESHOLD * 70 + 5))]);
        let downs = keys(&out)
            .iter()
            .filter(|k| **k == (KeyAction::Down, KeyCode::DpadUp))
            .count();
        assert_eq!(downs, 70);
        assert_eq!(h.mapper.navigation_remainder(), (0, -5));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "synced before reset")]
    fn sync_before_reset_fails_fast_in_debug() {
        let ctx = TestContext::default();
        let mut mapper = CursorInputMapper::new();
        mapper.configure(
            0,
            &InputReaderConfiguration::default(),
            ConfigurationChanges::empty(),
            &ctx,
        );
        mapper.process(&RawEvent::sync(1, 0), &ctx, &mut Vec::new());
    }

    #[test]
    fn navigation_button_is_dpad_center() {
        let mut h = Harness::navigation();
        let out = h.window(&[(EV_KEY, BTN_LEFT, 1)]);
        assert_eq!(keys(&out), vec![(KeyAction::Down, KeyCode::DpadCenter)]);
        let down_time = h.now;
        h.window(&[(EV_REL, REL_X, 1)]);
        let out = h.window(&[(EV_KEY, BTN_LEFT, 0)]);
        let up = out[0].as_key().unwrap();
        assert_eq!(
            (up.action, up.key_code, up.down_time),
            (KeyAction::Up, KeyCode::DpadCenter, down_time)
        );
    }

    #[test]
    fn mode_switch_discards_prior_state() {
        let (mut h, _pc) = Harness::pointer();
        // Half a window: button down and motion, no sync yet.
        h.now += MS;
        h.raw(EV_KEY, BTN_LEFT, 1);
        h.raw(EV_REL, REL_X, 4);
        h.raw(EV_REL, REL_WHEEL, 1);

        h.ctx.configuration.cursor.mode = CursorMode::Navigation;
        assert!(h.reconfigure(ConfigurationChanges::MUST_REOPEN));
        assert_eq!(h.mapper.parameters().mode, Mode::Navigation);
        assert_eq!(h.mapper.button_state(), MotionButtons::empty());

        let out = h.window(&[(EV_REL, REL_X, 2)]);
        assert!(out.is_empty());
        assert_eq!(h.mapper.navigation_remainder(), (2, 0));
        assert_eq!(h.mapper.scan_code_state(Source::TRACKBALL, BTN_LEFT), KeyState::Up);
    }

    #[test]
    fn unchanged_capture_toggle_is_not_material() {
        let (mut h, _pc) = Harness::pointer();
        assert!(!h.reconfigure(ConfigurationChanges::POINTER_CAPTURE));
        assert!(!h.reconfigure(ConfigurationChanges::POINTER_SPEED));
        assert!(!h.reconfigure(ConfigurationChanges::DEVICE_ALIAS));
    }

    #[test]
    fn unknown_change_bits_force_reset() {
        let (mut h, _pc) = Harness::pointer();
        h.window(&[(EV_KEY, BTN_LEFT, 1)]);
        assert!(h.mapper.down_time().is_some());
        assert!(h.reconfigure(ConfigurationChanges::from_bits_retain(1 << 20)));
        assert_eq!(h.mapper.down_time(), None);
        assert_eq!(h.mapper.button_state(), MotionButtons::empty());
    }

    #[test]
    fn orientation_change_is_material_only_when_aware() {
        let (mut h, _pc) = Harness::pointer();
        h.config.display_orientation = Orientation::Rotation180;
        assert!(!h.reconfigure(ConfigurationChanges::DISPLAY_INFO));

        let mut ctx = TestContext::default();
        ctx.configuration.cursor.mode = CursorMode::Navigation;
        ctx.configuration.cursor.orientation_aware = true;
        let mut h = Harness::new(ctx);
        h.config.display_orientation = Orientation::Rotation180;
        assert!(h.reconfigure(ConfigurationChanges::DISPLAY_INFO));
        assert_eq!(h.mapper.orientation(), Orientation::Rotation180);

        // (dx=6) under 180 degrees travels left.
        let out = h.window(&[(EV_REL, REL_X, 6)]);
        assert_eq!(keys(&out)[0], (KeyAction::Down, KeyCode::DpadLeft));
    }

    #[test]
    fn scan_code_state_reads_buttons_only() {
        let (mut h, _pc) = Harness::pointer();
        h.raw(EV_KEY, BTN_RIGHT, 1);
        assert_eq!(h.mapper.scan_code_state(Source::MOUSE, BTN_RIGHT), KeyState::Down);
        assert_eq!(h.mapper.scan_code_state(Source::MOUSE, BTN_LEFT), KeyState::Up);
        assert_eq!(h.mapper.scan_code_state(Source::MOUSE, 0x1e), KeyState::Unknown);
        assert_eq!(h.mapper.scan_code_state(Source::TRACKBALL, BTN_RIGHT), KeyState::Unknown);
    }

    #[test]
    fn external_devices_request_wake() {
        let (h, _pc) = Harness::pointer();
        let ctx = TestContext {
            external: true,
            ..h.ctx.clone()
        };
        let mut h = Harness::new(ctx);
        let out = h.window(&[(EV_REL, REL_X, 1)]);
        assert_eq!(motions(&out)[0].policy_flags, PolicyFlags::WAKE);
    }

    #[test]
    fn dropped_controller_falls_back_to_relative() {
        let (mut h, pc) = Harness::pointer();
        h.ctx.pointer_controller = None;
        drop(pc);
        let out = h.window(&[(EV_REL, REL_X, 3)]);
        let m = motions(&out);
        assert_eq!(m[0].cursor_position, None);
        assert_eq!(m[0].coords.x, 3.0);
        assert_eq!(h.mapper.associated_display_id(), None);
    }

    #[test]
    fn reset_is_safe_any_time() {
        let mut mapper = CursorInputMapper::new();
        let ctx = TestContext::default();
        mapper.reset(0, &ctx);
        mapper.reset(0, &ctx);
        let dump = mapper.dump();
        assert_eq!(dump["mapper"], "cursor");
        assert_eq!(dump["button_state"], 0);
    }
}
