use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

use trackmap::backends::{VirtualEventSource, VirtualFeeder};
use trackmap::config::{ConfigurationChanges, InputReaderConfiguration, ManagerSettings};
use trackmap::device::DeviceDescriptor;
use trackmap::dispatcher::CollectingSink;
use trackmap::listener::InputListener;
use trackmap::mapper::KeyState;
use trackmap::pointer::{BoundedPointerController, PointerController};
use trackmap::reader::{InputReader, SimpleReaderPolicy};
use trackmap::{
    InputManager, KeyAction, KeyCode, MotionAction, NotifyArgs, Source, BTN_LEFT, EV_REL, REL_X,
};

const DEADLINE: Duration = Duration::from_secs(2);

struct Pipeline {
    manager: InputManager,
    feeder: VirtualFeeder,
    policy: Arc<SimpleReaderPolicy>,
    sink: CollectingSink,
}

fn pipeline(policy: SimpleReaderPolicy) -> Pipeline {
    let (source, feeder) = VirtualEventSource::new();
    let policy = Arc::new(policy);
    let sink = CollectingSink::new();
    let settings = ManagerSettings {
        poll_timeout_ms: 5,
        ..ManagerSettings::default()
    };
    let manager = InputManager::new(source, policy.clone(), sink.clone(), settings);
    Pipeline {
        manager,
        feeder,
        policy,
        sink,
    }
}

/// Polls until `done` holds, panicking after [`DEADLINE`].
fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < DEADLINE, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn motions_of(events: &[NotifyArgs], device_id: i32) -> Vec<trackmap::NotifyMotionArgs> {
    events
        .iter()
        .filter_map(NotifyArgs::as_motion)
        .filter(|m| m.device_id == device_id)
        .cloned()
        .collect()
}

#[test]
fn mouse_moves_shared_pointer_across_threads() {
    let pointer = Arc::new(BoundedPointerController::new());
    pointer.set_display(0, 800, 600);
    pointer.set_position(100.0, 100.0);
    let mut p = pipeline(
        SimpleReaderPolicy::new(InputReaderConfiguration::default())
            .with_pointer_controller(pointer.clone()),
    );
    p.manager.start().unwrap();

    p.feeder.add_device(DeviceDescriptor::mouse(1, "mouse")).unwrap();
    p.feeder.move_by(1, 10, 5).unwrap();
    wait_for("hover move", || !motions_of(&p.sink.events(), 1).is_empty());
    p.manager.stop().unwrap();

    let motions = motions_of(&p.sink.events(), 1);
    assert_eq!(motions[0].action, MotionAction::HoverMove);
    assert_eq!(motions[0].source, Source::MOUSE);
    let (x, y) = pointer.position();
    assert!(x > 100.0 && y > 100.0, "pointer did not move: ({x}, {y})");
    assert_eq!(motions[0].coords.x, x);
    assert_eq!(motions[0].coords.y, y);
}

#[test]
fn per_device_order_survives_interleaving() {
    let mut p = pipeline(SimpleReaderPolicy::new(InputReaderConfiguration::default()));
    p.manager.start().unwrap();

    p.feeder.add_device(DeviceDescriptor::mouse(1, "left")).unwrap();
    p.feeder.add_device(DeviceDescriptor::mouse(2, "right")).unwrap();
    let ms = 1_000_000;
    for step in 1..=5i64 {
        p.feeder.window_at(step * 10 * ms, 1, &[(EV_REL, REL_X, 1)]).unwrap();
        p.feeder.window_at(step * 10 * ms + ms, 2, &[(EV_REL, REL_X, -1)]).unwrap();
    }
    wait_for("ten motions", || {
        let events = p.sink.events();
        motions_of(&events, 1).len() == 5 && motions_of(&events, 2).len() == 5
    });
    p.manager.stop().unwrap();

    let events = p.sink.events();
    for device_id in [1, 2] {
        let times: Vec<_> = motions_of(&events, device_id).iter().map(|m| m.event_time).collect();
        let mut sorted = times.clone();
        sorted.sort_unstable();
        assert_eq!(times, sorted, "device {device_id} reordered");
    }
    assert_eq!(p.manager.dropped_events(), 0);
}

#[test]
fn removal_resets_and_forgets_the_device() {
    let mut p = pipeline(SimpleReaderPolicy::new(InputReaderConfiguration::default()));
    p.manager.start().unwrap();
    let handle = p.manager.reader_handle();

    p.feeder.add_device(DeviceDescriptor::mouse(3, "mouse")).unwrap();
    p.feeder.press(3, BTN_LEFT).unwrap();
    wait_for("press", || {
        handle.get_scan_code_state(3, Source::MOUSE, BTN_LEFT).ok() == Some(KeyState::Down)
    });
    wait_for("press delivered", || !motions_of(&p.sink.events(), 3).is_empty());

    p.sink.take();
    p.feeder.remove_device(3).unwrap();
    wait_for("removal", || handle.device_ids().is_empty());
    wait_for("configuration change", || {
        p.sink
            .events()
            .iter()
            .any(|e| matches!(e, NotifyArgs::ConfigurationChanged { .. }))
    });
    p.manager.stop().unwrap();

    let events = p.sink.take();
    let reset = events
        .iter()
        .position(|e| matches!(e, NotifyArgs::DeviceReset { device_id: 3, .. }))
        .expect("device reset");
    let changed = events
        .iter()
        .position(|e| matches!(e, NotifyArgs::ConfigurationChanged { .. }))
        .expect("configuration changed");
    assert!(reset < changed);
    assert!(handle.get_scan_code_state(3, Source::MOUSE, BTN_LEFT).is_err());
    assert_eq!(handle.get_scan_code_state_any(Source::MOUSE, BTN_LEFT), KeyState::Unknown);
}

#[test]
fn pointer_capture_switches_to_relative_reports() {
    let pointer = Arc::new(BoundedPointerController::new());
    pointer.set_display(0, 800, 600);
    pointer.set_position(50.0, 50.0);
    let mut p = pipeline(
        SimpleReaderPolicy::new(InputReaderConfiguration::default())
            .with_pointer_controller(pointer.clone()),
    );
    p.manager.start().unwrap();
    let handle = p.manager.reader_handle();

    p.feeder.add_device(DeviceDescriptor::mouse(1, "mouse")).unwrap();
    wait_for("device", || handle.device_ids() == vec![1]);

    p.policy.update(|c| c.pointer_capture_enabled = true);
    handle.request_refresh_configuration(ConfigurationChanges::POINTER_CAPTURE);
    wait_for("refresh", || handle.snapshot().pending_changes == 0);
    assert!(handle.snapshot().configuration.pointer_capture_enabled);

    p.sink.take();
    p.feeder.move_by(1, 4, 0).unwrap();
    wait_for("captured motion", || !motions_of(&p.sink.events(), 1).is_empty());
    p.manager.stop().unwrap();

    let motion = &motions_of(&p.sink.events(), 1)[0];
    assert_eq!(motion.source, Source::MOUSE_RELATIVE);
    assert!(motion.cursor_position.is_none());
    assert!(motion.coords.x > 0.0);
    assert_eq!(pointer.position(), (50.0, 50.0));
}

#[test]
fn restart_resets_devices_and_keeps_them_attached() {
    let mut p = pipeline(SimpleReaderPolicy::new(InputReaderConfiguration::default()));
    p.manager.start().unwrap();
    let handle = p.manager.reader_handle();
    p.feeder.add_device(DeviceDescriptor::mouse(1, "mouse")).unwrap();
    wait_for("device", || handle.device_ids() == vec![1]);
    p.manager.stop().unwrap();

    p.sink.take();
    p.manager.start().unwrap();
    wait_for("reset on start", || {
        p.sink
            .events()
            .iter()
            .any(|e| matches!(e, NotifyArgs::DeviceReset { device_id: 1, .. }))
    });
    p.feeder.move_by(1, 2, 0).unwrap();
    wait_for("motion after restart", || !motions_of(&p.sink.events(), 1).is_empty());
    p.manager.stop().unwrap();
    assert_eq!(handle.device_ids(), vec![1]);
}

#[derive(Clone, Default)]
struct Keys(Arc<Mutex<Vec<NotifyArgs>>>);

impl InputListener for Keys {
    fn notify(&mut self, args: NotifyArgs) {
        self.0.lock().push(args);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn trackball_steps_account_for_all_motion(
        rolls in proptest::collection::vec(-500i32..500, 1..40),
    ) {
        let (source, feeder) = VirtualEventSource::new();
        let policy = Arc::new(SimpleReaderPolicy::new(InputReaderConfiguration::default()));
        let keys = Keys::default();
        let mut reader = InputReader::new(source, policy, keys.clone());

        feeder.add_device(DeviceDescriptor::trackball(9, "ball")).unwrap();
        for &dx in &rolls {
            feeder.window(9, &[(EV_REL, REL_X, dx)]).unwrap();
        }
        reader.loop_once(Duration::from_millis(5)).unwrap();
        reader.loop_once(Duration::from_millis(1)).unwrap();

        let events = keys.0.lock().clone();
        prop_assert!(events.iter().all(|e| e.as_motion().is_none()));
        let downs = |code: KeyCode| {
            events
                .iter()
                .filter_map(NotifyArgs::as_key)
                .filter(|k| k.key_code == code && k.action == KeyAction::Down)
                .count() as i32
        };
        let ups = events
            .iter()
            .filter_map(NotifyArgs::as_key)
            .filter(|k| k.action == KeyAction::Up)
            .count() as i32;
        let right = downs(KeyCode::DpadRight);
        let left = downs(KeyCode::DpadLeft);
        prop_assert_eq!(ups, right + left);

        let snapshot = reader.handle().snapshot();
        let dump = snapshot.get(9).unwrap();
        let remainder = dump.mappers[0]["navigation_remainder"][0].as_i64().unwrap() as i32;
        let total: i32 = rolls.iter().sum();
        prop_assert!(remainder.abs() < 6);
        prop_assert_eq!(total, 6 * (right - left) + remainder);
    }
}
