use trackmap::backends::VirtualEventSource;
use trackmap::config::{ConfigurationChanges, InputReaderConfiguration, ManagerSettings};
use trackmap::device::DeviceDescriptor;
use trackmap::dispatcher::CollectingSink;
use trackmap::pointer::{BoundedPointerController, PointerController};
use trackmap::reader::SimpleReaderPolicy;
use trackmap::{InputManager, NotifyArgs, BTN_LEFT};

use std::sync::Arc;
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackmap=info".into()),
        )
        .init();

    let pointer = Arc::new(BoundedPointerController::new());
    pointer.set_display(0, 1920, 1080);
    pointer.set_position(960.0, 540.0);

    let mut config = InputReaderConfiguration::default();
    config.display_association = Some(0);
    let policy = Arc::new(SimpleReaderPolicy::new(config).with_pointer_controller(pointer.clone()));

    let (source, feeder) = VirtualEventSource::new();
    let sink = CollectingSink::new();
    let mut manager = InputManager::new(
        source,
        policy.clone(),
        sink.clone(),
        ManagerSettings::default(),
    );
    manager.start().expect("start pipeline");

    feeder
        .add_device(DeviceDescriptor::mouse(1, "Demo Mouse"))
        .expect("add mouse");
    for _ in 0..10 {
        feeder.move_by(1, 12, -4).expect("move");
    }
    feeder.press(1, BTN_LEFT).expect("press");
    feeder.move_by(1, -30, 0).expect("drag");
    feeder.release(1, BTN_LEFT).expect("release");
    feeder.scroll(1, -2, 0).expect("scroll");

    // Faster pointer from here on.
    policy.update(|c| c.pointer_speed = 4);
    manager
        .reader_handle()
        .request_refresh_configuration(ConfigurationChanges::POINTER_SPEED);
    feeder.move_by(1, 12, -4).expect("move");

    std::thread::sleep(Duration::from_millis(200));
    manager.stop().expect("stop pipeline");

    for args in sink.take() {
        match args {
            NotifyArgs::Motion(m) => println!(
                "{:>14} {:?} at ({:.1}, {:.1}) buttons={:?}",
                m.event_time, m.action, m.coords.x, m.coords.y, m.button_state
            ),
            other => println!("{other:?}"),
        }
    }

    let snapshot = manager.reader_handle().snapshot();
    match snapshot.to_json() {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("snapshot: {e}"),
    }
    println!("dropped: {}", manager.dropped_events());
}
