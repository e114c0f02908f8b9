use trackmap::backends::VirtualEventSource;
use trackmap::config::InputReaderConfiguration;
use trackmap::device::DeviceDescriptor;
use trackmap::listener::LoggingListener;
use trackmap::reader::{InputReader, SimpleReaderPolicy};
use trackmap::{BTN_LEFT, EV_REL, REL_X, REL_Y};

use std::sync::Arc;
use std::time::Duration;

/// Drives a navigation trackball by hand, without the reader/dispatcher threads.
///
/// Run with `RUST_LOG=trackmap=debug` to see every event the logging listener passes on.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackmap=debug".into()),
        )
        .init();

    let (source, feeder) = VirtualEventSource::new();
    let policy = Arc::new(SimpleReaderPolicy::new(InputReaderConfiguration::default()));
    let mut reader = InputReader::new(source, policy, LoggingListener::new());

    feeder
        .add_device(DeviceDescriptor::trackball(1, "Demo Trackball"))
        .expect("add trackball");

    // Small rolls accumulate until they cross the d-pad threshold.
    for _ in 0..4 {
        feeder.move_by(1, 2, 0).expect("roll right");
    }
    feeder
        .window(1, &[(EV_REL, REL_Y, -13), (EV_REL, REL_X, 1)])
        .expect("roll up");
    feeder.press(1, BTN_LEFT).expect("press");
    feeder.release(1, BTN_LEFT).expect("release");

    let mut total = 0;
    for _ in 0..8 {
        total += reader.loop_once(Duration::from_millis(10)).expect("virtual source");
    }
    println!("{total} event(s) synthesized");

    let snapshot = reader.handle().snapshot();
    for device in snapshot.iter() {
        println!("{} ({}) sources=0x{:08x}", device.identifier.name, device.id, device.sources);
    }
}
