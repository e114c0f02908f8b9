//! Pipeline lifecycle: the reader and dispatcher threads.
//!
//! [`InputManager`] wires a device source, an [`InputReaderPolicy`] and a [`DispatchSink`]
//! into the two-thread pipeline and owns its start/stop pair:
//!
//! ```text
//!  DeviceSource ──► reader thread ──(bounded queue)──► dispatcher thread ──► DispatchSink
//!                   InputReader                         InputDispatcher
//! ```
//!
//! # Lifecycle
//! - No mapper method runs before [`start`](InputManager::start) or after
//!   [`stop`](InputManager::stop) returns.
//! - `stop` lets the reader finish the batch it is routing, then lets the dispatcher drain
//!   the queue. Both threads hand their state back, so the pipeline can be started again.
//! - Every start resets all attached devices, so a window left half-accumulated by the
//!   previous run is never synthesized.
//!
//! ```no_run
//! use std::sync::Arc;
//! use trackmap::backends::VirtualEventSource;
//! use trackmap::config::{InputReaderConfiguration, ManagerSettings};
//! use trackmap::dispatcher::CollectingSink;
//! use trackmap::manager::InputManager;
//! use trackmap::reader::SimpleReaderPolicy;
//!
//! # fn main() -> trackmap::Result<()> {
//! let (source, feeder) = VirtualEventSource::new();
//! let policy = Arc::new(SimpleReaderPolicy::new(InputReaderConfiguration::default()));
//! let sink = CollectingSink::new();
//! let mut manager = InputManager::new(source, policy, sink.clone(), ManagerSettings::default());
//! manager.start()?;
//! // feed devices and events through `feeder` ...
//! manager.stop()?;
//! # drop(feeder);
//! # Ok(())
//! # }
//! ```

use crate::backends::DeviceSource;
use crate::config::ManagerSettings;
use crate::dispatcher::{DispatchSink, DispatcherHandle, InputDispatcher};
use crate::error::{InputError, Result};
use crate::reader::{InputReader, InputReaderPolicy, ReaderHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Pipeline state while the threads are not running.
struct Idle {
    reader: InputReader,
    dispatcher: InputDispatcher,
}

struct Running {
    reader_stop: Arc<AtomicBool>,
    dispatcher_stop: Arc<AtomicBool>,
    reader_thread: JoinHandle<InputReader>,
    dispatcher_thread: JoinHandle<InputDispatcher>,
}

/// Owns the reader/dispatcher pair and their threads.
pub struct InputManager {
    settings: ManagerSettings,
    reader_handle: ReaderHandle,
    dispatcher_handle: DispatcherHandle,
    idle: Option<Idle>,
    running: Option<Running>,
}

impl InputManager {
    pub fn new(
        source: impl DeviceSource + 'static,
        policy: Arc<dyn InputReaderPolicy>,
        sink: impl DispatchSink + 'static,
        settings: ManagerSettings,
    ) -> Self {
        let (dispatcher, dispatcher_handle) =
            InputDispatcher::new(settings.queue_capacity.max(1), settings.post_timeout(), sink);
        let reader = InputReader::new(source, policy, dispatcher_handle.clone());
        Self {
            settings,
            reader_handle: reader.handle(),
            dispatcher_handle,
            idle: Some(Idle { reader, dispatcher }),
            running: None,
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Control-side access to the reader (configuration refresh, queries, snapshots).
    pub fn reader_handle(&self) -> ReaderHandle {
        self.reader_handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Events dropped on a full dispatcher queue since creation.
    pub fn dropped_events(&self) -> u64 {
        self.dispatcher_handle.dropped()
    }

    /// Spawns the dispatcher thread, then the reader thread.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(InputError::AlreadyStarted);
        }
        let Idle {
            mut reader,
            mut dispatcher,
        } = self.idle.take().ok_or(InputError::PipelineLost)?;

        let poll = self.settings.poll_timeout();

        let dispatcher_stop = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&dispatcher_stop);
        let dispatcher_thread = thread::Builder::new()
            .name("input-dispatcher".into())
            .spawn(move || {
                info!("input dispatcher thread started");
                dispatcher.run(&stop, poll);
                info!("input dispatcher thread stopped");
                dispatcher
            })
            .map_err(InputError::ThreadSpawn)?;

        let reader_stop = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&reader_stop);
        let spawned = thread::Builder::new()
            .name("input-reader".into())
            .spawn(move || {
                info!("input reader thread started");
                reader.reset_devices();
                while !stop.load(Ordering::Acquire) {
                    if let Err(e) = reader.loop_once(poll) {
                        error!(error = %e, "device source failed, reader thread exiting");
                        break;
                    }
                }
                info!("input reader thread stopped");
                reader
            });
        let reader_thread = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                dispatcher_stop.store(true, Ordering::Release);
                let _ = dispatcher_thread.join();
                return Err(InputError::ThreadSpawn(e));
            }
        };

        self.running = Some(Running {
            reader_stop,
            dispatcher_stop,
            reader_thread,
            dispatcher_thread,
        });
        Ok(())
    }

    /// Stops the reader at a batch boundary, then drains and stops the dispatcher.
    pub fn stop(&mut self) -> Result<()> {
        let running = self.running.take().ok_or(InputError::NotStarted)?;

        running.reader_stop.store(true, Ordering::Release);
        let reader = running.reader_thread.join();

        running.dispatcher_stop.store(true, Ordering::Release);
        let dispatcher = running.dispatcher_thread.join();

        match (reader, dispatcher) {
            (Ok(reader), Ok(dispatcher)) => {
                info!(delivered = dispatcher.delivered(), "input pipeline stopped");
                self.idle = Some(Idle { reader, dispatcher });
                Ok(())
            }
            (Err(_), _) => {
                error!("input reader thread panicked");
                Err(InputError::ThreadPanicked("input-reader"))
            }
            (_, Err(_)) => {
                error!("input dispatcher thread panicked");
                Err(InputError::ThreadPanicked("input-dispatcher"))
            }
        }
    }
}

impl Drop for InputManager {
    fn drop(&mut self) {
        if self.running.is_some() {
            let _ = self.stop();
        }
    }
}
