#![cfg(target_os = "windows")]

//! Windows Raw Input backend.
//!
//! The host application owns the Win32 message loop and registers for mouse Raw Input
//! itself. It forwards each `WM_INPUT` lparam to a [`RawInputFeeder`]; the paired
//! [`VirtualEventSource`] is handed to the reader like any other source.
//!
//! Each Raw Input device handle becomes one trackmap device the first time it reports.
//! `WM_INPUT_DEVICE_CHANGE` removals should be forwarded with
//! [`RawInputFeeder::on_device_removed`].

pub mod raw_input;

use crate::backends::raw_mouse::{self, RawMouseTranslator};
use crate::backends::virtual_input::{VirtualEventSource, VirtualFeeder};
use crate::device::DeviceDescriptor;
use crate::error::Result;
use crate::event::{now, DeviceId, SourceEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

struct Known {
    id: DeviceId,
    translator: RawMouseTranslator,
}

#[derive(Default)]
struct Registry {
    next_id: DeviceId,
    devices: HashMap<usize, Known>,
}

/// Message-loop side of the Raw Input backend. Cheap to clone.
#[derive(Clone)]
pub struct RawInputFeeder {
    feeder: VirtualFeeder,
    registry: Arc<Mutex<Registry>>,
}

/// Creates a source for the reader and the feeder for the message loop.
pub fn raw_input_source() -> (VirtualEventSource, RawInputFeeder) {
    let (source, feeder) = VirtualEventSource::new();
    (
        source,
        RawInputFeeder {
            feeder,
            registry: Arc::new(Mutex::new(Registry::default())),
        },
    )
}

impl RawInputFeeder {
    /// Handles one `WM_INPUT`. Returns `Ok(false)` for non-mouse input.
    pub fn on_wm_input(&self, lparam: isize) -> Result<bool> {
        let Some(input) = raw_input::read_wm_input(lparam) else {
            return Ok(false);
        };

        let when = now();
        let mut batch = Vec::new();
        let mut raw = Vec::new();
        {
            let mut registry = self.registry.lock();
            if !registry.devices.contains_key(&input.device) {
                registry.next_id += 1;
                let id = registry.next_id;
                let name = raw_input::device_name(input.device)
                    .unwrap_or_else(|| format!("raw input mouse {id}"));
                let mut descriptor = DeviceDescriptor::mouse(id, name);
                descriptor.identifier.bus = Some("rawinput".into());
                descriptor.identifier.external = true;
                if input.packet.absolute {
                    descriptor.absolute_axes = raw_mouse::raw_input_absolute_axes().to_vec();
                }
                info!(
                    device_id = id,
                    identifier = %descriptor.identifier,
                    "raw input mouse attached"
                );
                batch.push(SourceEvent::DeviceAdded { when, descriptor });
                registry.devices.insert(
                    input.device,
                    Known {
                        id,
                        translator: RawMouseTranslator::new(),
                    },
                );
            }
            if let Some(known) = registry.devices.get_mut(&input.device) {
                known.translator.translate(when, known.id, &input.packet, &mut raw);
            }
        }

        batch.extend(raw.into_iter().map(SourceEvent::Raw));
        self.feeder.send(batch)?;
        Ok(true)
    }

    /// Handles a `GIDC_REMOVAL` device change for the given device handle.
    pub fn on_device_removed(&self, device: isize) -> Result<()> {
        let removed = self.registry.lock().devices.remove(&(device as usize));
        match removed {
            Some(known) => self.feeder.remove_device(known.id),
            None => Ok(()),
        }
    }
}
