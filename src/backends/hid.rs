//! Boot-protocol HID mice via `hidapi`.
//!
//! [`HidMouseSource`] opens every HID interface advertising the generic-desktop mouse
//! usage and polls them round-robin. Reports are decoded with
//! [`BootMouseReport`](super::raw_mouse::BootMouseReport); devices whose reports do not
//! follow the boot layout will produce garbage and should be left to a platform backend.
//!
//! Devices are announced once, on the first `read_batch`, and a device that fails a read
//! is reported removed and closed.

use super::raw_mouse::{BootMouseReport, BootMouseTranslator};
use super::DeviceSource;
use crate::device::{DeviceClasses, DeviceDescriptor};
use crate::error::{InputError, Result};
use crate::event::{now, DeviceId, SourceEvent, REL_WHEEL, REL_X, REL_Y};
use crate::metadata::DeviceIdentifier;
use hidapi::{DeviceInfo, HidApi, HidDevice};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_MOUSE: u16 = 0x02;

/// Per-device read slice while polling round-robin.
const READ_SLICE_MS: i32 = 2;

struct OpenMouse {
    id: DeviceId,
    name: String,
    device: HidDevice,
    translator: BootMouseTranslator,
}

/// Polls HID mice.
pub struct HidMouseSource {
    mice: Vec<OpenMouse>,
    pending: Vec<SourceEvent>,
}

fn descriptor_for(id: DeviceId, info: &DeviceInfo) -> DeviceDescriptor {
    let name = info.product_string().unwrap_or("HID mouse").to_string();
    DeviceDescriptor {
        id,
        identifier: DeviceIdentifier {
            name,
            bus: Some("usb".into()),
            vendor: Some(info.vendor_id()),
            product: Some(info.product_id()),
            location: Some(info.path().to_string_lossy().into_owned()),
            external: true,
        },
        classes: DeviceClasses::CURSOR,
        relative_axes: vec![REL_X, REL_Y, REL_WHEEL],
        absolute_axes: Vec::new(),
        configuration: None,
    }
}

impl HidMouseSource {
    /// Enumerates and opens HID mice. Interfaces that cannot be opened are skipped.
    pub fn open() -> Result<Self> {
        let api = HidApi::new().map_err(|e| InputError::Source(e.to_string()))?;
        let mut mice = Vec::new();
        let mut pending = Vec::new();
        let when = now();

        for info in api.device_list() {
            if info.usage_page() != USAGE_PAGE_GENERIC_DESKTOP || info.usage() != USAGE_MOUSE {
                continue;
            }
            let id = mice.len() as DeviceId + 1;
            match info.open_device(&api) {
                Ok(device) => {
                    let descriptor = descriptor_for(id, info);
                    info!(device_id = id, identifier = %descriptor.identifier, "opened HID mouse");
                    mice.push(OpenMouse {
                        id,
                        name: descriptor.identifier.name.clone(),
                        device,
                        translator: BootMouseTranslator::new(),
                    });
                    pending.push(SourceEvent::DeviceAdded { when, descriptor });
                }
                Err(e) => warn!(path = ?info.path(), error = %e, "cannot open HID mouse"),
            }
        }

        Ok(Self { mice, pending })
    }

    pub fn device_count(&self) -> usize {
        self.mice.len()
    }
}

impl DeviceSource for HidMouseSource {
    fn read_batch(&mut self, timeout: Duration) -> Result<Vec<SourceEvent>> {
        let mut batch = std::mem::take(&mut self.pending);
        if !batch.is_empty() {
            return Ok(batch);
        }
        if self.mice.is_empty() {
            std::thread::sleep(timeout);
            return Ok(batch);
        }

        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 64];
        let mut raw = Vec::new();
        loop {
            let mut failed = Vec::new();
            for (index, mouse) in self.mice.iter_mut().enumerate() {
                match mouse.device.read_timeout(&mut buf, READ_SLICE_MS) {
                    Ok(0) => {}
                    Ok(n) => {
                        if let Some(report) = BootMouseReport::parse(&buf[..n]) {
                            mouse.translator.translate(now(), mouse.id, &report, &mut raw);
                        }
                    }
                    Err(e) => {
                        warn!(
                            device_id = mouse.id,
                            name = %mouse.name,
                            error = %e,
                            "HID read failed"
                        );
                        failed.push(index);
                    }
                }
            }
            for index in failed.into_iter().rev() {
                let mouse = self.mice.remove(index);
                batch.push(SourceEvent::DeviceRemoved {
                    when: now(),
                    device_id: mouse.id,
                });
            }

            batch.extend(raw.drain(..).map(SourceEvent::Raw));
            if !batch.is_empty() || Instant::now() >= deadline || self.mice.is_empty() {
                return Ok(batch);
            }
        }
    }
}
