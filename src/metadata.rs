//! Device identity snapshot.
//!
//! [`DeviceIdentifier`] is a lightweight, cloneable description of a device suitable for
//! logging, diagnostics dumps and picking a per-device configuration file. Sources fill in
//! what they know; unknown fields remain `None`.
//!
//! # Conventions
//! - `bus` is a short, human-readable bus hint like `"usb"`, `"bluetooth"`, `"rawinput"`
//!   or `"virtual"`.
//! - `location` is an OS/topology path (opaque string) useful for diagnostics.
//! - `vendor`/`product` are generally stable and are what [`config_file_name`] keys on.
//!
//! [`config_file_name`]: DeviceIdentifier::config_file_name

use serde::{Deserialize, Serialize};

/// Identity of a single input device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentifier {
    /// Human-readable product name from the driver/firmware.
    pub name: String,

    /// High-level bus classification.
    pub bus: Option<String>,

    /// USB Vendor ID, if known.
    pub vendor: Option<u16>,

    /// USB Product ID, if known.
    pub product: Option<u16>,

    /// OS/topological path to the device. Treat as opaque.
    pub location: Option<String>,

    /// Whether the device is plugged in rather than built in. External devices wake the
    /// system when used.
    pub external: bool,
}

impl DeviceIdentifier {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Conventional per-device configuration file name, e.g. `Vendor_046d_Product_c52b.toml`.
    ///
    /// Falls back to a sanitized device name when vendor/product are unknown.
    pub fn config_file_name(&self) -> String {
        match (self.vendor, self.product) {
            (Some(v), Some(p)) => format!("Vendor_{v:04x}_Product_{p:04x}.toml"),
            _ => {
                let name: String = self
                    .name
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
                    .collect();
                format!("{name}.toml")
            }
        }
    }
}

impl std::fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let (Some(v), Some(p)) = (self.vendor, self.product) {
            write!(f, " [{v:04x}:{p:04x}]")?;
        }
        if let Some(bus) = &self.bus {
            write!(f, " ({bus})")?;
        }
        Ok(())
    }
}
