use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceKind {
    Meter,
    Inverter,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Meter => "meter",
            DeviceKind::Inverter => "inverter",
        }
    }
}

/// A device known to report through this link.
#[derive(Clone, Copy, Debug)]
pub struct Device {
    pub kind: DeviceKind,
    pub model: &'static str,
}

/// Directory of devices by their 8-byte ASCII ID as it appears in packet
/// envelopes. Discovered by watching the link; extend as new hardware
/// shows up.
static DIRECTORY: Lazy<HashMap<[u8; 8], Device>> = Lazy::new(|| {
    HashMap::from([
        (
            *b"91000HKU",
            Device {
                kind: DeviceKind::Meter,
                model: "HK1000",
            },
        ),
        (
            *b"96000DSU",
            Device {
                kind: DeviceKind::Inverter,
                model: "DNS-G3",
            },
        ),
    ])
});

/// Looks up a device by envelope ID.
pub fn lookup(device_id: &[u8; 8]) -> Result<Device> {
    DIRECTORY
        .get(device_id)
        .copied()
        .ok_or(Error::UnknownDeviceId(*device_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_meter() {
        let device = lookup(b"91000HKU").unwrap();
        assert_eq!(device.kind, DeviceKind::Meter);
        assert_eq!(device.model, "HK1000");
    }

    #[test]
    fn unknown_id() {
        assert!(matches!(
            lookup(b"00000000"),
            Err(Error::UnknownDeviceId(_))
        ));
    }
}
