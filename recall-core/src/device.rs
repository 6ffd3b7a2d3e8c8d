//! Explicit data-location tags.
//!
//! Encoder outputs are produced on one device, moved to host memory for the
//! index search, and moved back for scoring. Every move goes through
//! [`Located::to`], which logs the transfer. Placement is a tag only: all
//! arithmetic in this workspace runs on the host.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array, Dimension};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::RecallError;

/// Where a value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Host,
    Accelerator(u32),
}

impl Device {
    /// Map the legacy integer convention: negative means host.
    pub fn from_ordinal(ordinal: i64) -> Self {
        if ordinal < 0 {
            Device::Host
        } else {
            Device::Accelerator(ordinal as u32)
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Device::Host)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Host => write!(f, "host"),
            Device::Accelerator(n) => write!(f, "accelerator:{n}"),
        }
    }
}

impl FromStr for Device {
    type Err = RecallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("host") || s.eq_ignore_ascii_case("cpu") {
            return Ok(Device::Host);
        }
        let ordinal = s
            .strip_prefix("accelerator:")
            .or_else(|| s.strip_prefix("cuda:"))
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| RecallError::Config {
                reason: format!("unrecognised device {s:?}"),
            })?;
        Ok(Device::Accelerator(ordinal))
    }
}

impl TryFrom<String> for Device {
    type Error = RecallError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

/// Anything whose transfer size can be reported.
pub trait Transferable {
    fn elements(&self) -> usize;
}

impl<A, D: Dimension> Transferable for Array<A, D> {
    fn elements(&self) -> usize {
        self.len()
    }
}

impl<T> Transferable for Vec<T> {
    fn elements(&self) -> usize {
        self.len()
    }
}

/// A value tagged with the device it lives on.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    value: T,
    device: Device,
}

impl<T: Transferable> Located<T> {
    pub fn new(value: T, device: Device) -> Self {
        Self { value, device }
    }

    pub fn on_host(value: T) -> Self {
        Self::new(value, Device::Host)
    }

    /// Move to `target`. A move to the current device is a no-op and is not logged.
    pub fn to(self, target: Device, what: &str) -> Self {
        if self.device == target {
            return self;
        }
        debug!(
            event = "device_transfer",
            from = %self.device,
            to = %target,
            what,
            elements = self.value.elements(),
            "device transfer"
        );
        Self {
            value: self.value,
            device: target,
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}
