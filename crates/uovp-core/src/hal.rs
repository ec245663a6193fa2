use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use thiserror::Error;

/// Errors reported by the charger hardware layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChargerError {
    #[error("charger bus access failed: {0}")]
    Bus(String),

    #[error("current limit vote rejected (requested {requested_ua} uA)")]
    Rejected { requested_ua: u32 },

    #[error("charger not responding")]
    NotResponding,
}

/// Bitmask of charger port types reported by automatic power-source detection.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChargerType(u32);

impl ChargerType {
    /// Standard downstream port (plain USB host).
    pub const SDP: Self = Self(1 << 0);
    /// Charging downstream port.
    pub const CDP: Self = Self(1 << 1);
    /// Dedicated charging port (wall adapter).
    pub const DCP: Self = Self(1 << 2);
    /// Floating data lines, treated as a proprietary adapter.
    pub const FLOAT: Self = Self(1 << 3);
    /// Other charging port (proprietary divider signature).
    pub const OCP: Self = Self(1 << 4);
    /// High-voltage dedicated charging port.
    pub const HVDCP: Self = Self(1 << 5);
    /// Detection finished without recognising a standard port.
    pub const UNKNOWN: Self = Self(1 << 6);

    pub const FAST: Self = Self(Self::FLOAT.0 | Self::OCP.0 | Self::HVDCP.0);

    const NAMES: [(&'static str, Self); 7] = [
        ("sdp", Self::SDP),
        ("cdp", Self::CDP),
        ("dcp", Self::DCP),
        ("float", Self::FLOAT),
        ("ocp", Self::OCP),
        ("hvdcp", Self::HVDCP),
        ("unknown", Self::UNKNOWN),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Look up a single port type by its lowercase name (`"dcp"`, `"sdp"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(_, t)| self.intersects(*t))
            .map(|(n, _)| *n)
            .collect()
    }
}

impl BitOr for ChargerType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChargerType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ChargerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChargerType({:#x} {:?})", self.0, self.names())
    }
}

impl fmt::Display for ChargerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&self.names().join("|"))
    }
}

/// Charger hardware consumed by the protection logic.
///
/// Calls are synchronous and expected to return promptly; the protection
/// shell never holds them across samples.
pub trait Charger: Send {
    fn is_input_power_present(&self) -> bool;
    fn get_current_limit(&self) -> Result<u32, ChargerError>;
    fn set_current_limit(&mut self, current_ua: u32) -> Result<(), ChargerError>;
    /// Re-run automatic input current limit detection.
    fn rerun_autodetect(&mut self);
    /// Whether the charger suspends its input when the input voltage collapses.
    fn set_suspend_on_collapse(&mut self, enabled: bool) -> Result<(), ChargerError>;
    fn set_charging_enabled(&mut self, enabled: bool);
    fn global_fault_flag(&self) -> bool;
    fn set_global_fault_flag(&mut self, set: bool);
    fn check_battery_temperature(&mut self);
    fn charger_type(&self) -> ChargerType;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_mask_covers_proprietary_ports() {
        assert!(ChargerType::FAST.intersects(ChargerType::OCP));
        assert!(ChargerType::FAST.intersects(ChargerType::HVDCP));
        assert!(!ChargerType::FAST.intersects(ChargerType::DCP));
    }

    #[test]
    fn names_round_trip() {
        let t = ChargerType::from_name("DCP").unwrap() | ChargerType::from_name("sdp").unwrap();
        assert_eq!(t.names(), vec!["sdp", "dcp"]);
        assert_eq!(t.to_string(), "sdp|dcp");
        assert!(ChargerType::from_name("qc5").is_none());
    }
}
