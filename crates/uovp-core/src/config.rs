use crate::classifier::Thresholds;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_OVP_MV: i32 = 5800;
pub const DEFAULT_UVP_MV: i32 = 4300;
pub const DEFAULT_HYSTERESIS_MV: i32 = 100;
pub const DEFAULT_DEBOUNCE_SAMPLES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("hysteresis must not be negative (got {0} mV)")]
    NegativeHysteresis(i32),

    #[error("relaxed bands overlap: uvp {uvp_mv} mV + hyst {hysteresis_mv} mV reaches ovp {ovp_mv} mV - hyst")]
    OverlappingBands {
        ovp_mv: i32,
        uvp_mv: i32,
        hysteresis_mv: i32,
    },

    #[error("relaxed bands out of range: uvp {uvp_mv} mV / ovp {ovp_mv} mV with hyst {hysteresis_mv} mV overflow i32")]
    ThresholdOverflow {
        ovp_mv: i32,
        uvp_mv: i32,
        hysteresis_mv: i32,
    },

    #[error("debounce threshold must be at least one sample")]
    ZeroDebounce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Samples strictly above this are over-voltage faults.
    pub ovp_mv: i32,
    /// Samples at or below this are under-voltage faults.
    pub uvp_mv: i32,
    /// Width of the band inside each threshold where the previous verdict is held.
    pub hysteresis_mv: i32,
    /// Consecutive confirming samples before cutoff, restore or a current increase.
    pub debounce_samples: u32,
    /// Samples ignored right after enable while the charger input settles.
    pub settle_samples: u32,
    /// Clear the charger's global fault flag when protection is disabled.
    pub clear_fault_flag_on_disable: bool,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            ovp_mv: DEFAULT_OVP_MV,
            uvp_mv: DEFAULT_UVP_MV,
            hysteresis_mv: DEFAULT_HYSTERESIS_MV,
            debounce_samples: DEFAULT_DEBOUNCE_SAMPLES,
            settle_samples: 0,
            clear_fault_flag_on_disable: false,
        }
    }
}

impl ProtectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hysteresis_mv < 0 {
            return Err(ConfigError::NegativeHysteresis(self.hysteresis_mv));
        }
        let (Some(relaxed_uvp), Some(relaxed_ovp)) = (
            self.uvp_mv.checked_add(self.hysteresis_mv),
            self.ovp_mv.checked_sub(self.hysteresis_mv),
        ) else {
            return Err(ConfigError::ThresholdOverflow {
                ovp_mv: self.ovp_mv,
                uvp_mv: self.uvp_mv,
                hysteresis_mv: self.hysteresis_mv,
            });
        };
        if relaxed_uvp >= relaxed_ovp {
            return Err(ConfigError::OverlappingBands {
                ovp_mv: self.ovp_mv,
                uvp_mv: self.uvp_mv,
                hysteresis_mv: self.hysteresis_mv,
            });
        }
        if self.debounce_samples == 0 {
            return Err(ConfigError::ZeroDebounce);
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            ovp_mv: self.ovp_mv,
            uvp_mv: self.uvp_mv,
            hysteresis_mv: self.hysteresis_mv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ProtectionConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_overlapping_bands() {
        let cfg = ProtectionConfig {
            ovp_mv: 4600,
            uvp_mv: 4400,
            hysteresis_mv: 100,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OverlappingBands { .. })
        ));
    }

    #[test]
    fn rejects_thresholds_near_i32_limits() {
        let cfg: ProtectionConfig =
            serde_json::from_str(r#"{"uvp_mv": 2147483600, "hysteresis_mv": 100}"#).unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ThresholdOverflow { .. })
        ));

        let cfg = ProtectionConfig {
            ovp_mv: i32::MIN + 50,
            uvp_mv: i32::MIN,
            hysteresis_mv: 100,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ThresholdOverflow { .. })
        ));
    }

    #[test]
    fn rejects_zero_debounce() {
        let cfg = ProtectionConfig {
            debounce_samples: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroDebounce));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ProtectionConfig = serde_json::from_str(r#"{"ovp_mv": 6200}"#).unwrap();
        assert_eq!(cfg.ovp_mv, 6200);
        assert_eq!(cfg.uvp_mv, DEFAULT_UVP_MV);
        assert_eq!(cfg.debounce_samples, DEFAULT_DEBOUNCE_SAMPLES);
    }
}
