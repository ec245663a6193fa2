//! JSON scenario files describing a charger and the voltage it sees.
//!
//! ```json
//! {
//!   "name": "ovp-cutoff",
//!   "charger_types": ["dcp"],
//!   "initial_current_ua": 1500000,
//!   "source": { "kind": "segments", "segments": [{ "voltage_mv": 6000, "samples": 4 }] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use uovp_core::{
    ChargerType, ConfigError, ProtectionConfig, SampleSequence, SimulatedCharger,
    SimulatedSupply, SupplySensor, VoltageSensor, DEFAULT_CEILING_UA,
};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scenario JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown charger type {0:?}")]
    UnknownChargerType(String),
    #[error("unknown built-in scenario {name:?} (available: {available})")]
    UnknownBuiltin { name: String, available: String },
    #[error("invalid protection config: {0}")]
    Config(#[from] ConfigError),
    #[error("scenario {0:?} produces no samples")]
    Empty(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub voltage_mv: i32,
    pub samples: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoltageSource {
    /// Fixed readings, independent of what the charger draws.
    Segments { segments: Vec<Segment> },
    /// A supply whose voltage sags with the charger's current limit.
    Supply {
        open_circuit_mv: i32,
        source_resistance_mohm: u32,
        samples: u64,
    },
}

impl VoltageSource {
    pub fn sample_count(&self) -> u64 {
        match self {
            VoltageSource::Segments { segments } => {
                segments.iter().map(|s| u64::from(s.samples)).sum()
            }
            VoltageSource::Supply { samples, .. } => *samples,
        }
    }
}

fn default_initial_current() -> u32 {
    DEFAULT_CEILING_UA
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Port type names as reported by the charger, e.g. `"dcp"`.
    pub charger_types: Vec<String>,
    #[serde(default = "default_initial_current")]
    pub initial_current_ua: u32,
    #[serde(default)]
    pub protection: ProtectionConfig,
    pub source: VoltageSource,
}

const OVP_CUTOFF: &str = r#"{
  "name": "ovp-cutoff",
  "description": "Dedicated charger pushes 6 V, gets cut off, then recovers",
  "charger_types": ["dcp"],
  "initial_current_ua": 1500000,
  "source": {
    "kind": "segments",
    "segments": [
      { "voltage_mv": 6000, "samples": 4 },
      { "voltage_mv": 5600, "samples": 4 },
      { "voltage_mv": 5000, "samples": 6 }
    ]
  }
}"#;

const UVP_STEPDOWN: &str = r#"{
  "name": "uvp-stepdown",
  "description": "Weak adapter sags under load until the limit settles",
  "charger_types": ["dcp"],
  "initial_current_ua": 1500000,
  "source": {
    "kind": "supply",
    "open_circuit_mv": 5000,
    "source_resistance_mohm": 600,
    "samples": 30
  }
}"#;

const STEADY_INCREASE: &str = r#"{
  "name": "steady-increase",
  "description": "Unknown port at a healthy voltage steps up to its ceiling",
  "charger_types": ["unknown"],
  "initial_current_ua": 500000,
  "source": {
    "kind": "segments",
    "segments": [{ "voltage_mv": 4400, "samples": 9 }]
  }
}"#;

const BUILTINS: &[(&str, &str)] = &[
    ("ovp-cutoff", OVP_CUTOFF),
    ("uvp-stepdown", UVP_STEPDOWN),
    ("steady-increase", STEADY_INCREASE),
];

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn builtin(name: &str) -> Result<Self, ScenarioError> {
        let (_, json) = BUILTINS
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| ScenarioError::UnknownBuiltin {
                name: name.to_string(),
                available: Self::builtin_names().join(", "),
            })?;
        Self::from_json(json)
    }

    pub fn builtin_names() -> Vec<&'static str> {
        BUILTINS.iter().map(|(n, _)| *n).collect()
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        self.protection.validate()?;
        self.charger_type()?;
        if self.source.sample_count() == 0 {
            return Err(ScenarioError::Empty(self.name.clone()));
        }
        Ok(())
    }

    /// Union of the listed port types.
    pub fn charger_type(&self) -> Result<ChargerType, ScenarioError> {
        self.charger_types
            .iter()
            .try_fold(ChargerType::empty(), |acc, name| {
                ChargerType::from_name(name)
                    .map(|t| acc | t)
                    .ok_or_else(|| ScenarioError::UnknownChargerType(name.clone()))
            })
    }

    pub fn build_charger(&self) -> Result<SimulatedCharger, ScenarioError> {
        Ok(SimulatedCharger::new(
            self.charger_type()?,
            self.initial_current_ua,
        ))
    }

    pub fn sensor(&self) -> ScenarioSensor {
        match &self.source {
            VoltageSource::Segments { segments } => ScenarioSensor::Sequence(
                segments.iter().fold(SampleSequence::default(), |seq, s| {
                    seq.hold(s.voltage_mv, u64::from(s.samples))
                }),
            ),
            VoltageSource::Supply {
                open_circuit_mv,
                source_resistance_mohm,
                samples,
            } => ScenarioSensor::Supply(SupplySensor::new(
                SimulatedSupply {
                    open_circuit_mv: *open_circuit_mv,
                    source_resistance_mohm: *source_resistance_mohm,
                },
                *samples,
            )),
        }
    }
}

/// Voltage source built from a [`Scenario`].
#[derive(Debug, Clone)]
pub enum ScenarioSensor {
    Sequence(SampleSequence),
    Supply(SupplySensor),
}

impl VoltageSensor<SimulatedCharger> for ScenarioSensor {
    fn read_voltage_mv(&mut self, charger: &SimulatedCharger) -> Option<i32> {
        match self {
            ScenarioSensor::Sequence(seq) => seq.read_voltage_mv(charger),
            ScenarioSensor::Supply(supply) => supply.read_voltage_mv(charger),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_parses() {
        for name in Scenario::builtin_names() {
            let scenario = Scenario::builtin(name).unwrap();
            assert_eq!(scenario.name, name);
            assert!(scenario.source.sample_count() > 0);
        }
    }

    #[test]
    fn unknown_builtin_lists_available() {
        let err = Scenario::builtin("brownout").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ovp-cutoff"), "{msg}");
    }

    #[test]
    fn charger_types_are_combined() {
        let scenario = Scenario::from_json(
            r#"{"name":"x","charger_types":["cdp","dcp"],
                "source":{"kind":"segments","segments":[{"voltage_mv":5000,"samples":1}]}}"#,
        )
        .unwrap();
        assert_eq!(
            scenario.charger_type().unwrap(),
            ChargerType::CDP | ChargerType::DCP
        );
        assert_eq!(scenario.initial_current_ua, DEFAULT_CEILING_UA);
        assert_eq!(scenario.protection, ProtectionConfig::default());
    }

    #[test]
    fn rejects_unknown_charger_type() {
        let err = Scenario::from_json(
            r#"{"name":"x","charger_types":["qc5"],
                "source":{"kind":"segments","segments":[{"voltage_mv":5000,"samples":1}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownChargerType(name) if name == "qc5"));
    }

    #[test]
    fn rejects_empty_source() {
        let err = Scenario::from_json(
            r#"{"name":"quiet","charger_types":["sdp"],
                "source":{"kind":"segments","segments":[]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScenarioError::Empty(_)));
    }

    #[test]
    fn rejects_overlapping_bands() {
        let err = Scenario::from_json(
            r#"{"name":"x","charger_types":["sdp"],
                "protection":{"ovp_mv":4500,"uvp_mv":4400},
                "source":{"kind":"segments","segments":[{"voltage_mv":5000,"samples":1}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScenarioError::Config(_)));
    }

    #[test]
    fn huge_segment_is_read_without_expanding() {
        let scenario = Scenario::from_json(
            r#"{"name":"long-soak","charger_types":["dcp"],
                "source":{"kind":"segments","segments":[
                    {"voltage_mv":5000,"samples":4000000000},
                    {"voltage_mv":6000,"samples":1}]}}"#,
        )
        .unwrap();
        assert_eq!(scenario.source.sample_count(), 4_000_000_001);

        let charger = scenario.build_charger().unwrap();
        let mut sensor = scenario.sensor();
        for _ in 0..3 {
            assert_eq!(sensor.read_voltage_mv(&charger), Some(5000));
        }
        let ScenarioSensor::Sequence(seq) = &sensor else {
            panic!("segments build a sequence sensor");
        };
        assert_eq!(seq.remaining(), 3_999_999_998);
    }

    #[test]
    fn rejects_thresholds_that_overflow() {
        let err = Scenario::from_json(
            r#"{"name":"x","charger_types":["sdp"],
                "protection":{"uvp_mv":2147483600,"hysteresis_mv":100},
                "source":{"kind":"segments","segments":[{"voltage_mv":5000,"samples":1}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::Config(ConfigError::ThresholdOverflow { .. })
        ));
    }
}
