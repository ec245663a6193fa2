pub mod classifier;
pub mod config;
pub mod controller;
pub mod cutoff;
pub mod debounce;
pub mod hal;
pub mod hal_sim;
pub mod protection;
mod protection_proptest;
pub mod sampler;
pub mod table;
pub mod tags;

pub use classifier::{Excursion, Thresholds, Zone};
pub use config::{ConfigError, ProtectionConfig};
pub use controller::{ControlError, CurrentController, StepPlan};
pub use cutoff::CutoffManager;
pub use debounce::{Debouncer, Streak};
pub use hal::{Charger, ChargerError, ChargerType};
pub use hal_sim::{ChargerCallStats, SimulatedCharger, SimulatedSupply};
pub use protection::{
    Protection, ProtectionAction, ProtectionPhase, ProtectionState, SampleReport, SkipReason,
};
pub use sampler::{
    SampleSequence, Sampler, SamplerConfig, SamplerStats, SupplySensor, VoltageSensor,
};
pub use table::{CurrentStepTable, Direction, DEFAULT_CEILING_UA};
