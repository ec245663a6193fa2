pub mod metrics;
pub mod scenario;

pub use scenario::{Scenario, ScenarioError, ScenarioSensor, Segment, VoltageSource};
