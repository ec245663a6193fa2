//! Input current steps and their per-charger-type ceilings.

use crate::hal::ChargerType;
use serde::Serialize;

/// Ceiling used when no table entry claims the detected charger type (1.5 A).
pub const DEFAULT_CEILING_UA: u32 = 1_500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentStep {
    pub max_current_ua: u32,
    /// Charger types for which this step is the highest allowed current.
    pub charger_types: ChargerType,
}

const fn step(max_current_ua: u32, charger_types: ChargerType) -> CurrentStep {
    CurrentStep {
        max_current_ua,
        charger_types,
    }
}

const STANDARD_STEPS: [CurrentStep; 8] = [
    step(500_000, ChargerType::SDP),
    step(900_000, ChargerType::UNKNOWN),
    step(1_000_000, ChargerType::empty()),
    step(1_250_000, ChargerType::empty()),
    step(1_500_000, ChargerType::from_bits(ChargerType::CDP.bits() | ChargerType::DCP.bits())),
    step(2_000_000, ChargerType::empty()),
    step(2_500_000, ChargerType::empty()),
    step(3_000_000, ChargerType::FAST),
];

/// Ordered list of current steps, strictly increasing in `max_current_ua`.
#[derive(Debug, Clone, Copy)]
pub struct CurrentStepTable {
    steps: &'static [CurrentStep],
}

impl CurrentStepTable {
    pub const STANDARD: Self = Self {
        steps: &STANDARD_STEPS,
    };

    pub fn steps(&self) -> &'static [CurrentStep] {
        self.steps
    }

    /// Lowest current the controller will ever step down to.
    pub fn floor_ua(&self) -> u32 {
        self.steps
            .first()
            .map(|s| s.max_current_ua)
            .unwrap_or(DEFAULT_CEILING_UA)
    }

    pub fn ceiling_for(&self, charger_type: ChargerType) -> u32 {
        self.steps
            .iter()
            .filter(|s| s.charger_types.intersects(charger_type))
            .map(|s| s.max_current_ua)
            .max()
            .unwrap_or(DEFAULT_CEILING_UA)
    }

    /// Next step away from `current_ua`.
    ///
    /// Increases are clamped to `ceiling_ua`, decreases floored at
    /// [`floor_ua`](Self::floor_ua). A result equal to `current_ua` means no
    /// further step exists in that direction.
    pub fn next_step(&self, current_ua: u32, direction: Direction, ceiling_ua: u32) -> u32 {
        match direction {
            Direction::Increase => self
                .steps
                .iter()
                .map(|s| s.max_current_ua)
                .find(|&ua| ua > current_ua)
                .unwrap_or(ceiling_ua)
                .min(ceiling_ua),
            Direction::Decrease => {
                let floor = self.floor_ua();
                self.steps
                    .iter()
                    .rev()
                    .map(|s| s.max_current_ua)
                    .find(|&ua| ua < current_ua)
                    .unwrap_or(floor)
                    .max(floor)
            }
        }
    }
}

impl Default for CurrentStepTable {
    fn default() -> Self {
        Self::STANDARD
    }
}
