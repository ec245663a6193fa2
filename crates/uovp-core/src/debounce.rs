//! Debounce and hysteresis state machine.
//!
//! Pure: consumes classifier zones and reports what the protection shell
//! should do, without touching the charger.

use crate::classifier::{Excursion, Zone};
use crate::table::Direction;
use serde::Serialize;

/// Consecutive-sample run for the current verdict.
///
/// A fault run counts the samples after the one that opened it; a normal run
/// counts the samples after the one that closed the preceding fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Streak {
    Normal(u32),
    Fault { count: u32, excursion: Excursion },
}

impl Default for Streak {
    fn default() -> Self {
        Streak::Normal(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPass {
    /// Sample is not a definite fault.
    Clear,
    /// First fault after a normal run: re-apply the last known-good current.
    RestoreLastSafe,
    /// Step the current limit to counteract the fault.
    Adjust(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalPass {
    /// Fresh fault transition this sample; the normal check does not run.
    Skipped,
    /// Still inside a fault or hysteresis band.
    Hold,
    /// Normal verdict recorded, nothing to act on yet.
    Normal,
    /// Charging is cut off; the shell decides whether the run is long enough.
    EvaluateRestore { normal_streak: u32 },
    /// Normal run reached the threshold; the streak has been reset.
    Increase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Debouncer {
    threshold: u32,
    streak: Streak,
    was_fault: bool,
    last_excursion: Option<Excursion>,
    held: bool,
    fault_seen: bool,
}

impl Debouncer {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            streak: Streak::default(),
            was_fault: false,
            last_excursion: None,
            held: false,
            fault_seen: false,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn streak(&self) -> Streak {
        self.streak
    }

    pub fn is_fault(&self) -> bool {
        matches!(self.streak, Streak::Fault { .. })
    }

    pub fn was_fault(&self) -> bool {
        self.was_fault
    }

    pub fn fault_streak(&self) -> u32 {
        match self.streak {
            Streak::Fault { count, .. } => count,
            Streak::Normal(_) => 0,
        }
    }

    pub fn normal_streak(&self) -> u32 {
        match self.streak {
            Streak::Normal(count) => count,
            Streak::Fault { .. } => 0,
        }
    }

    /// Direction of the most recent definite fault.
    pub fn last_excursion(&self) -> Option<Excursion> {
        self.last_excursion
    }

    /// Last sample fell in a hysteresis band and the verdict was held.
    pub fn held(&self) -> bool {
        self.held
    }

    /// A fault has been recorded since this debouncer was created; later
    /// increases count as recovery.
    pub fn fault_seen(&self) -> bool {
        self.fault_seen
    }

    pub fn fresh_fault_transition(&self) -> bool {
        self.is_fault() && !self.was_fault
    }

    pub fn fault_pass(&mut self, zone: Zone, has_last_safe: bool) -> FaultPass {
        self.held = false;
        let Zone::Fault(excursion) = zone else {
            return FaultPass::Clear;
        };

        let count = match self.streak {
            Streak::Fault { count, .. } if self.was_fault => count.saturating_add(1),
            _ => 0,
        };
        self.streak = Streak::Fault { count, excursion };
        self.last_excursion = Some(excursion);
        self.fault_seen = true;

        if !self.was_fault && has_last_safe {
            FaultPass::RestoreLastSafe
        } else {
            FaultPass::Adjust(excursion.corrective_direction())
        }
    }

    pub fn normal_pass(&mut self, zone: Zone, fault_flag: bool, locked: bool) -> NormalPass {
        if self.fresh_fault_transition() {
            return NormalPass::Skipped;
        }
        match zone {
            Zone::Normal => {}
            Zone::Hysteresis(_) => {
                self.held = true;
                return NormalPass::Hold;
            }
            Zone::Fault(_) => return NormalPass::Hold,
        }

        let normal_streak = match self.streak {
            Streak::Normal(count) if !self.was_fault => count.saturating_add(1),
            _ => 0,
        };
        self.streak = Streak::Normal(normal_streak);

        if fault_flag {
            return NormalPass::EvaluateRestore { normal_streak };
        }
        if !locked && normal_streak >= self.threshold {
            self.streak = Streak::Normal(0);
            return NormalPass::Increase;
        }
        NormalPass::Normal
    }

    /// Close the sample: the verdict becomes the previous verdict.
    pub fn commit(&mut self) {
        self.was_fault = self.is_fault();
    }
}
