use crate::hal::{Charger, ChargerError, ChargerType};
use crate::table::{CurrentStepTable, Direction};
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("failed to read input current limit: {0}")]
    TransientReadFailure(#[source] ChargerError),

    #[error("failed to apply input current limit {target_ua} uA: {source}")]
    ApplyFailure {
        target_ua: u32,
        #[source]
        source: ChargerError,
    },

    #[error("input current limit already at {current_ua} uA")]
    AlreadyAtBound { current_ua: u32 },

    #[error("input current limit locked at {current_ua} uA")]
    CurrentLocked { current_ua: u32 },
}

impl ControlError {
    /// The controller could not make progress; cutoff should be evaluated.
    ///
    /// Read failures are not stalls: nothing was attempted and the next
    /// sample retries.
    pub fn is_stall(&self) -> bool {
        !matches!(self, ControlError::TransientReadFailure(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepPlan {
    pub observed_ua: u32,
    pub target_ua: u32,
    /// Ceiling the increase was clamped to; `None` for decreases.
    pub ceiling_ua: Option<u32>,
}

impl StepPlan {
    pub fn reaches_ceiling(&self) -> bool {
        self.ceiling_ua == Some(self.target_ua)
    }
}

/// Steps the charger's input current limit through a [`CurrentStepTable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentController {
    table: CurrentStepTable,
}

impl CurrentController {
    pub fn new(table: CurrentStepTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CurrentStepTable {
        &self.table
    }

    pub fn observe<C: Charger + ?Sized>(&self, charger: &C) -> Result<u32, ControlError> {
        charger
            .get_current_limit()
            .map_err(ControlError::TransientReadFailure)
    }

    /// Compute the next limit without touching the charger.
    pub fn plan(
        &self,
        observed_ua: u32,
        direction: Direction,
        charger_type: ChargerType,
        locked: bool,
    ) -> Result<StepPlan, ControlError> {
        let plan = match direction {
            Direction::Increase => {
                if locked {
                    return Err(ControlError::CurrentLocked {
                        current_ua: observed_ua,
                    });
                }
                let ceiling_ua = self.table.ceiling_for(charger_type);
                StepPlan {
                    observed_ua,
                    target_ua: self.table.next_step(observed_ua, direction, ceiling_ua),
                    ceiling_ua: Some(ceiling_ua),
                }
            }
            Direction::Decrease => StepPlan {
                observed_ua,
                target_ua: self.table.next_step(observed_ua, direction, observed_ua),
                ceiling_ua: None,
            },
        };

        if plan.target_ua == observed_ua {
            return Err(ControlError::AlreadyAtBound {
                current_ua: observed_ua,
            });
        }
        Ok(plan)
    }

    /// Write `target_ua` and re-run input current limit detection.
    pub fn apply<C: Charger + ?Sized>(
        &self,
        charger: &mut C,
        target_ua: u32,
    ) -> Result<(), ControlError> {
        info!("setting input current limit to {} uA", target_ua);
        charger
            .set_current_limit(target_ua)
            .map_err(|source| ControlError::ApplyFailure { target_ua, source })?;
        charger.rerun_autodetect();
        Ok(())
    }

    /// Plan and apply one step from an already observed limit.
    pub fn step<C: Charger + ?Sized>(
        &self,
        charger: &mut C,
        observed_ua: u32,
        direction: Direction,
        locked: bool,
    ) -> Result<StepPlan, ControlError> {
        let charger_type = charger.charger_type();
        let plan = self
            .plan(observed_ua, direction, charger_type, locked)
            .inspect_err(|e| debug!("no current step ({:?}, {}): {}", direction, charger_type, e))?;
        debug!(
            "stepping {:?} {} -> {} uA (ceiling {:?}, type {})",
            direction, plan.observed_ua, plan.target_ua, plan.ceiling_ua, charger_type
        );
        self.apply(charger, plan.target_ua).inspect_err(|e| warn!("{}", e))?;
        Ok(plan)
    }

    /// Read the current limit and step it once.
    pub fn adjust<C: Charger + ?Sized>(
        &self,
        charger: &mut C,
        direction: Direction,
        locked: bool,
    ) -> Result<StepPlan, ControlError> {
        let observed_ua = self.observe(charger)?;
        self.step(charger, observed_ua, direction, locked)
    }
}
