//! Protection state and its three entry points.
//!
//! [`Protection`] owns the charger handle while enabled and runs the
//! classify → debounce → act pipeline once per voltage sample. Decisions come
//! from the pure [`Debouncer`], [`CurrentController::plan`] and
//! [`CutoffManager`] thresholds; this module only executes them.

use crate::classifier::{Excursion, Thresholds, Zone};
use crate::config::{ConfigError, ProtectionConfig};
use crate::controller::{ControlError, CurrentController, StepPlan};
use crate::cutoff::CutoffManager;
use crate::debounce::{Debouncer, FaultPass, NormalPass, Streak};
use crate::hal::{Charger, ChargerType};
use crate::table::{CurrentStepTable, Direction};
use log::{debug, info, warn};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum ProtectionPhase {
    Disabled,
    Settling { remaining: u32 },
    Normal,
    Ambiguous,
    Faulted { streak: u32 },
    RecoveringLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    NoInputPower,
    Settling,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ProtectionAction {
    CurrentStepped {
        direction: Direction,
        from_ua: u32,
        to_ua: u32,
    },
    LastSafeRestored { current_ua: u32 },
    CurrentLocked { current_ua: u32 },
    /// Suspend-on-collapse turned off for the under-voltage session.
    UndervoltageConfigured,
    Stalled { reason: String },
    ReadFailed { reason: String },
    CutOff,
    Restored,
}

/// What one call to [`Protection::on_voltage_sample`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleReport {
    pub voltage_mv: i32,
    pub zone: Option<Zone>,
    pub skipped: Option<SkipReason>,
    pub actions: Vec<ProtectionAction>,
}

impl SampleReport {
    fn skipped(voltage_mv: i32, reason: SkipReason) -> Self {
        Self {
            voltage_mv,
            zone: None,
            skipped: Some(reason),
            actions: Vec::new(),
        }
    }

    fn processed(voltage_mv: i32, zone: Zone) -> Self {
        Self {
            voltage_mv,
            zone: Some(zone),
            skipped: None,
            actions: Vec::new(),
        }
    }

    pub fn cut_off(&self) -> bool {
        self.actions.contains(&ProtectionAction::CutOff)
    }

    pub fn restored(&self) -> bool {
        self.actions.contains(&ProtectionAction::Restored)
    }

    /// Final limit written this sample, if any.
    pub fn applied_current_ua(&self) -> Option<u32> {
        self.actions.iter().rev().find_map(|a| match a {
            ProtectionAction::CurrentStepped { to_ua, .. } => Some(*to_ua),
            ProtectionAction::LastSafeRestored { current_ua } => Some(*current_ua),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectionState {
    enabled: bool,
    voltage_mv: i32,
    current_ua: u32,
    last_safe_current_ua: u32,
    current_locked: bool,
    undervoltage_configured: bool,
    settle_remaining: u32,
    debounce: Debouncer,
}

impl ProtectionState {
    fn new(config: &ProtectionConfig) -> Self {
        Self {
            enabled: false,
            voltage_mv: 0,
            current_ua: 0,
            last_safe_current_ua: 0,
            current_locked: false,
            undervoltage_configured: false,
            settle_remaining: 0,
            debounce: Debouncer::new(config.debounce_samples),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn voltage_mv(&self) -> i32 {
        self.voltage_mv
    }

    pub fn current_ua(&self) -> u32 {
        self.current_ua
    }

    pub fn last_safe_current_ua(&self) -> u32 {
        self.last_safe_current_ua
    }

    pub fn current_locked(&self) -> bool {
        self.current_locked
    }

    /// The charger has been reconfigured to ride through input collapse.
    pub fn undervoltage_configured(&self) -> bool {
        self.undervoltage_configured
    }

    pub fn is_fault(&self) -> bool {
        self.debounce.is_fault()
    }

    pub fn was_fault(&self) -> bool {
        self.debounce.was_fault()
    }

    pub fn fault_streak(&self) -> u32 {
        self.debounce.fault_streak()
    }

    pub fn normal_streak(&self) -> u32 {
        self.debounce.normal_streak()
    }

    pub fn overvoltage_flavor(&self) -> bool {
        self.debounce.last_excursion() == Some(Excursion::Over)
    }

    pub fn debounce(&self) -> &Debouncer {
        &self.debounce
    }
}

pub struct Protection<C: Charger> {
    config: ProtectionConfig,
    thresholds: Thresholds,
    controller: CurrentController,
    cutoff: CutoffManager,
    charger: Option<C>,
    state: ProtectionState,
}

impl<C: Charger> Protection<C> {
    pub fn new(config: ProtectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: ProtectionConfig) -> Self {
        Self {
            thresholds: config.thresholds(),
            controller: CurrentController::new(CurrentStepTable::STANDARD),
            cutoff: CutoffManager::new(config.debounce_samples),
            charger: None,
            state: ProtectionState::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &ProtectionConfig {
        &self.config
    }

    pub fn state(&self) -> &ProtectionState {
        &self.state
    }

    pub fn charger(&self) -> Option<&C> {
        self.charger.as_ref()
    }

    pub fn charger_mut(&mut self) -> Option<&mut C> {
        self.charger.as_mut()
    }

    pub fn phase(&self) -> ProtectionPhase {
        let state = &self.state;
        if !state.enabled {
            return ProtectionPhase::Disabled;
        }
        if state.settle_remaining > 0 {
            return ProtectionPhase::Settling {
                remaining: state.settle_remaining,
            };
        }
        if state.current_locked {
            return ProtectionPhase::RecoveringLocked;
        }
        match state.debounce.streak() {
            Streak::Fault { count, .. } => ProtectionPhase::Faulted { streak: count },
            Streak::Normal(_) if state.debounce.held() => ProtectionPhase::Ambiguous,
            Streak::Normal(_) => ProtectionPhase::Normal,
        }
    }

    /// Bind `charger` and start protecting. Returns `false` (and drops the
    /// handle) if protection is already enabled.
    pub fn enable_protection(&mut self, charger: C) -> bool {
        if self.state.enabled {
            debug!("protection already enabled, ignoring charger handle");
            return false;
        }
        self.state = ProtectionState::new(&self.config);
        self.state.enabled = true;
        self.state.settle_remaining = self.config.settle_samples;
        info!(
            "charger voltage protection enabled, type={}",
            charger.charger_type()
        );
        self.charger = Some(charger);
        true
    }

    /// Reset all state and hand the charger back. `None` if already disabled.
    pub fn disable_protection(&mut self) -> Option<C> {
        if !self.state.enabled {
            return None;
        }
        let mut charger = self.charger.take();
        if let Some(charger) = charger.as_mut() {
            if self.state.undervoltage_configured {
                match charger.set_suspend_on_collapse(true) {
                    Ok(()) => charger.rerun_autodetect(),
                    Err(e) => warn!("failed to re-enable suspend on collapse: {}", e),
                }
            }
            if self.config.clear_fault_flag_on_disable {
                charger.set_global_fault_flag(false);
            }
        }
        self.state = ProtectionState::new(&self.config);
        info!("charger voltage protection disabled");
        charger
    }

    pub fn on_voltage_sample(&mut self, voltage_mv: i32) -> SampleReport {
        let Some(charger) = self.charger.as_mut() else {
            return SampleReport::skipped(voltage_mv, SkipReason::Disabled);
        };
        if !charger.is_input_power_present() {
            debug!("no input power present, skip voltage check");
            return SampleReport::skipped(voltage_mv, SkipReason::NoInputPower);
        }
        if self.state.settle_remaining > 0 {
            self.state.settle_remaining -= 1;
            debug!("waiting for charger input to settle ({} mV)", voltage_mv);
            return SampleReport::skipped(voltage_mv, SkipReason::Settling);
        }

        let zone = self.thresholds.classify(voltage_mv);
        self.state.voltage_mv = voltage_mv;
        debug!("vchg={} mV zone={:?}", voltage_mv, zone);

        let mut cycle = Cycle {
            charger,
            state: &mut self.state,
            controller: &self.controller,
            cutoff: &self.cutoff,
            report: SampleReport::processed(voltage_mv, zone),
        };
        cycle.fault_pass(zone);
        cycle.normal_pass(zone);
        cycle.state.debounce.commit();
        cycle.report
    }
}

impl<C: Charger> Default for Protection<C> {
    fn default() -> Self {
        Self::from_valid(ProtectionConfig::default())
    }
}

/// Borrowed view used while processing one sample.
struct Cycle<'a, C: Charger> {
    charger: &'a mut C,
    state: &'a mut ProtectionState,
    controller: &'a CurrentController,
    cutoff: &'a CutoffManager,
    report: SampleReport,
}

impl<C: Charger> Cycle<'_, C> {
    fn fault_pass(&mut self, zone: Zone) {
        // Once locked the learned current has already been applied; re-applying
        // it could raise the limit.
        let can_restore = self.state.last_safe_current_ua != 0 && !self.state.current_locked;
        match self.state.debounce.fault_pass(zone, can_restore) {
            FaultPass::Clear => {}
            FaultPass::RestoreLastSafe => self.restore_last_safe(),
            FaultPass::Adjust(direction) => {
                if zone == Zone::Fault(Excursion::Under) && self.configure_undervoltage() {
                    return;
                }
                debug!(
                    "fault streak={} direction={:?}",
                    self.state.debounce.fault_streak(),
                    direction
                );
                match self.adjust(direction, false) {
                    Ok(_) => {}
                    Err(e) if e.is_stall() => {
                        if !self.charger.global_fault_flag()
                            && self
                                .cutoff
                                .cutoff(self.charger, self.state.debounce.fault_streak())
                        {
                            self.report.actions.push(ProtectionAction::CutOff);
                        }
                    }
                    Err(_) => {}
                }
            }
        }
    }

    fn normal_pass(&mut self, zone: Zone) {
        let fault_flag = self.charger.global_fault_flag();
        let locked = self.state.current_locked;
        match self.state.debounce.normal_pass(zone, fault_flag, locked) {
            NormalPass::Skipped | NormalPass::Hold | NormalPass::Normal => {}
            NormalPass::EvaluateRestore { normal_streak } => {
                if self.cutoff.restore(self.charger, normal_streak) {
                    self.report.actions.push(ProtectionAction::Restored);
                }
            }
            NormalPass::Increase => {
                let recovering = self.state.debounce.fault_seen();
                match self.adjust(Direction::Increase, true) {
                    Ok(plan) => {
                        if recovering && plan.reaches_ceiling() {
                            self.lock(plan.target_ua);
                        }
                    }
                    Err(ControlError::AlreadyAtBound { current_ua }) if recovering => {
                        self.lock(current_ua);
                    }
                    Err(_) => {}
                }
            }
        }
    }

    /// First under-voltage fault: let the charger ride through input collapse
    /// instead of suspending, then re-detect the input. Not done for SDP ports.
    /// Returns true when the charger was reconfigured, which replaces this
    /// sample's current step.
    fn configure_undervoltage(&mut self) -> bool {
        if self.state.undervoltage_configured
            || self.charger.charger_type().intersects(ChargerType::SDP)
        {
            return false;
        }
        match self.charger.set_suspend_on_collapse(false) {
            Ok(()) => {
                self.charger.rerun_autodetect();
                self.state.undervoltage_configured = true;
                info!("under-voltage: suspend on input collapse disabled");
                self.report
                    .actions
                    .push(ProtectionAction::UndervoltageConfigured);
                true
            }
            Err(e) => {
                warn!("failed to disable suspend on collapse: {}", e);
                false
            }
        }
    }

    /// Observe, optionally record as last safe, then step once. Failures are
    /// logged and reported here; callers only decide on escalation.
    fn adjust(&mut self, direction: Direction, record_safe: bool) -> Result<StepPlan, ControlError> {
        let result = self
            .controller
            .observe(&*self.charger)
            .and_then(|observed_ua| {
                self.state.current_ua = observed_ua;
                if record_safe {
                    self.state.last_safe_current_ua = observed_ua;
                }
                self.controller.step(
                    self.charger,
                    observed_ua,
                    direction,
                    self.state.current_locked,
                )
            });

        match &result {
            Ok(plan) => {
                self.state.current_ua = plan.target_ua;
                self.report.actions.push(ProtectionAction::CurrentStepped {
                    direction,
                    from_ua: plan.observed_ua,
                    to_ua: plan.target_ua,
                });
            }
            Err(e @ ControlError::TransientReadFailure(_)) => {
                warn!("{}", e);
                self.report.actions.push(ProtectionAction::ReadFailed {
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                debug!("current controller stalled: {}", e);
                self.report.actions.push(ProtectionAction::Stalled {
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    fn restore_last_safe(&mut self) {
        let target_ua = self.state.last_safe_current_ua;
        info!("fault after normal run, restoring last safe current {} uA", target_ua);
        match self.controller.apply(self.charger, target_ua) {
            Ok(()) => {
                self.state.current_ua = target_ua;
                self.report
                    .actions
                    .push(ProtectionAction::LastSafeRestored {
                        current_ua: target_ua,
                    });
                self.lock(target_ua);
            }
            Err(e) => {
                warn!("{}", e);
                self.report.actions.push(ProtectionAction::Stalled {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn lock(&mut self, current_ua: u32) {
        if self.state.current_locked {
            return;
        }
        info!("locking input current limit at {} uA", current_ua);
        self.state.current_locked = true;
        self.report
            .actions
            .push(ProtectionAction::CurrentLocked { current_ua });
    }
}
