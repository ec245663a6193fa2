use crate::hal::Charger;
use log::info;

/// Disables charging on a sustained fault and re-enables it on sustained recovery.
#[derive(Debug, Clone, Copy)]
pub struct CutoffManager {
    threshold: u32,
}

impl CutoffManager {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// The fault streak excludes the sample that opened the run, so the run is
    /// `threshold + 1` samples long here.
    pub fn should_cutoff(&self, fault_streak: u32) -> bool {
        fault_streak >= self.threshold
    }

    pub fn should_restore(&self, normal_streak: u32) -> bool {
        normal_streak >= self.threshold
    }

    /// Returns whether charging was cut off.
    pub fn cutoff<C: Charger + ?Sized>(&self, charger: &mut C, fault_streak: u32) -> bool {
        if !self.should_cutoff(fault_streak) {
            return false;
        }
        info!(
            "charger input voltage out of range for {} samples, stop charging",
            fault_streak + 1
        );
        charger.set_charging_enabled(false);
        charger.set_global_fault_flag(true);
        true
    }

    /// Returns whether charging was restored.
    pub fn restore<C: Charger + ?Sized>(&self, charger: &mut C, normal_streak: u32) -> bool {
        if !self.should_restore(normal_streak) {
            return false;
        }
        info!("charger input voltage back to normal, resume charging");
        charger.set_charging_enabled(true);
        charger.check_battery_temperature();
        charger.rerun_autodetect();
        charger.set_global_fault_flag(false);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::ChargerType;
    use crate::hal_sim::SimulatedCharger;

    #[test]
    fn cutoff_below_threshold_is_noop() {
        let mut charger = SimulatedCharger::new(ChargerType::DCP, 1_500_000);
        let manager = CutoffManager::new(3);
        assert!(!manager.cutoff(&mut charger, 2));
        assert!(charger.charging_enabled());
        assert!(!charger.global_fault_flag());
    }

    #[test]
    fn cutoff_disables_and_flags() {
        let mut charger = SimulatedCharger::new(ChargerType::DCP, 1_500_000);
        assert!(CutoffManager::new(3).cutoff(&mut charger, 3));
        assert!(!charger.charging_enabled());
        assert!(charger.global_fault_flag());
    }

    #[test]
    fn restore_reenables_and_rechecks() {
        let mut charger = SimulatedCharger::new(ChargerType::DCP, 1_500_000);
        let manager = CutoffManager::new(3);
        manager.cutoff(&mut charger, 5);
        assert!(!manager.restore(&mut charger, 2));
        assert!(charger.global_fault_flag());

        assert!(manager.restore(&mut charger, 3));
        assert!(charger.charging_enabled());
        assert!(!charger.global_fault_flag());
        assert_eq!(charger.stats().temperature_checks, 1);
        assert_eq!(charger.stats().autodetect_reruns, 1);
    }
}
