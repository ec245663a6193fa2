use crate::hal::{Charger, ChargerError, ChargerType};
use std::cell::Cell;

/// Counts of side-effecting charger calls, for tests and run summaries.
#[derive(Clone, Default, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ChargerCallStats {
    pub current_writes: u32,
    pub autodetect_reruns: u32,
    pub suspend_on_collapse_writes: u32,
    pub temperature_checks: u32,
    pub charging_disables: u32,
    pub charging_enables: u32,
    pub fault_flag_sets: u32,
    pub fault_flag_clears: u32,
}

/// In-memory charger with injectable bus failures.
#[derive(Debug, Clone)]
pub struct SimulatedCharger {
    charger_type: ChargerType,
    input_present: bool,
    current_limit_ua: u32,
    charging_enabled: bool,
    global_fault: bool,
    suspend_on_collapse: bool,
    failing_reads: Cell<u32>,
    failing_writes: u32,
    stats: ChargerCallStats,
}

impl SimulatedCharger {
    pub fn new(charger_type: ChargerType, current_limit_ua: u32) -> Self {
        Self {
            charger_type,
            input_present: true,
            current_limit_ua,
            charging_enabled: true,
            global_fault: false,
            suspend_on_collapse: true,
            failing_reads: Cell::new(0),
            failing_writes: 0,
            stats: ChargerCallStats::default(),
        }
    }

    pub fn current_limit_ua(&self) -> u32 {
        self.current_limit_ua
    }

    pub fn charging_enabled(&self) -> bool {
        self.charging_enabled
    }

    pub fn suspend_on_collapse(&self) -> bool {
        self.suspend_on_collapse
    }

    pub fn stats(&self) -> &ChargerCallStats {
        &self.stats
    }

    pub fn set_input_present(&mut self, present: bool) {
        self.input_present = present;
    }

    pub fn set_charger_type(&mut self, charger_type: ChargerType) {
        self.charger_type = charger_type;
    }

    /// Change the limit behind the controller's back, as another voter would.
    pub fn override_current_limit(&mut self, current_ua: u32) {
        self.current_limit_ua = current_ua;
    }

    pub fn fail_next_reads(&mut self, count: u32) {
        self.failing_reads.set(count);
    }

    pub fn fail_next_writes(&mut self, count: u32) {
        self.failing_writes = count;
    }

    /// Current actually drawn from the input: zero while charging is off.
    pub fn drawn_current_ua(&self) -> u32 {
        if self.charging_enabled && self.input_present {
            self.current_limit_ua
        } else {
            0
        }
    }
}

impl Charger for SimulatedCharger {
    fn is_input_power_present(&self) -> bool {
        self.input_present
    }

    fn get_current_limit(&self) -> Result<u32, ChargerError> {
        let pending = self.failing_reads.get();
        if pending > 0 {
            self.failing_reads.set(pending - 1);
            return Err(ChargerError::Bus("simulated read failure".to_string()));
        }
        Ok(self.current_limit_ua)
    }

    fn set_current_limit(&mut self, current_ua: u32) -> Result<(), ChargerError> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(ChargerError::Rejected {
                requested_ua: current_ua,
            });
        }
        self.current_limit_ua = current_ua;
        self.stats.current_writes += 1;
        Ok(())
    }

    fn rerun_autodetect(&mut self) {
        self.stats.autodetect_reruns += 1;
    }

    fn set_suspend_on_collapse(&mut self, enabled: bool) -> Result<(), ChargerError> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(ChargerError::Bus("simulated config write failure".to_string()));
        }
        self.suspend_on_collapse = enabled;
        self.stats.suspend_on_collapse_writes += 1;
        Ok(())
    }

    fn set_charging_enabled(&mut self, enabled: bool) {
        if enabled {
            self.stats.charging_enables += 1;
        } else {
            self.stats.charging_disables += 1;
        }
        self.charging_enabled = enabled;
    }

    fn global_fault_flag(&self) -> bool {
        self.global_fault
    }

    fn set_global_fault_flag(&mut self, set: bool) {
        if set {
            self.stats.fault_flag_sets += 1;
        } else {
            self.stats.fault_flag_clears += 1;
        }
        self.global_fault = set;
    }

    fn check_battery_temperature(&mut self) {
        self.stats.temperature_checks += 1;
    }

    fn charger_type(&self) -> ChargerType {
        self.charger_type
    }
}

/// Charger input source with an internal resistance: the measured voltage sags
/// as the charger draws more current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimulatedSupply {
    pub open_circuit_mv: i32,
    pub source_resistance_mohm: u32,
}

impl SimulatedSupply {
    pub fn voltage_mv(&self, drawn_ua: u32) -> i32 {
        let drop_mv = i64::from(drawn_ua) * i64::from(self.source_resistance_mohm) / 1_000_000;
        (i64::from(self.open_circuit_mv) - drop_mv).clamp(0, i64::from(i32::MAX)) as i32
    }

    pub fn measure(&self, charger: &SimulatedCharger) -> i32 {
        self.voltage_mv(charger.drawn_current_ua())
    }
}
