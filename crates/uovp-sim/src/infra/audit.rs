//! Audit logging for protection events.
//!
//! Every cutoff, restore, limit change and lock is appended to a JSONL file
//! so a run can be replayed after the fact.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use uovp_core::{ProtectionAction, SampleReport};

/// Types of events that are logged in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Simulator started a scenario
    SimulationStart,
    /// Protection bound to a charger
    ProtectionEnabled,
    /// Input current limit stepped up or down
    CurrentChanged,
    /// Last known-good current re-applied after a fault
    LastSafeRestored,
    /// Input current limit locked for the rest of the session
    CurrentLocked,
    /// Charger set to ride through input collapse
    UndervoltageConfigured,
    /// Charging disabled on a sustained fault
    ChargingCutOff,
    /// Charging re-enabled after sustained recovery
    ChargingRestored,
    /// Protection released the charger
    ProtectionDisabled,
    /// Simulator finished the scenario
    SimulationEnd,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Index of the voltage sample that produced the event
    pub sample: u64,
    /// Wall-clock Unix timestamp in microseconds
    pub unix_us: u64,
    pub event_type: AuditEventType,
    pub details: serde_json::Value,
}

/// Thread-safe audit logger that writes to a JSONL file
pub struct AuditLogger {
    writer: Mutex<BufWriter<File>>,
}

impl AuditLogger {
    /// Create a new audit logger writing to the specified path.
    /// The file is opened in append mode to preserve existing logs.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
        })
    }

    pub fn log(&self, entry: AuditEntry) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    pub fn log_event(
        &self,
        sample: u64,
        event_type: AuditEventType,
        details: serde_json::Value,
    ) -> std::io::Result<()> {
        self.log(AuditEntry {
            sample,
            unix_us: unix_now_us(),
            event_type,
            details,
        })
    }

    /// Log every auditable action in `report`. Stalls and read failures are
    /// left to the tracing log.
    pub fn log_report(&self, sample: u64, report: &SampleReport) -> std::io::Result<()> {
        for (event_type, details) in report_events(report) {
            self.log_event(sample, event_type, details)?;
        }
        Ok(())
    }
}

pub fn report_events(report: &SampleReport) -> Vec<(AuditEventType, serde_json::Value)> {
    let voltage_mv = report.voltage_mv;
    report
        .actions
        .iter()
        .filter_map(|action| match action {
            ProtectionAction::CurrentStepped {
                direction,
                from_ua,
                to_ua,
            } => Some((
                AuditEventType::CurrentChanged,
                serde_json::json!({
                    "direction": direction,
                    "from_ua": from_ua,
                    "to_ua": to_ua,
                    "voltage_mv": voltage_mv,
                }),
            )),
            ProtectionAction::LastSafeRestored { current_ua } => Some((
                AuditEventType::LastSafeRestored,
                serde_json::json!({ "current_ua": current_ua, "voltage_mv": voltage_mv }),
            )),
            ProtectionAction::CurrentLocked { current_ua } => Some((
                AuditEventType::CurrentLocked,
                serde_json::json!({ "current_ua": current_ua }),
            )),
            ProtectionAction::UndervoltageConfigured => Some((
                AuditEventType::UndervoltageConfigured,
                serde_json::json!({ "voltage_mv": voltage_mv }),
            )),
            ProtectionAction::CutOff => Some((
                AuditEventType::ChargingCutOff,
                serde_json::json!({ "voltage_mv": voltage_mv, "zone": report.zone }),
            )),
            ProtectionAction::Restored => Some((
                AuditEventType::ChargingRestored,
                serde_json::json!({ "voltage_mv": voltage_mv }),
            )),
            ProtectionAction::Stalled { .. } | ProtectionAction::ReadFailed { .. } => None,
        })
        .collect()
}

fn unix_now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;
    use uovp_core::{ChargerType, Protection, SimulatedCharger};

    #[test]
    fn test_audit_logger_writes_jsonl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.jsonl");

        let logger = AuditLogger::new(&path).unwrap();
        logger
            .log_event(
                0,
                AuditEventType::ProtectionEnabled,
                serde_json::json!({"charger_type": "dcp"}),
            )
            .unwrap();
        logger
            .log_event(4, AuditEventType::ChargingCutOff, serde_json::json!({}))
            .unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let entry: AuditEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(entry.sample, 4);
        assert_eq!(entry.event_type, AuditEventType::ChargingCutOff);
        assert!(lines[0].contains("\"protection_enabled\""));
    }

    #[test]
    fn test_audit_logger_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        for sample in 0..2 {
            let logger = AuditLogger::new(&path).unwrap();
            logger
                .log_event(sample, AuditEventType::SimulationStart, serde_json::json!({}))
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn report_events_follow_actions() {
        let mut protection = Protection::default();
        protection.enable_protection(SimulatedCharger::new(ChargerType::DCP, 500_000));
        for _ in 0..2 {
            assert!(report_events(&protection.on_voltage_sample(5000)).is_empty());
        }

        let events = report_events(&protection.on_voltage_sample(5000));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, AuditEventType::CurrentChanged);
        assert_eq!(events[0].1["to_ua"], 900_000);

        let events: Vec<AuditEventType> = report_events(&protection.on_voltage_sample(4200))
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(
            events,
            vec![
                AuditEventType::LastSafeRestored,
                AuditEventType::CurrentLocked
            ]
        );
    }

    #[test]
    fn undervoltage_config_is_audited() {
        let mut protection = Protection::default();
        protection.enable_protection(SimulatedCharger::new(ChargerType::DCP, 1_500_000));
        let events = report_events(&protection.on_voltage_sample(4200));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, AuditEventType::UndervoltageConfigured);
        assert_eq!(events[0].1["voltage_mv"], 4200);
    }
}
