use crate::infra::audit::{AuditEventType, AuditLogger};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use thiserror::Error;
use tracing::{debug, info, warn};
use uovp_core::{
    Charger, ChargerCallStats, ConfigError, Protection, ProtectionPhase, Sampler, SamplerConfig,
    SamplerStats, SimulatedCharger,
};
use uovp_io::{Scenario, ScenarioError};

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("invalid protection config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to open audit log {}: {source}", path.display())]
    Audit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("protection refused the charger")]
    NotEnabled,
}

/// Charger and protection state after the last sample.
#[derive(Debug, Clone, Serialize)]
pub struct FinalState {
    pub phase: ProtectionPhase,
    pub current_limit_ua: u32,
    pub last_safe_current_ua: u32,
    pub current_locked: bool,
    pub undervoltage_configured: bool,
    pub charging_enabled: bool,
    pub global_fault: bool,
    pub charger_calls: ChargerCallStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub charger_type: String,
    pub stats: SamplerStats,
    pub final_state: FinalState,
}

pub fn run_from_args() -> Result<(), SimError> {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return Ok(());
    }
    if config.list_builtins {
        for name in Scenario::builtin_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let _log_guard = init_tracing(config.json_logs, config.log_file.as_deref());
    let summary = run(&config)?;
    emit_summary(&summary, config.report_path.as_deref())
}

pub fn run(config: &RuntimeConfig) -> Result<RunSummary, SimError> {
    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let scenario = load_scenario(config)?;
    let audit_logger = init_audit_logger(config.audit_path.as_deref())?;
    let audit = |sample: u64, event_type: AuditEventType, details: serde_json::Value| {
        if let Some(logger) = &audit_logger {
            if let Err(e) = logger.log_event(sample, event_type, details) {
                warn!(error = %e, "Failed to write audit entry");
            }
        }
    };

    audit(
        0,
        AuditEventType::SimulationStart,
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "scenario": scenario.name,
            "samples": scenario.source.sample_count(),
            "protection": scenario.protection,
        }),
    );

    let charger = scenario.build_charger()?;
    let charger_type = charger.charger_type();
    let mut protection = Protection::new(scenario.protection.clone())?;
    if !protection.enable_protection(charger) {
        return Err(SimError::NotEnabled);
    }
    audit(
        0,
        AuditEventType::ProtectionEnabled,
        serde_json::json!({
            "charger_type": charger_type.to_string(),
            "initial_current_ua": scenario.initial_current_ua,
        }),
    );

    info!(
        scenario = %scenario.name,
        charger_type = %charger_type,
        ovp_mv = scenario.protection.ovp_mv,
        uvp_mv = scenario.protection.uvp_mv,
        debounce = scenario.protection.debounce_samples,
        "Starting protection sampler"
    );

    let mut sensor = scenario.sensor();
    let mut sampler = Sampler::new(SamplerConfig {
        interval: config.sample_interval,
        max_samples: config.max_samples,
    });
    let stop = AtomicBool::new(false);
    let mut sample = 0u64;

    sampler.run(&mut protection, &mut sensor, &stop, |report, protection| {
        sample += 1;
        telemetry::publish(report, protection);
        debug!(
            sample,
            voltage_mv = report.voltage_mv,
            zone = ?report.zone,
            actions = report.actions.len(),
            "sample processed"
        );
        if report.cut_off() {
            warn!(sample, voltage_mv = report.voltage_mv, "Charging cut off");
        }
        if report.restored() {
            info!(sample, voltage_mv = report.voltage_mv, "Charging restored");
        }
        if let Some(logger) = &audit_logger {
            if let Err(e) = logger.log_report(sample, report) {
                warn!(error = %e, "Failed to write audit entry");
            }
        }
    });

    let stats = sampler.stats().clone();
    let final_state = snapshot(&protection);

    if protection.disable_protection().is_some() {
        audit(sample, AuditEventType::ProtectionDisabled, serde_json::json!({}));
    }
    audit(
        sample,
        AuditEventType::SimulationEnd,
        serde_json::json!({ "stats": stats }),
    );

    info!(
        samples = stats.samples_seen,
        cutoffs = stats.cutoffs,
        restores = stats.restores,
        final_current_ua = final_state.current_limit_ua,
        "Run complete"
    );

    Ok(RunSummary {
        scenario: scenario.name,
        charger_type: charger_type.to_string(),
        stats,
        final_state,
    })
}

fn load_scenario(config: &RuntimeConfig) -> Result<Scenario, ScenarioError> {
    match &config.scenario_path {
        Some(path) => {
            info!(path = %path.display(), "Loading scenario file");
            Scenario::load(path)
        }
        None => Scenario::builtin(&config.builtin),
    }
}

fn init_audit_logger(path: Option<&Path>) -> Result<Option<AuditLogger>, SimError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let logger = AuditLogger::new(path).map_err(|source| SimError::Audit {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Audit logging enabled");
    Ok(Some(logger))
}

fn snapshot(protection: &Protection<SimulatedCharger>) -> FinalState {
    let state = protection.state();
    let charger = protection.charger();
    FinalState {
        phase: protection.phase(),
        current_limit_ua: charger.map_or(0, |c| c.current_limit_ua()),
        last_safe_current_ua: state.last_safe_current_ua(),
        current_locked: state.current_locked(),
        undervoltage_configured: state.undervoltage_configured(),
        charging_enabled: charger.is_some_and(|c| c.charging_enabled()),
        global_fault: charger.is_some_and(|c| c.global_fault_flag()),
        charger_calls: charger.map(|c| c.stats().clone()).unwrap_or_default(),
    }
}

fn emit_summary(summary: &RunSummary, report_path: Option<&Path>) -> Result<(), SimError> {
    let json = serde_json::to_string_pretty(summary)?;
    match report_path {
        Some(path) => {
            std::fs::write(path, json + "\n").map_err(|source| SimError::Report {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), "Run summary written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_run_summarises_cutoff_and_restore() {
        let config = RuntimeConfig::default();
        let summary = run(&config).unwrap();
        assert_eq!(summary.scenario, "ovp-cutoff");
        assert_eq!(summary.stats.cutoffs, 1);
        assert_eq!(summary.stats.restores, 1);
        assert!(summary.final_state.charging_enabled);
        assert!(!summary.final_state.global_fault);
    }

    #[test]
    fn max_samples_stops_early() {
        let config = RuntimeConfig {
            max_samples: Some(3),
            ..RuntimeConfig::default()
        };
        let summary = run(&config).unwrap();
        assert_eq!(summary.stats.samples_seen, 3);
        assert_eq!(summary.stats.cutoffs, 0);
        assert!(matches!(
            summary.final_state.phase,
            ProtectionPhase::Faulted { streak: 2 }
        ));
    }

    #[test]
    fn audit_log_records_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let config = RuntimeConfig {
            audit_path: Some(path.clone()),
            ..RuntimeConfig::default()
        };
        run(&config).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let events: Vec<String> = content
            .lines()
            .map(|line| {
                let entry: serde_json::Value = serde_json::from_str(line).unwrap();
                entry["event_type"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(events.first().map(String::as_str), Some("simulation_start"));
        assert_eq!(events.last().map(String::as_str), Some("simulation_end"));
        assert!(events.iter().any(|e| e == "charging_cut_off"));
        assert!(events.iter().any(|e| e == "charging_restored"));
    }

    #[test]
    fn unknown_builtin_is_an_error() {
        let config = RuntimeConfig {
            builtin: "missing".to_string(),
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            run(&config),
            Err(SimError::Scenario(ScenarioError::UnknownBuiltin { .. }))
        ));
    }

    #[test]
    fn report_file_holds_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = run(&RuntimeConfig {
            builtin: "steady-increase".to_string(),
            ..RuntimeConfig::default()
        })
        .unwrap();
        emit_summary(&summary, Some(&path)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["final_state"]["current_limit_ua"], 900_000);
        assert_eq!(value["charger_type"], "unknown");
    }
}
