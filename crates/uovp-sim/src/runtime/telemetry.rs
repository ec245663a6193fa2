use std::thread;
use tracing::info;
use uovp_core::{Charger, Protection, SampleReport, SimulatedCharger};
use uovp_io::metrics::{init_metrics, record_sample, serve_metrics, ProtectionGauges};

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

pub fn publish(report: &SampleReport, protection: &Protection<SimulatedCharger>) {
    let charger = protection.charger();
    let gauges = ProtectionGauges {
        phase: protection.phase(),
        current_limit_ua: charger.map(SimulatedCharger::current_limit_ua),
        current_locked: protection.state().current_locked(),
        global_fault: charger.is_some_and(|c| c.global_fault_flag()),
    };
    record_sample(report, &gauges);
}
