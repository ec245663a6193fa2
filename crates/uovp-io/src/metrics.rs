//! Prometheus metrics for charger voltage protection.
//!
//! Counters follow the actions reported per sample; gauges mirror the most
//! recent sample and protection state.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};
use uovp_core::tags;
use uovp_core::{ProtectionAction, ProtectionPhase, SampleReport};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter definition");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

fn int_gauge(name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("valid gauge definition");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("gauge registered once");
    gauge
}

// ============================================================================
// Sample Metrics
// ============================================================================

pub static SAMPLES_PROCESSED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "uovp_samples_processed_total",
        "Voltage samples run through the protection pipeline",
    )
});

pub static SAMPLES_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "uovp_samples_skipped_total",
        "Voltage samples ignored (disabled, no input power or settling)",
    )
});

// ============================================================================
// Action Metrics
// ============================================================================

pub static CURRENT_STEPS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "uovp_current_steps_total",
        "Input current limit steps applied",
    )
});

pub static LAST_SAFE_RESTORES: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "uovp_last_safe_restores_total",
        "Faults answered by re-applying the last known-good current",
    )
});

pub static STALLS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "uovp_controller_stalls_total",
        "Current adjustments that could not make progress",
    )
});

pub static READ_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "uovp_read_failures_total",
        "Failed reads of the input current limit",
    )
});

pub static CUTOFFS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter("uovp_cutoffs_total", "Charging cutoffs on sustained fault")
});

pub static RESTORES: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "uovp_restores_total",
        "Charging restores after sustained recovery",
    )
});

pub static LOCKS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "uovp_current_locks_total",
        "Times the input current limit was locked during recovery",
    )
});

pub static UVP_CONFIGS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "uovp_undervoltage_configs_total",
        "Chargers switched to ride through input collapse on under-voltage",
    )
});

// ============================================================================
// State Metrics
// ============================================================================

pub static VOLTAGE_MV: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::VOLTAGE_MV.metric, "Most recent charger input voltage in mV")
        .expect("valid gauge definition");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("gauge registered once");
    gauge
});

pub static CURRENT_LIMIT_UA: LazyLock<IntGauge> = LazyLock::new(|| {
    int_gauge(
        tags::CURRENT_LIMIT_UA.metric,
        "Input current limit reported by the charger in uA",
    )
});

/// Protection phase (-1=disabled,0=normal,1=ambiguous,2=faulted,3=locked,4=settling)
pub static PROTECTION_PHASE: LazyLock<IntGauge> = LazyLock::new(|| {
    int_gauge(
        tags::PROTECTION_PHASE.metric,
        "Protection phase (-1=disabled,0=normal,1=ambiguous,2=faulted,3=locked,4=settling)",
    )
});

pub static CURRENT_LOCKED: LazyLock<IntGauge> = LazyLock::new(|| {
    int_gauge(
        tags::CURRENT_LOCKED.metric,
        "Recovery current lock held (1=locked, 0=free)",
    )
});

pub static GLOBAL_FAULT: LazyLock<IntGauge> = LazyLock::new(|| {
    int_gauge(
        tags::GLOBAL_FAULT.metric,
        "Charger global fault flag (1=charging cut off)",
    )
});

pub fn phase_code(phase: ProtectionPhase) -> i64 {
    match phase {
        ProtectionPhase::Disabled => -1,
        ProtectionPhase::Normal => 0,
        ProtectionPhase::Ambiguous => 1,
        ProtectionPhase::Faulted { .. } => 2,
        ProtectionPhase::RecoveringLocked => 3,
        ProtectionPhase::Settling { .. } => 4,
    }
}

/// Snapshot of protection state published alongside a sample.
#[derive(Debug, Clone, Copy)]
pub struct ProtectionGauges {
    pub phase: ProtectionPhase,
    pub current_limit_ua: Option<u32>,
    pub current_locked: bool,
    pub global_fault: bool,
}

pub fn record_sample(report: &SampleReport, gauges: &ProtectionGauges) {
    if report.skipped.is_some() {
        SAMPLES_SKIPPED.inc();
    } else {
        SAMPLES_PROCESSED.inc();
        VOLTAGE_MV.set(f64::from(report.voltage_mv));
    }

    for action in &report.actions {
        match action {
            ProtectionAction::CurrentStepped { .. } => CURRENT_STEPS.inc(),
            ProtectionAction::LastSafeRestored { .. } => LAST_SAFE_RESTORES.inc(),
            ProtectionAction::CurrentLocked { .. } => LOCKS.inc(),
            ProtectionAction::UndervoltageConfigured => UVP_CONFIGS.inc(),
            ProtectionAction::Stalled { .. } => STALLS.inc(),
            ProtectionAction::ReadFailed { .. } => READ_FAILURES.inc(),
            ProtectionAction::CutOff => CUTOFFS.inc(),
            ProtectionAction::Restored => RESTORES.inc(),
        }
    }

    PROTECTION_PHASE.set(phase_code(gauges.phase));
    if let Some(ua) = gauges.current_limit_ua {
        CURRENT_LIMIT_UA.set(i64::from(ua));
    }
    CURRENT_LOCKED.set(i64::from(gauges.current_locked));
    GLOBAL_FAULT.set(i64::from(gauges.global_fault));
}

/// Render the registry in the Prometheus text exposition format.
pub fn gather_text() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let body = match gather_text() {
                        Ok(body) => body,
                        Err(e) => {
                            tracing::warn!("Failed to encode metrics: {}", e);
                            let _ = request.respond(
                                Response::from_string("Internal Server Error")
                                    .with_status_code(500),
                            );
                            continue;
                        }
                    };
                    let mut response = Response::from_string(body);
                    if let Ok(header) = tiny_http::Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/plain; version=0.0.4"[..],
                    ) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once at least one sample went through the pipeline
                    if SAMPLES_PROCESSED.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = SAMPLES_PROCESSED.get();
    let _ = SAMPLES_SKIPPED.get();
    let _ = CURRENT_STEPS.get();
    let _ = LAST_SAFE_RESTORES.get();
    let _ = STALLS.get();
    let _ = READ_FAILURES.get();
    let _ = CUTOFFS.get();
    let _ = RESTORES.get();
    let _ = LOCKS.get();
    let _ = UVP_CONFIGS.get();
    let _ = VOLTAGE_MV.get();
    let _ = CURRENT_LIMIT_UA.get();
    let _ = PROTECTION_PHASE.get();
    let _ = CURRENT_LOCKED.get();
    let _ = GLOBAL_FAULT.get();
}
