use crate::hal::Charger;
use crate::hal_sim::{SimulatedCharger, SimulatedSupply};
use crate::protection::{Protection, ProtectionAction, SampleReport};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Source of charger input-voltage readings.
pub trait VoltageSensor<C> {
    /// Next reading, or `None` once the source is exhausted.
    fn read_voltage_mv(&mut self, charger: &C) -> Option<i32>;
}

/// Replays a fixed list of readings regardless of charger state.
///
/// Held readings are stored as `(voltage_mv, count)` runs and counted down as
/// they are read, so long holds cost no memory.
#[derive(Debug, Clone, Default)]
pub struct SampleSequence {
    runs: VecDeque<(i32, u64)>,
}

impl SampleSequence {
    pub fn new(samples: impl IntoIterator<Item = i32>) -> Self {
        samples
            .into_iter()
            .fold(Self::default(), |seq, voltage_mv| seq.hold(voltage_mv, 1))
    }

    /// Append `count` copies of `voltage_mv`.
    pub fn hold(mut self, voltage_mv: i32, count: u64) -> Self {
        if count > 0 {
            self.runs.push_back((voltage_mv, count));
        }
        self
    }

    pub fn remaining(&self) -> u64 {
        self.runs
            .iter()
            .fold(0u64, |acc, &(_, count)| acc.saturating_add(count))
    }
}

impl<C> VoltageSensor<C> for SampleSequence {
    fn read_voltage_mv(&mut self, _charger: &C) -> Option<i32> {
        let (voltage_mv, count) = self.runs.front_mut()?;
        let voltage_mv = *voltage_mv;
        *count -= 1;
        if *count == 0 {
            self.runs.pop_front();
        }
        Some(voltage_mv)
    }
}

/// Reads a [`SimulatedSupply`] loaded by the charger's current draw.
#[derive(Debug, Clone)]
pub struct SupplySensor {
    supply: SimulatedSupply,
    remaining: u64,
}

impl SupplySensor {
    pub fn new(supply: SimulatedSupply, samples: u64) -> Self {
        Self {
            supply,
            remaining: samples,
        }
    }
}

impl VoltageSensor<SimulatedCharger> for SupplySensor {
    fn read_voltage_mv(&mut self, charger: &SimulatedCharger) -> Option<i32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.supply.measure(charger))
    }
}

#[derive(Clone, Debug)]
pub struct SamplerConfig {
    /// Period between samples; zero runs back to back.
    pub interval: Duration,
    pub max_samples: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            max_samples: None,
        }
    }
}

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize)]
pub struct SamplerStats {
    pub samples_seen: u64,
    pub samples_processed: u64,
    pub samples_skipped: u64,
    pub current_steps: u64,
    pub last_safe_restores: u64,
    pub stalls: u64,
    pub read_failures: u64,
    pub cutoffs: u64,
    pub restores: u64,
    pub locks: u64,
    pub undervoltage_configs: u64,
    pub overruns: u64,
    pub min_voltage_mv: Option<i32>,
    pub max_voltage_mv: Option<i32>,
}

impl SamplerStats {
    pub fn record(&mut self, report: &SampleReport) {
        self.samples_seen += 1;
        if report.skipped.is_some() {
            self.samples_skipped += 1;
            return;
        }
        self.samples_processed += 1;
        self.min_voltage_mv = Some(
            self.min_voltage_mv
                .map_or(report.voltage_mv, |v| v.min(report.voltage_mv)),
        );
        self.max_voltage_mv = Some(
            self.max_voltage_mv
                .map_or(report.voltage_mv, |v| v.max(report.voltage_mv)),
        );
        for action in &report.actions {
            match action {
                ProtectionAction::CurrentStepped { .. } => self.current_steps += 1,
                ProtectionAction::LastSafeRestored { .. } => self.last_safe_restores += 1,
                ProtectionAction::CurrentLocked { .. } => self.locks += 1,
                ProtectionAction::UndervoltageConfigured => self.undervoltage_configs += 1,
                ProtectionAction::Stalled { .. } => self.stalls += 1,
                ProtectionAction::ReadFailed { .. } => self.read_failures += 1,
                ProtectionAction::CutOff => self.cutoffs += 1,
                ProtectionAction::Restored => self.restores += 1,
            }
        }
    }
}

/// Feeds sensor readings into a [`Protection`] in order, one call at a time.
pub struct Sampler {
    config: SamplerConfig,
    stats: SamplerStats,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            stats: SamplerStats::default(),
        }
    }

    /// Run until the sensor is exhausted, `max_samples` is reached, `stop` is
    /// raised or protection is disabled from `on_sample`.
    pub fn run<C, S, F>(
        &mut self,
        protection: &mut Protection<C>,
        sensor: &mut S,
        stop: &AtomicBool,
        mut on_sample: F,
    ) where
        C: Charger,
        S: VoltageSensor<C>,
        F: FnMut(&SampleReport, &mut Protection<C>),
    {
        let mut next_sample = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            if self
                .config
                .max_samples
                .is_some_and(|max| self.stats.samples_seen >= max)
            {
                break;
            }

            let now = Instant::now();
            if now < next_sample {
                std::thread::sleep(next_sample - now);
            } else if !self.config.interval.is_zero() && now > next_sample + self.config.interval {
                self.stats.overruns += 1;
            }

            let Some(charger) = protection.charger() else {
                break;
            };
            let Some(voltage_mv) = sensor.read_voltage_mv(charger) else {
                break;
            };

            let report = protection.on_voltage_sample(voltage_mv);
            self.stats.record(&report);
            on_sample(&report, protection);

            next_sample += self.config.interval;
        }
    }

    pub fn stats(&self) -> &SamplerStats {
        &self.stats
    }
}
