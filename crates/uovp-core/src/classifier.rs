//! Three-zone voltage classification.
//!
//! A sample is a definite fault past the strict thresholds, definitely normal
//! inside the relaxed thresholds, and ambiguous in the hysteresis band between
//! them. Ambiguous samples never change the recorded verdict.

use crate::table::Direction;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Excursion {
    Over,
    Under,
}

impl Excursion {
    /// Current step that counteracts the excursion: drawing more current pulls
    /// a high source down, drawing less lets a sagging source recover.
    pub fn corrective_direction(self) -> Direction {
        match self {
            Excursion::Over => Direction::Increase,
            Excursion::Under => Direction::Decrease,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "zone", content = "excursion")]
pub enum Zone {
    Normal,
    Hysteresis(Excursion),
    Fault(Excursion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub ovp_mv: i32,
    pub uvp_mv: i32,
    pub hysteresis_mv: i32,
}

impl Thresholds {
    /// Strict check: over-voltage above `ovp`, under-voltage at or below `uvp`.
    pub fn fault(&self, voltage_mv: i32) -> Option<Excursion> {
        if voltage_mv > self.ovp_mv {
            Some(Excursion::Over)
        } else if voltage_mv <= self.uvp_mv {
            Some(Excursion::Under)
        } else {
            None
        }
    }

    /// Relaxed check: still abnormal within `hysteresis_mv` of either threshold.
    pub fn still_abnormal(&self, voltage_mv: i32) -> Option<Excursion> {
        if voltage_mv >= self.ovp_mv.saturating_sub(self.hysteresis_mv) {
            Some(Excursion::Over)
        } else if voltage_mv < self.uvp_mv.saturating_add(self.hysteresis_mv) {
            Some(Excursion::Under)
        } else {
            None
        }
    }

    pub fn classify(&self, voltage_mv: i32) -> Zone {
        if let Some(excursion) = self.fault(voltage_mv) {
            Zone::Fault(excursion)
        } else if let Some(excursion) = self.still_abnormal(voltage_mv) {
            Zone::Hysteresis(excursion)
        } else {
            Zone::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds {
            ovp_mv: 5800,
            uvp_mv: 4300,
            hysteresis_mv: 100,
        }
    }

    #[test]
    fn strict_edges() {
        let t = thresholds();
        assert_eq!(t.classify(5801), Zone::Fault(Excursion::Over));
        assert_eq!(t.classify(5800), Zone::Hysteresis(Excursion::Over));
        assert_eq!(t.classify(4300), Zone::Fault(Excursion::Under));
        assert_eq!(t.classify(4301), Zone::Hysteresis(Excursion::Under));
    }

    #[test]
    fn relaxed_edges() {
        let t = thresholds();
        assert_eq!(t.classify(5700), Zone::Hysteresis(Excursion::Over));
        assert_eq!(t.classify(5699), Zone::Normal);
        assert_eq!(t.classify(4399), Zone::Hysteresis(Excursion::Under));
        assert_eq!(t.classify(4400), Zone::Normal);
    }

    #[test]
    fn overvoltage_wins_over_undervoltage_check() {
        let t = thresholds();
        assert_eq!(t.fault(9000), Some(Excursion::Over));
        assert_eq!(t.fault(-5), Some(Excursion::Under));
    }

    #[test]
    fn relaxed_check_saturates_at_i32_limits() {
        let t = Thresholds {
            ovp_mv: i32::MIN + 10,
            uvp_mv: i32::MAX - 10,
            hysteresis_mv: 100,
        };
        assert_eq!(t.still_abnormal(i32::MIN), Some(Excursion::Over));
        let t = Thresholds {
            ovp_mv: i32::MAX,
            uvp_mv: i32::MAX - 10,
            hysteresis_mv: 100,
        };
        assert_eq!(t.still_abnormal(i32::MAX - 1), Some(Excursion::Over));
        assert_eq!(t.still_abnormal(0), Some(Excursion::Under));
    }

    #[test]
    fn corrective_direction_opposes_excursion() {
        assert_eq!(Excursion::Over.corrective_direction(), Direction::Increase);
        assert_eq!(Excursion::Under.corrective_direction(), Direction::Decrease);
    }
}
