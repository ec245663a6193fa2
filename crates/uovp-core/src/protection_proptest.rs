#[cfg(test)]
mod proptest_protection {
    use crate::hal::{Charger, ChargerType};
    use crate::hal_sim::SimulatedCharger;
    use crate::protection::{Protection, ProtectionAction};
    use crate::table::{CurrentStepTable, Direction};
    use proptest::prelude::*;

    const OVP_MV: i32 = 5800;
    const UVP_MV: i32 = 4300;

    fn charger_type() -> impl Strategy<Value = ChargerType> {
        prop_oneof![
            Just(ChargerType::SDP),
            Just(ChargerType::CDP),
            Just(ChargerType::DCP),
            Just(ChargerType::UNKNOWN),
            Just(ChargerType::HVDCP),
            Just(ChargerType::empty()),
        ]
    }

    fn table_current() -> impl Strategy<Value = u32> {
        prop::sample::select(
            CurrentStepTable::STANDARD
                .steps()
                .iter()
                .map(|s| s.max_current_ua)
                .collect::<Vec<_>>(),
        )
    }

    fn protection(charger_type: ChargerType, current_ua: u32) -> Protection<SimulatedCharger> {
        let mut p = Protection::default();
        p.enable_protection(SimulatedCharger::new(charger_type, current_ua));
        p
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        // Property: sustained over-voltage at the ceiling cuts off on the fourth sample, once
        #[test]
        fn sustained_overvoltage_cuts_off_once(
            charger_type in charger_type(),
            voltages in prop::collection::vec((OVP_MV + 1)..12_000, 4..40),
        ) {
            let ceiling = CurrentStepTable::STANDARD.ceiling_for(charger_type);
            let mut p = protection(charger_type, ceiling);
            let mut cutoffs = 0;
            for (i, mv) in voltages.iter().enumerate() {
                let report = p.on_voltage_sample(*mv);
                if report.cut_off() {
                    prop_assert_eq!(i, 3, "cutoff on sample {}", i + 1);
                    cutoffs += 1;
                }
            }
            let charger = p.charger().unwrap();
            prop_assert_eq!(cutoffs, 1);
            prop_assert!(!charger.charging_enabled());
            prop_assert!(charger.global_fault_flag());
            prop_assert_eq!(charger.stats().charging_disables, 1);
            prop_assert_eq!(charger.stats().fault_flag_sets, 1);
        }

        // Property: in-range voltages never cut off and never lock without a prior fault
        #[test]
        fn in_range_never_cuts_off_or_locks(
            charger_type in charger_type(),
            current in table_current(),
            voltages in prop::collection::vec((UVP_MV + 1)..OVP_MV, 1..60),
        ) {
            let mut p = protection(charger_type, current);
            for mv in voltages {
                let report = p.on_voltage_sample(mv);
                prop_assert!(!report.cut_off());
                prop_assert!(!p.state().current_locked());
            }
            prop_assert!(p.charger().unwrap().charging_enabled());
        }

        // Property: current stays within [floor, ceiling] for any sample sequence
        #[test]
        fn current_stays_within_table_bounds(
            charger_type in charger_type(),
            current in table_current(),
            voltages in prop::collection::vec(3500i32..7000, 1..80),
        ) {
            let table = CurrentStepTable::STANDARD;
            let ceiling = table.ceiling_for(charger_type);
            let current = current.min(ceiling);
            let mut p = protection(charger_type, current);
            for mv in voltages {
                p.on_voltage_sample(mv);
                let limit = p.charger().unwrap().current_limit_ua();
                prop_assert!(limit <= ceiling, "limit {} above ceiling {}", limit, ceiling);
                prop_assert!(limit >= table.floor_ua(), "limit {} below floor", limit);
            }
        }

        // Property: once locked, no sample raises the current limit again
        #[test]
        fn lock_blocks_every_increase(
            charger_type in charger_type(),
            current in table_current(),
            voltages in prop::collection::vec(3500i32..7000, 1..80),
        ) {
            let mut p = protection(charger_type, current);
            for mv in voltages {
                let was_locked = p.state().current_locked();
                let before = p.charger().unwrap().current_limit_ua();
                let report = p.on_voltage_sample(mv);
                if was_locked {
                    let stepped_up = report.actions.iter().any(|a| matches!(
                        a,
                        ProtectionAction::CurrentStepped { direction: Direction::Increase, .. }
                    ));
                    prop_assert!(!stepped_up);
                    prop_assert!(p.charger().unwrap().current_limit_ua() <= before);
                    prop_assert!(p.state().current_locked());
                }
            }
        }

        // Property: suspend-on-collapse is turned off at most once, never for SDP, and back on at disable
        #[test]
        fn undervoltage_config_is_one_shot(
            charger_type in charger_type(),
            current in table_current(),
            voltages in prop::collection::vec(3500i32..7000, 1..80),
        ) {
            let mut p = protection(charger_type, current);
            let mut configs = 0;
            for mv in voltages {
                let report = p.on_voltage_sample(mv);
                configs += report
                    .actions
                    .iter()
                    .filter(|a| **a == ProtectionAction::UndervoltageConfigured)
                    .count();
            }
            prop_assert!(configs <= 1);
            if charger_type.intersects(ChargerType::SDP) {
                prop_assert_eq!(configs, 0);
            }
            let charger = p.disable_protection().unwrap();
            prop_assert!(charger.suspend_on_collapse());
        }

        // Property: fault and normal streaks are never both nonzero
        #[test]
        fn streaks_are_exclusive(
            voltages in prop::collection::vec(3500i32..7000, 1..80),
        ) {
            let mut p = protection(ChargerType::DCP, 1_000_000);
            for mv in voltages {
                p.on_voltage_sample(mv);
                let state = p.state();
                prop_assert!(state.fault_streak() == 0 || state.normal_streak() == 0);
            }
        }

        // Property: a hysteresis-band sample never changes the verdict
        #[test]
        fn hysteresis_band_holds_verdict(
            prefix in prop::collection::vec(3500i32..7000, 1..20),
            band_mv in prop_oneof![(OVP_MV - 100)..=OVP_MV, (UVP_MV + 1)..(UVP_MV + 100)],
        ) {
            let mut p = protection(ChargerType::DCP, 1_000_000);
            for mv in prefix {
                p.on_voltage_sample(mv);
            }
            let before = p.state().is_fault();
            p.on_voltage_sample(band_mv);
            prop_assert_eq!(p.state().is_fault(), before);
        }
    }
}
