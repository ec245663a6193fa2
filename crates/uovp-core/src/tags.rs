#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub key: &'static str,
    pub metric: &'static str,
}

pub const VOLTAGE_MV: Tag = Tag {
    key: "voltage_mv",
    metric: "uovp_charger_voltage_millivolts",
};

pub const CURRENT_LIMIT_UA: Tag = Tag {
    key: "current_limit_ua",
    metric: "uovp_input_current_limit_microamps",
};

pub const PROTECTION_PHASE: Tag = Tag {
    key: "phase",
    metric: "uovp_protection_phase",
};

pub const CURRENT_LOCKED: Tag = Tag {
    key: "current_locked",
    metric: "uovp_current_locked",
};

pub const GLOBAL_FAULT: Tag = Tag {
    key: "global_fault",
    metric: "uovp_global_fault_flag",
};
