use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BUILTIN: &str = "ovp-cutoff";

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub list_builtins: bool,
    pub scenario_path: Option<PathBuf>,
    pub builtin: String,
    pub sample_interval: Duration,
    pub max_samples: Option<u64>,
    pub json_logs: bool,
    pub log_file: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            list_builtins: false,
            scenario_path: None,
            builtin: DEFAULT_BUILTIN.to_string(),
            sample_interval: Duration::ZERO,
            max_samples: None,
            json_logs: false,
            log_file: None,
            metrics_addr: None,
            audit_path: None,
            report_path: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--scenario" => {
                    if i + 1 < args.len() {
                        cfg.scenario_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--builtin" => {
                    if i + 1 < args.len() {
                        cfg.builtin = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--list-builtins" => {
                    cfg.list_builtins = true;
                }
                "--sample-interval-ms" => {
                    if i + 1 < args.len() {
                        cfg.sample_interval =
                            Duration::from_millis(args[i + 1].parse().unwrap_or(0));
                        i += 1;
                    }
                }
                "--max-samples" => {
                    if i + 1 < args.len() {
                        cfg.max_samples = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--log-file" => {
                    if i + 1 < args.len() {
                        cfg.log_file = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--metrics-addr" => {
                    if i + 1 < args.len() {
                        cfg.metrics_addr = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--audit-log" => {
                    if i + 1 < args.len() {
                        cfg.audit_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--report" => {
                    if i + 1 < args.len() {
                        cfg.report_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        cfg
    }

    pub fn print_help() {
        println!(
            r#"uovp-sim - Charger under/over-voltage protection simulator

USAGE:
    uovp-sim [OPTIONS]

OPTIONS:
    --scenario <PATH>         Run a JSON scenario file (overrides --builtin)
    --builtin <NAME>          Run a built-in scenario [default: ovp-cutoff]
    --list-builtins           Print the built-in scenario names and exit
    --sample-interval-ms <MS> Delay between voltage samples [default: 0]
    --max-samples <N>         Stop after N samples
    --json-logs               Output logs in JSON format (for log aggregation)
    --log-file <PATH>         Also write JSON logs to the given file
    --metrics-addr <ADDR>     Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>        Enable audit logging to specified JSONL file
    --report <PATH>           Write the run summary to a file instead of stdout
    -h, --help                Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                  Set log filter (e.g., RUST_LOG=debug,uovp_core=trace)

EXAMPLES:
    # Weak adapter sagging under load
    uovp-sim --builtin uvp-stepdown

    # Paced run with metrics and an audit trail
    uovp-sim --scenario brownout.json --sample-interval-ms 100 \
        --metrics-addr 0.0.0.0:9090 --audit-log /var/log/uovp/audit.jsonl
"#
        );
    }
}
