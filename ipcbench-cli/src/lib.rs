#![warn(missing_docs)]
//! ipcbench CLI
//!
//! Parses the command line, validates the option/probe combination, sets up
//! logging, dispatches the selected probe(s), and renders the results.
//! Exit codes: 0 on success, 1 on usage or validation errors and on a
//! failed single-probe run. Aggregate runs report every probe, including
//! the ones that failed, and exit 0.

mod dispatch;
mod registry;

pub use dispatch::{run_selection, RunPlan};
pub use registry::{lookup, known_names, BandwidthProbe, LatencyProbe, Selection};

use clap::{Parser, ValueEnum};
use ipcbench_core::CHECKSUM_LEN;
use ipcbench_report::{render_human, render_json, OutputFormat};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_CHUNK_BYTES: u64 = 1 << 20;

/// Log severity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogSeverity {
    /// Informational messages and above.
    Info,
    /// Everything, including per-iteration progress.
    Debug,
    /// Warnings and errors only (default).
    Warning,
    /// Errors only.
    Error,
}

impl LogSeverity {
    fn filter_directive(self) -> &'static str {
        match self {
            LogSeverity::Info => "info",
            LogSeverity::Debug => "debug",
            LogSeverity::Warning => "warn",
            LogSeverity::Error => "error",
        }
    }
}

/// ipcbench command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "ipcbench")]
#[command(version, about = "Latency and bandwidth benchmarks for POSIX IPC primitives")]
#[command(after_help = "Run `ipcbench all` for every probe, or name one, e.g. \
`ipcbench bandwidth_pipe -d 1048576 -b 65536`.")]
pub struct Cli {
    /// Probe or aggregate to run (latency_*, bandwidth_*, latency_all,
    /// bandwidth_all, all)
    pub probe: String,

    /// Measured outer iterations (minimum 3)
    #[arg(short = 'i', long, default_value_t = 10)]
    pub iterations: u32,

    /// Warmup outer iterations
    #[arg(short = 'w', long, default_value_t = 3)]
    pub warmups: u32,

    /// Inner loop count for latency probes (default: per-probe)
    #[arg(short = 'l', long)]
    pub loop_size: Option<u64>,

    /// Payload size in bytes for bandwidth probes (must exceed 128)
    #[arg(short = 'd', long, default_value_t = 1 << 30)]
    pub payload_bytes: u64,

    /// Chunk size in bytes for streaming and shared-buffer probes
    /// (default: 1 MiB; not applicable to memcpy probes)
    #[arg(short = 'b', long)]
    pub chunk_bytes: Option<u64>,

    /// Worker threads for bandwidth_memcpy_mt (default: run 1..4)
    #[arg(short = 'n', long)]
    pub threads: Option<u64>,

    /// Log severity
    #[arg(long, value_enum, default_value_t = LogSeverity::Warning)]
    pub log_severity: LogSeverity,

    /// Output format: human or json
    #[arg(long, default_value = "human")]
    pub output_format: String,
}

/// Check the option/probe combination. Returns the message for stderr on
/// rejection; no probe runs in that case.
fn validate(cli: &Cli, selection: Selection) -> Result<(), String> {
    if cli.iterations < 3 {
        return Err(format!(
            "iterations must be at least 3, got: {}",
            cli.iterations
        ));
    }

    if cli.threads.is_some() && selection != Selection::Bandwidth(BandwidthProbe::MemcpyMt) {
        return Err("the threads option only applies to bandwidth_memcpy_mt".to_string());
    }
    if cli.threads == Some(0) {
        return Err("threads must be greater than 0".to_string());
    }

    if selection.includes_bandwidth() && cli.payload_bytes <= CHECKSUM_LEN as u64 {
        return Err(format!(
            "payload_bytes must be larger than the checksum size ({}), got: {}",
            CHECKSUM_LEN, cli.payload_bytes
        ));
    }

    if let Selection::Bandwidth(probe) = selection {
        if !probe.uses_chunk() && cli.chunk_bytes.is_some() {
            return Err(format!(
                "the chunk_bytes option is not applicable to {}",
                probe.name()
            ));
        }
    }

    if selection.includes_chunked() {
        let chunk = cli.chunk_bytes.unwrap_or(DEFAULT_CHUNK_BYTES);
        if chunk == 0 {
            return Err("chunk_bytes must be greater than 0".to_string());
        }
        if chunk > cli.payload_bytes {
            return Err(format!(
                "chunk_bytes ({}) cannot be larger than payload_bytes ({})",
                chunk, cli.payload_bytes
            ));
        }
    }

    Ok(())
}

fn usage_error(message: &str) -> ExitCode {
    eprintln!("error: {message}");
    eprintln!("Run `ipcbench --help` for usage.");
    ExitCode::FAILURE
}

/// Run the CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> ExitCode {
    let Some(selection) = lookup(&cli.probe) else {
        return usage_error(&format!(
            "unknown probe: {}. Available probes: {}",
            cli.probe,
            known_names().join(", ")
        ));
    };

    if let Err(message) = validate(&cli, selection) {
        return usage_error(&message);
    }

    let format: OutputFormat = match cli.output_format.parse() {
        Ok(format) => format,
        Err(message) => return usage_error(&message),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.log_severity.filter_directive()))
        .with_writer(std::io::stderr)
        .init();

    let plan = RunPlan {
        iterations: cli.iterations,
        warmups: cli.warmups,
        loop_size: cli.loop_size,
        payload_bytes: cli.payload_bytes,
        chunk_bytes: cli.chunk_bytes.unwrap_or(DEFAULT_CHUNK_BYTES),
        threads: cli.threads,
    };

    let records = run_selection(selection, &plan);

    let output = match format {
        OutputFormat::Human => render_human(&records),
        OutputFormat::Json => match render_json(&records) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("error: failed to render output: {e}");
                return ExitCode::FAILURE;
            }
        },
    };
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }

    // A failed probe in a single-probe run is a failed run; aggregates
    // report failures inline and still exit 0.
    let aggregate = matches!(
        selection,
        Selection::LatencyAll | Selection::BandwidthAll | Selection::All
    );
    if !aggregate && records.iter().any(|r| r.outcome.is_err()) {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Parse arguments and run. Usage errors exit 1; `--help`/`--version`
/// exit 0.
pub fn run() -> ExitCode {
    match Cli::try_parse() {
        Ok(cli) => run_with_cli(cli),
        Err(e) => {
            let failed = e.use_stderr();
            let _ = e.print();
            if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(probe: &str) -> Cli {
        Cli {
            probe: probe.to_string(),
            iterations: 10,
            warmups: 3,
            loop_size: None,
            payload_bytes: 1 << 30,
            chunk_bytes: None,
            threads: None,
            log_severity: LogSeverity::Warning,
            output_format: "human".to_string(),
        }
    }

    fn selection(probe: &str) -> Selection {
        lookup(probe).unwrap()
    }

    #[test]
    fn default_options_validate_for_every_probe() {
        for name in known_names() {
            let args = cli(name);
            assert!(
                validate(&args, selection(name)).is_ok(),
                "{name} rejected default options"
            );
        }
    }

    #[test]
    fn too_few_iterations_rejected() {
        let mut args = cli("latency_getpid");
        args.iterations = 2;
        assert!(validate(&args, selection("latency_getpid")).is_err());
    }

    #[test]
    fn payload_no_larger_than_checksum_rejected() {
        let mut args = cli("bandwidth_pipe");
        args.payload_bytes = 128;
        assert!(validate(&args, selection("bandwidth_pipe")).is_err());

        args.payload_bytes = 129;
        assert!(validate(&args, selection("bandwidth_pipe")).is_ok());
    }

    #[test]
    fn small_payload_fine_for_latency_probes() {
        let mut args = cli("latency_getpid");
        args.payload_bytes = 1;
        assert!(validate(&args, selection("latency_getpid")).is_ok());
    }

    #[test]
    fn chunk_rejected_for_memcpy_probes() {
        for name in ["bandwidth_memcpy", "bandwidth_memcpy_mt"] {
            let mut args = cli(name);
            args.chunk_bytes = Some(4096);
            assert!(validate(&args, selection(name)).is_err(), "{name}");
        }
    }

    #[test]
    fn zero_chunk_rejected() {
        let mut args = cli("bandwidth_pipe");
        args.chunk_bytes = Some(0);
        assert!(validate(&args, selection("bandwidth_pipe")).is_err());
    }

    #[test]
    fn chunk_larger_than_payload_rejected() {
        let mut args = cli("bandwidth_pipe");
        args.payload_bytes = 1024;
        args.chunk_bytes = Some(2048);
        assert!(validate(&args, selection("bandwidth_pipe")).is_err());
    }

    #[test]
    fn default_chunk_larger_than_small_payload_rejected() {
        // 1 MiB default chunk against a 1 KiB payload.
        let mut args = cli("bandwidth_pipe");
        args.payload_bytes = 1024;
        assert!(validate(&args, selection("bandwidth_pipe")).is_err());
    }

    #[test]
    fn threads_rejected_outside_memcpy_mt() {
        for name in ["bandwidth_memcpy", "bandwidth_pipe", "latency_getpid", "all"] {
            let mut args = cli(name);
            args.threads = Some(2);
            assert!(validate(&args, selection(name)).is_err(), "{name}");
        }
    }

    #[test]
    fn zero_threads_rejected() {
        let mut args = cli("bandwidth_memcpy_mt");
        args.threads = Some(0);
        assert!(validate(&args, selection("bandwidth_memcpy_mt")).is_err());
    }

    #[test]
    fn explicit_threads_accepted_for_memcpy_mt() {
        let mut args = cli("bandwidth_memcpy_mt");
        args.threads = Some(4);
        assert!(validate(&args, selection("bandwidth_memcpy_mt")).is_ok());
    }

    #[test]
    fn cli_parses_short_options() {
        let args = Cli::parse_from([
            "ipcbench",
            "bandwidth_pipe",
            "-i",
            "5",
            "-w",
            "1",
            "-d",
            "4096",
            "-b",
            "1024",
        ]);
        assert_eq!(args.probe, "bandwidth_pipe");
        assert_eq!(args.iterations, 5);
        assert_eq!(args.warmups, 1);
        assert_eq!(args.payload_bytes, 4096);
        assert_eq!(args.chunk_bytes, Some(1024));
    }
}
