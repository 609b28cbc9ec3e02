//! Output rendering

use crate::{ProbeRecord, Unit};
use serde::Serialize;

const GIB: f64 = (1u64 << 30) as f64;

/// Render records as human-readable lines, one per probe.
///
/// Latency results are scaled from seconds to nanoseconds, bandwidth
/// results from bytes per second to GiByte/sec.
pub fn render_human(records: &[ProbeRecord]) -> String {
    let mut out = String::new();
    for record in records {
        match &record.outcome {
            Ok(result) => {
                let (avg, stddev, unit) = match record.unit {
                    Unit::Seconds => (result.average * 1e9, result.stddev * 1e9, "ns"),
                    Unit::BytesPerSec => (result.average / GIB, result.stddev / GIB, "GiByte/sec"),
                };
                out.push_str(&format!(
                    "{}: {:.3} ± {:.3} {}\n",
                    record.name, avg, stddev, unit
                ));
            }
            Err(message) => {
                out.push_str(&format!("{}: error: {}\n", record.name, message));
            }
        }
    }
    out
}

#[derive(Serialize)]
struct JsonResult<'a> {
    average: f64,
    stddev: f64,
    unit: &'a str,
}

#[derive(Serialize)]
struct JsonFailure<'a> {
    error: &'a str,
    unit: &'a str,
}

/// Render records as a JSON mapping keyed by probe name. Values are in the
/// probe's natural unit, not pre-scaled.
pub fn render_json(records: &[ProbeRecord]) -> serde_json::Result<String> {
    let mut map = serde_json::Map::new();
    for record in records {
        let value = match &record.outcome {
            Ok(result) => serde_json::to_value(JsonResult {
                average: result.average,
                stddev: result.stddev,
                unit: record.unit.name(),
            })?,
            Err(message) => serde_json::to_value(JsonFailure {
                error: message,
                unit: record.unit.name(),
            })?,
        };
        map.insert(record.name.clone(), value);
    }
    serde_json::to_string_pretty(&map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipcbench_core::BenchmarkResult;

    fn latency_record(name: &str, average: f64, stddev: f64) -> ProbeRecord {
        ProbeRecord::ok(name, Unit::Seconds, BenchmarkResult { average, stddev })
    }

    #[test]
    fn human_latency_is_scaled_to_nanoseconds() {
        let records = vec![latency_record("latency_getpid", 123.4567e-9, 1.5e-9)];
        assert_eq!(
            render_human(&records),
            "latency_getpid: 123.457 ± 1.500 ns\n"
        );
    }

    #[test]
    fn human_bandwidth_is_scaled_to_gib_per_sec() {
        let records = vec![ProbeRecord::ok(
            "bandwidth_pipe",
            Unit::BytesPerSec,
            BenchmarkResult {
                average: 2.0 * (1u64 << 30) as f64,
                stddev: 0.25 * (1u64 << 30) as f64,
            },
        )];
        assert_eq!(
            render_human(&records),
            "bandwidth_pipe: 2.000 ± 0.250 GiByte/sec\n"
        );
    }

    #[test]
    fn human_failure_is_reported_inline() {
        let records = vec![ProbeRecord::failed(
            "bandwidth_mq",
            Unit::BytesPerSec,
            "mq_open failed",
        )];
        assert_eq!(render_human(&records), "bandwidth_mq: error: mq_open failed\n");
    }

    #[test]
    fn json_values_are_unscaled() {
        let records = vec![latency_record("latency_getpid", 5e-8, 1e-9)];
        let json = render_json(&records).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entry = &parsed["latency_getpid"];
        assert!((entry["average"].as_f64().unwrap() - 5e-8).abs() < 1e-20);
        assert_eq!(entry["unit"], "sec");
    }

    #[test]
    fn json_failures_carry_the_message() {
        let records = vec![ProbeRecord::failed(
            "bandwidth_shm",
            Unit::BytesPerSec,
            "verification failed",
        )];
        let parsed: serde_json::Value =
            serde_json::from_str(&render_json(&records).unwrap()).unwrap();
        assert_eq!(parsed["bandwidth_shm"]["error"], "verification failed");
        assert_eq!(parsed["bandwidth_shm"]["unit"], "Byte/sec");
    }

    #[test]
    fn output_format_parses() {
        use crate::OutputFormat;
        assert_eq!("human".parse::<OutputFormat>().unwrap(), OutputFormat::Human);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
