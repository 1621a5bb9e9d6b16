use serde::{Deserialize, Serialize};

use crate::harness::{as_micros_f64, BenchmarkResult, TrialSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u64,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
    pub store: String,
    pub payload_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub unit: String,

    pub payload_bytes: u64,
    pub trials: u64,
    pub warmup_iters: u64,

    /// Per-trial durations, in trial order.
    pub samples: Vec<f64>,
    pub mean: f64,
    pub min: f64,
    pub max: f64,

    pub throughput_bytes_per_s: Option<f64>,

    pub extra: serde_json::Value,
}

impl Measurement {
    /// Build a measurement in microseconds from a non-empty trial set.
    pub fn from_trials(
        name: impl Into<String>,
        payload_bytes: u64,
        warmup_iters: u64,
        set: &TrialSet,
        result: &BenchmarkResult,
    ) -> Self {
        let mean_s = result.mean.as_secs_f64();
        Self {
            name: name.into(),
            unit: "us".to_string(),
            payload_bytes,
            trials: set.len() as u64,
            warmup_iters,
            samples: set.micros(),
            mean: as_micros_f64(result.mean),
            min: as_micros_f64(result.min),
            max: as_micros_f64(result.max),
            throughput_bytes_per_s: if mean_s <= 0.0 {
                None
            } else {
                Some(payload_bytes as f64 / mean_s)
            },
            extra: serde_json::Value::Null,
        }
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub run: RunMeta,
    pub measurements: Vec<Measurement>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_measurement_from_trials() {
        let set = TrialSet::from(vec![
            Duration::from_micros(1_000),
            Duration::from_micros(3_000),
        ]);
        let result = BenchmarkResult::from_set(&set).unwrap();
        let m = Measurement::from_trials("flash.create", 32_768, 1, &set, &result)
            .with_extra(json!({"file": "data.bin"}));

        assert_eq!(m.unit, "us");
        assert_eq!(m.trials, 2);
        assert_eq!(m.samples, vec![1_000.0, 3_000.0]);
        assert_eq!(m.mean, 2_000.0);
        assert_eq!(m.min, 1_000.0);
        assert_eq!(m.max, 3_000.0);
        // 32 KiB in 2 ms.
        assert!((m.throughput_bytes_per_s.unwrap() - 16_384_000.0).abs() < 1e-3);
        assert_eq!(m.extra["file"], "data.bin");
    }

    #[test]
    fn test_zero_mean_has_no_throughput() {
        let set = TrialSet::from(vec![Duration::ZERO]);
        let result = BenchmarkResult::from_set(&set).unwrap();
        let m = Measurement::from_trials("ram.fill", 128, 0, &set, &result);
        assert!(m.throughput_bytes_per_s.is_none());
    }

    #[test]
    fn test_report_serializes() {
        let report = BenchReport {
            run: RunMeta {
                schema_version: 1,
                bench_version: "0.0.0".to_string(),
                profile: "quick".to_string(),
                seed: 7,
                timestamp_utc: "unix:0".to_string(),
                git_sha: None,
                store: "mem".to_string(),
                payload_pattern: "counter".to_string(),
            },
            measurements: Vec::new(),
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["run"]["seed"], 7);
        assert_eq!(v["run"]["git_sha"], serde_json::Value::Null);
        assert!(v["measurements"].as_array().unwrap().is_empty());
    }
}
