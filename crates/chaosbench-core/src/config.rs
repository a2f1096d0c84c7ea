//! Harness configuration.
//!
//! Every tunable of a benchmark session lives in [`HarnessConfig`]. Defaults
//! reproduce the reference harness; a JSON file can override any subset of
//! fields (missing keys fall back to the defaults) and CLI flags override the
//! file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::executor::ExecutorConfig;
use crate::report::ReportThresholds;

/// Default artifact file name.
pub const DEFAULT_OUTPUT: &str = "benchmark_results.json";

/// Queries exercised when none are configured.
pub const DEFAULT_QUERIES: &[&str] = &["coherent", "medium", "incoherent"];

/// Configuration for a benchmark session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Passes over the query list.
    pub iterations: usize,
    /// Query identifiers, executed in order within every iteration.
    pub queries: Vec<String>,
    /// Inject stochastic noise into every run.
    pub chaos: bool,
    /// Let accumulated coherence recover noisy runs and grade the gain target.
    pub pilot_wave: bool,
    /// Amplitude of the deterministic harmonic noise term.
    pub chaos_amplitude: f64,
    /// Pilot-wave integration step.
    pub dt: f64,
    /// |noise| at or above this value marks a run as provisionally failed.
    pub entropy_threshold: f64,
    /// Latency of a run with no noise and no guidance, in milliseconds.
    pub base_latency_ms: f64,
    /// Smallest latency a run may report, in milliseconds.
    pub latency_floor_ms: f64,
    /// Coherence above which a noisy run still counts as successful.
    pub recovery_coherence: f64,
    /// Coherence gain ratio required for the target to be met.
    pub gain_target: f64,
    /// Coherence gain ratio above which the target is partially met.
    pub partial_gain: f64,
    /// Block the calling thread for each computed latency.
    pub simulate_delay: bool,
    /// Seed for the Gaussian noise stream (OS entropy when absent).
    pub seed: Option<u64>,
    /// Path of the JSON summary artifact.
    pub output: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            queries: DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect(),
            chaos: false,
            pilot_wave: false,
            chaos_amplitude: 1.0,
            dt: 0.1,
            entropy_threshold: 0.5,
            base_latency_ms: 25.0,
            latency_floor_ms: 1.0,
            recovery_coherence: 0.6,
            gain_target: 0.25,
            partial_gain: 0.15,
            simulate_delay: true,
            seed: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl HarnessConfig {
    /// Load a config from a JSON file and validate it.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| HarnessError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate().map_err(|message| HarnessError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Check value ranges. Returns a human-readable reason on failure.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.queries.is_empty() {
            return Err("queries must not be empty".to_string());
        }
        if self.iterations.checked_mul(self.queries.len()).is_none() {
            return Err(format!(
                "{} iterations x {} queries overflows the run counter",
                self.iterations,
                self.queries.len()
            ));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(format!("dt must be positive, got {}", self.dt));
        }
        if !(self.latency_floor_ms.is_finite() && self.latency_floor_ms > 0.0) {
            return Err(format!(
                "latency_floor_ms must be positive, got {}",
                self.latency_floor_ms
            ));
        }
        if !self.base_latency_ms.is_finite() {
            return Err("base_latency_ms must be finite".to_string());
        }
        if !self.chaos_amplitude.is_finite() {
            return Err("chaos_amplitude must be finite".to_string());
        }
        if !(self.entropy_threshold.is_finite() && self.entropy_threshold > 0.0) {
            return Err(format!(
                "entropy_threshold must be positive, got {}",
                self.entropy_threshold
            ));
        }
        if self.partial_gain > self.gain_target {
            return Err(format!(
                "partial_gain ({}) must not exceed gain_target ({})",
                self.partial_gain, self.gain_target
            ));
        }
        Ok(())
    }

    /// Total number of runs a complete session performs, saturating at
    /// `usize::MAX` for configs that fail [`Self::validate`].
    pub fn total_runs(&self) -> usize {
        self.iterations.saturating_mul(self.queries.len())
    }

    /// Per-run executor settings.
    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            dt: self.dt,
            chaos_amplitude: self.chaos_amplitude,
            entropy_threshold: self.entropy_threshold,
            base_latency_ms: self.base_latency_ms,
            latency_floor_ms: self.latency_floor_ms,
            recovery_coherence: self.recovery_coherence,
            simulate_delay: self.simulate_delay,
        }
    }

    /// Classification thresholds for the final report.
    pub fn thresholds(&self) -> ReportThresholds {
        ReportThresholds {
            entropy_threshold: self.entropy_threshold,
            gain_target: self.gain_target,
            partial_gain: self.partial_gain,
        }
    }
}
