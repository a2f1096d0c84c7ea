//! End-of-session report and JSON artifact.
//!
//! [`SessionSummary`] is computed once from the complete run sequence and is
//! never updated afterwards. Exit-status policy lives here, not in the engine.
//!
//! # Artifact format
//!
//! ```json
//! {
//!   "summary": {
//!     "avg_latency": 27.1, "fib_score": 27.4, "chaos": true, "pilot_wave": true,
//!     "coherence_gain_pct": 41.2, "avg_coherence": 0.63, "target_met": true
//!   },
//!   "runs": [
//!     { "q": "coherent", "lat": 25.9, "noise": 0.12, "ok": true,
//!       "coherence": 0.45, "q_potential": -0.31, "trajectory_pred": 0.46 }
//!   ]
//! }
//! ```
//!
//! `target_met` is `null` when pilot-wave mode is off. The file is written to a
//! temporary sibling first and renamed over the target, so readers never see
//! a half-written artifact.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::executor::BenchmarkRun;
use crate::freshness::freshness_score;
use crate::telemetry::EntropyState;

/// Classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportThresholds {
    pub entropy_threshold: f64,
    pub gain_target: f64,
    pub partial_gain: f64,
}

impl Default for ReportThresholds {
    fn default() -> Self {
        Self {
            entropy_threshold: 0.5,
            gain_target: 0.25,
            partial_gain: 0.15,
        }
    }
}

/// How the coherence gain compares with the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainClass {
    Achieved,
    Partial,
    BelowTarget,
}

impl GainClass {
    pub fn classify(gain: f64, thresholds: &ReportThresholds) -> Self {
        if gain >= thresholds.gain_target {
            Self::Achieved
        } else if gain > thresholds.partial_gain {
            Self::Partial
        } else {
            Self::BelowTarget
        }
    }
}

impl std::fmt::Display for GainClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Achieved => write!(f, "target achieved"),
            Self::Partial => write!(f, "partial"),
            Self::BelowTarget => write!(f, "below target"),
        }
    }
}

/// Relative coherence change from the first to the last run.
///
/// Zero when there is no initial value or it is zero.
pub fn coherence_gain(initial: Option<f64>, final_: Option<f64>) -> f64 {
    match (initial, final_) {
        (Some(i), Some(f)) if i > 0.0 => (f - i) / i,
        _ => 0.0,
    }
}

/// Final session metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub run_count: usize,
    pub failed_runs: usize,
    pub avg_latency_ms: f64,
    pub fib_score: f64,
    pub initial_coherence: Option<f64>,
    pub final_coherence: Option<f64>,
    pub avg_coherence: f64,
    /// `(final − initial) / initial`.
    pub coherence_gain: f64,
    pub gain_class: GainClass,
    pub chaos: bool,
    pub pilot_wave: bool,
    /// `None` when pilot-wave mode is off.
    pub target_met: Option<bool>,
    pub max_abs_noise: f64,
    pub entropy_state: EntropyState,
}

impl SessionSummary {
    pub fn from_runs(
        runs: &[BenchmarkRun],
        chaos: bool,
        pilot_wave: bool,
        thresholds: &ReportThresholds,
    ) -> Self {
        let run_count = runs.len();
        let latencies: Vec<f64> = runs.iter().map(|r| r.latency_ms).collect();

        let initial_coherence = runs.first().map(|r| r.coherence);
        let final_coherence = runs.last().map(|r| r.coherence);
        let gain = coherence_gain(initial_coherence, final_coherence);
        let max_abs_noise = runs.iter().map(|r| r.noise.abs()).fold(0.0, f64::max);

        Self {
            run_count,
            failed_runs: runs.iter().filter(|r| !r.success).count(),
            avg_latency_ms: mean(&latencies),
            fib_score: freshness_score(&latencies),
            initial_coherence,
            final_coherence,
            avg_coherence: mean(&runs.iter().map(|r| r.coherence).collect::<Vec<_>>()),
            coherence_gain: gain,
            gain_class: GainClass::classify(gain, thresholds),
            chaos,
            pilot_wave,
            target_met: pilot_wave.then(|| gain >= thresholds.gain_target),
            max_abs_noise,
            entropy_state: EntropyState::classify(max_abs_noise, thresholds.entropy_threshold),
        }
    }

    /// Noise exceeded the threshold and pilot-wave mode did not recover
    /// every run.
    pub fn entropy_exceeded(&self) -> bool {
        self.entropy_state == EntropyState::Warning && !(self.pilot_wave && self.failed_runs == 0)
    }

    /// Fields written to the artifact.
    pub fn to_artifact(&self) -> ArtifactSummary {
        ArtifactSummary {
            avg_latency: self.avg_latency_ms,
            fib_score: self.fib_score,
            chaos: self.chaos,
            pilot_wave: self.pilot_wave,
            coherence_gain_pct: self.coherence_gain * 100.0,
            avg_coherence: self.avg_coherence,
            target_met: self.target_met,
        }
    }
}

/// Process exit status chosen for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    Nominal,
    /// Entropy threshold exceeded without pilot-wave recovery.
    EntropyExceeded,
    /// Pilot-wave mode on but the gain target was missed (non-fatal).
    TargetMissed,
    Interrupted,
}

impl ExitStatus {
    pub fn for_session(summary: &SessionSummary, interrupted: bool) -> Self {
        if interrupted {
            Self::Interrupted
        } else if summary.entropy_exceeded() {
            Self::EntropyExceeded
        } else if summary.target_met == Some(false) {
            Self::TargetMissed
        } else {
            Self::Nominal
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Nominal => 0,
            Self::EntropyExceeded => 1,
            Self::TargetMissed => 2,
            Self::Interrupted => 130,
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// `summary` object of the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub avg_latency: f64,
    pub fib_score: f64,
    pub chaos: bool,
    pub pilot_wave: bool,
    pub coherence_gain_pct: f64,
    pub avg_coherence: f64,
    pub target_met: Option<bool>,
}

/// Artifact as read back from disk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Artifact {
    pub summary: ArtifactSummary,
    pub runs: Vec<BenchmarkRun>,
}

#[derive(Serialize)]
struct ArtifactOut<'a> {
    summary: ArtifactSummary,
    runs: &'a [BenchmarkRun],
}

/// Atomically write the artifact to `path`, replacing any existing file.
pub fn write_artifact(path: &Path, summary: &SessionSummary, runs: &[BenchmarkRun]) -> Result<()> {
    let json = serde_json::to_vec_pretty(&ArtifactOut {
        summary: summary.to_artifact(),
        runs,
    })?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".chaosbench-")
        .suffix(".json.tmp")
        .tempfile_in(dir)
        .map_err(|e| HarnessError::io(dir, e))?;
    tmp.write_all(&json)
        .and_then(|()| tmp.write_all(b"\n"))
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| HarnessError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| HarnessError::io(path, e.error))?;

    log::info!("wrote {} runs to {}", runs.len(), path.display());
    Ok(())
}

/// Load an artifact written by [`write_artifact`].
pub fn read_artifact(path: &Path) -> Result<Artifact> {
    let raw = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
