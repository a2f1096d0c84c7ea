//! # chaosbench-core
//!
//! **A benchmark harness that scores itself under chaos.**
//!
//! `chaosbench-core` simulates per-query latency under controllable noise,
//! evolves a bounded "coherence" signal with a small deterministic dynamical
//! system (the pilot-wave model), and folds the resulting run sequence into a
//! freshness-weighted score and a JSON artifact.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chaosbench_core::{BenchmarkSession, HarnessConfig, telemetry};
//!
//! let config = HarnessConfig {
//!     chaos: true,
//!     pilot_wave: true,
//!     ..Default::default()
//! };
//! let mut sink = telemetry::for_stdout();
//! let outcome = BenchmarkSession::new(config.clone()).run(sink.as_mut());
//! let verdict = outcome
//!     .conclude(&config, &config.output, sink.as_mut())
//!     .expect("artifact written");
//! println!("coherence gain {:.1}%", verdict.summary.coherence_gain * 100.0);
//! std::process::exit(verdict.status.code());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! NoiseGenerator → PilotWaveEngine → RunExecutor → [BenchmarkRun…]
//!                                         ↓                ↓
//!                              TelemetrySink (OSC 633)  SessionSummary → JSON
//! ```
//!
//! The pilot-wave state is threaded explicitly from run to run; nothing is
//! global. Gaussian draws sit behind [`GaussianSource`] and terminal output
//! behind [`TelemetrySink`], so whole sessions replay bit-for-bit in tests.

pub mod config;
pub mod error;
pub mod executor;
pub mod freshness;
pub mod noise;
pub mod pilot_wave;
pub mod probe;
pub mod report;
pub mod session;
pub mod telemetry;

pub use config::{DEFAULT_OUTPUT, DEFAULT_QUERIES, HarnessConfig};
pub use error::{HarnessError, Result};
pub use executor::{BenchmarkRun, ExecutorConfig, RunExecutor, compose_run, simulated_latency};
pub use freshness::{fibonacci_weights, freshness_score};
pub use noise::{GaussianSource, NoiseGenerator, RandomGaussian, ReplayGaussian};
pub use pilot_wave::{Evolution, PilotWaveEngine, PilotWaveState, evolve};
pub use probe::{
    ChaosLevelReport, ProbeReport, ThresholdCheck, ValidatorCommand, ValidatorOutcome,
    chaos_sweep, inject_chaos, parse_overall_score, probe_document, run_validator,
    threshold_sweep,
};
pub use report::{
    Artifact, ArtifactSummary, ExitStatus, GainClass, ReportThresholds, SessionSummary,
    coherence_gain, read_artifact, write_artifact,
};
pub use session::{BenchmarkSession, SessionOutcome, SessionVerdict};
pub use telemetry::{AnsiTelemetry, EntropyState, Marker, NoopTelemetry, TelemetrySink};

/// Golden ratio φ = (1 + √5) / 2.
pub const PHI: f64 = 1.618_033_988_749_895;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
