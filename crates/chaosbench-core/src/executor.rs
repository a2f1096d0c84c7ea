//! Single simulated query execution.
//!
//! A run draws one noise sample (zero when chaos is off), advances the
//! pilot-wave state by one step, derives a latency from noise and guidance,
//! blocks for that latency, and classifies the outcome.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::noise::NoiseGenerator;
use crate::pilot_wave::{Evolution, PilotWaveEngine, PilotWaveState};
use crate::telemetry::{EntropyState, TelemetrySink};

/// Milliseconds of latency added per unit of |noise|.
const NOISE_LATENCY_GAIN: f64 = 10.0;
/// Milliseconds of latency removed per unit of |guidance|.
const GUIDANCE_LATENCY_RELIEF: f64 = 2.0;

/// One simulated execution. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    #[serde(rename = "q")]
    pub query: String,
    #[serde(rename = "lat")]
    pub latency_ms: f64,
    pub noise: f64,
    #[serde(rename = "ok")]
    pub success: bool,
    pub coherence: f64,
    #[serde(rename = "q_potential")]
    pub quantum_potential: f64,
    #[serde(rename = "trajectory_pred")]
    pub trajectory_prediction: f64,
}

/// Per-run settings, usually derived from [`crate::HarnessConfig::executor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorConfig {
    pub dt: f64,
    pub chaos_amplitude: f64,
    pub entropy_threshold: f64,
    pub base_latency_ms: f64,
    pub latency_floor_ms: f64,
    pub recovery_coherence: f64,
    pub simulate_delay: bool,
}

/// Drives single runs. Holds no pilot-wave state between calls.
#[derive(Debug)]
pub struct RunExecutor {
    config: ExecutorConfig,
    engine: PilotWaveEngine,
    noise: NoiseGenerator,
}

impl RunExecutor {
    pub fn new(config: ExecutorConfig, noise: NoiseGenerator) -> Self {
        Self {
            engine: PilotWaveEngine::new(config.dt),
            config,
            noise,
        }
    }

    /// Execute `query` for `iteration`, threading `prior` into the next state.
    ///
    /// The noise generator is not touched when `chaos` is false.
    pub fn execute(
        &mut self,
        query: &str,
        iteration: u64,
        chaos: bool,
        prior: Option<&PilotWaveState>,
        telemetry: &mut dyn TelemetrySink,
    ) -> (BenchmarkRun, PilotWaveState) {
        let noise = if chaos {
            self.noise.sample(iteration, self.config.chaos_amplitude)
        } else {
            0.0
        };
        self.execute_with_noise(query, noise, prior, telemetry)
    }

    /// Execute with an externally supplied noise value.
    pub fn execute_with_noise(
        &self,
        query: &str,
        noise: f64,
        prior: Option<&PilotWaveState>,
        telemetry: &mut dyn TelemetrySink,
    ) -> (BenchmarkRun, PilotWaveState) {
        let noise = if noise.is_finite() {
            noise
        } else {
            log::warn!("non-finite noise {noise} for query '{query}', using 0");
            0.0
        };

        telemetry.unit_start();

        let evolution = self.engine.step(prior, noise);
        let run = compose_run(query, noise, &evolution, &self.config);

        if self.config.simulate_delay {
            pause(run.latency_ms);
        }

        let entropy = EntropyState::classify(noise, self.config.entropy_threshold);
        let level = chaos_level(noise, self.config.entropy_threshold);
        telemetry.property("ChaosLevel", &level.to_string());
        telemetry.property("EntropyState", entropy.as_str());
        telemetry.property("Coherence", &format!("{:.3}", run.coherence));
        telemetry.status(
            run.success,
            &format!(
                "{:<12} {:>8.2}ms  noise={:+.3}  coherence={:.3}",
                run.query, run.latency_ms, run.noise, run.coherence
            ),
        );
        telemetry.unit_end();

        log::debug!(
            "run {query}: lat={:.3}ms noise={noise:+.4} ok={} coherence={:.4} q={:.4}",
            run.latency_ms,
            run.success,
            run.coherence,
            run.quantum_potential
        );

        (run, evolution.state)
    }
}

/// Derive a run record from one evolution step. Pure; no blocking.
pub fn compose_run(
    query: &str,
    noise: f64,
    evolution: &Evolution,
    config: &ExecutorConfig,
) -> BenchmarkRun {
    let state = &evolution.state;
    let coherence = state.position.clamp(0.0, 1.0);
    let latency_ms = simulated_latency(
        config.base_latency_ms,
        noise,
        state.guidance,
        config.latency_floor_ms,
    );
    let success = noise.abs() < config.entropy_threshold || coherence > config.recovery_coherence;

    BenchmarkRun {
        query: query.to_string(),
        latency_ms,
        noise,
        success,
        coherence,
        quantum_potential: evolution.quantum_potential,
        trajectory_prediction: state.predict(config.dt),
    }
}

/// `base + |noise|·10 − |guidance|·2`, never below `floor`.
///
/// Noise models contention; guidance-field stabilization relieves it.
pub fn simulated_latency(base_ms: f64, noise: f64, guidance: f64, floor_ms: f64) -> f64 {
    let floor = if floor_ms.is_finite() && floor_ms > 0.0 {
        floor_ms
    } else {
        f64::MIN_POSITIVE
    };
    let raw = base_ms + noise.abs() * NOISE_LATENCY_GAIN - guidance.abs() * GUIDANCE_LATENCY_RELIEF;
    if raw.is_nan() { floor } else { raw.max(floor) }
}

/// |noise| as a percentage of the entropy threshold, saturating at 100.
pub fn chaos_level(noise: f64, entropy_threshold: f64) -> u8 {
    if entropy_threshold <= 0.0 {
        return if noise == 0.0 { 0 } else { 100 };
    }
    (noise.abs() / entropy_threshold * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Block the calling thread. Not interruptible.
fn pause(latency_ms: f64) {
    match Duration::try_from_secs_f64(latency_ms / 1000.0) {
        Ok(d) => std::thread::sleep(d),
        Err(e) => log::warn!("cannot simulate latency of {latency_ms}ms: {e}"),
    }
}
