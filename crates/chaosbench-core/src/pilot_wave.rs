//! Pilot-wave coherence model.
//!
//! A small deterministic dynamical system whose `position` is the harness's
//! coherence signal. Each step consumes exactly one noise sample and derives a
//! new [`PilotWaveState`] from the previous one; every quantity in a step is
//! computed from the *previous* state only, never from a sibling already
//! updated in the same step.
//!
//! ```text
//! phase'     = phase + φ·noise·dt
//! amplitude' = clamp(amplitude·0.98 + |noise|·φ·0.10, 0.7, 1.5)
//! guidance   = (phase' − phase) / dt
//! Q          = −((amplitude' − amplitude)/dt / amplitude') / 2
//! velocity'  = clamp(velocity·0.93 + guidance·φ·0.16 + 0.015·φ/(1+|velocity|), −0.5, 0.5)
//! position'  = clamp(position + velocity'·dt·φ + Q·dt·0.02 + 0.015·(1−position)·φ, 0, 1)
//! ```
//!
//! The `(1 − position)` drive pulls coherence upward while it is low and fades
//! near the ceiling; the 0.98 / 0.93 damping keeps repeated noise injection
//! from running away.

use serde::{Deserialize, Serialize};

use crate::PHI;

/// Default integration step.
pub const DEFAULT_DT: f64 = 0.1;

pub const POSITION_RANGE: (f64, f64) = (0.0, 1.0);
pub const VELOCITY_RANGE: (f64, f64) = (-0.5, 0.5);
pub const AMPLITUDE_RANGE: (f64, f64) = (0.7, 1.5);

/// Guidance field per unit phase gradient.
const GUIDANCE_COUPLING: f64 = 1.0;
/// Below this amplitude the quantum potential is forced to zero.
const AMPLITUDE_EPSILON: f64 = 1e-6;
const AMPLITUDE_DAMPING: f64 = 0.98;
const VELOCITY_DAMPING: f64 = 0.93;
const DRIVE: f64 = 0.015;

/// State of the pilot-wave system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PilotWaveState {
    /// Coherence, in `[0, 1]`.
    pub position: f64,
    /// In `[-0.5, 0.5]`.
    pub velocity: f64,
    /// Guidance field from the last step.
    pub guidance: f64,
    /// In `[0.7, 1.5]`.
    pub amplitude: f64,
    /// Accumulated phase. Never clamped.
    pub phase: f64,
}

impl PilotWaveState {
    /// Seed state every session starts from.
    pub const INITIAL: Self = Self {
        position: 0.42,
        velocity: 0.08,
        guidance: 0.0,
        amplitude: 1.0,
        phase: 0.0,
    };

    /// One-step-ahead coherence forecast, clamped to `[0, 1]`.
    ///
    /// Exposed for observability only; it is never fed back into the state.
    pub fn predict(&self, dt: f64) -> f64 {
        clamp(self.position + self.velocity * dt, POSITION_RANGE)
    }

    /// True when position, velocity and amplitude sit inside their ranges.
    pub fn is_bounded(&self) -> bool {
        in_range(self.position, POSITION_RANGE)
            && in_range(self.velocity, VELOCITY_RANGE)
            && in_range(self.amplitude, AMPLITUDE_RANGE)
    }
}

impl Default for PilotWaveState {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Result of a single evolution step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evolution {
    pub state: PilotWaveState,
    pub quantum_potential: f64,
}

/// Advance `state` by one step driven by `noise`.
///
/// Non-finite noise is treated as zero so the range invariants hold for every
/// `f64` input.
pub fn evolve(state: &PilotWaveState, noise: f64, dt: f64) -> Evolution {
    let noise = if noise.is_finite() { noise } else { 0.0 };

    let phase = state.phase + PHI * noise * dt;

    let amplitude = clamp(
        state.amplitude * AMPLITUDE_DAMPING + noise.abs() * PHI * 0.10,
        AMPLITUDE_RANGE,
    );

    let guidance = (phase - state.phase) / dt * GUIDANCE_COUPLING;

    let quantum_potential = if amplitude < AMPLITUDE_EPSILON {
        0.0
    } else {
        let gradient = (amplitude - state.amplitude) / dt;
        -(gradient / amplitude) / 2.0
    };

    let velocity = clamp(
        state.velocity * VELOCITY_DAMPING
            + guidance * (PHI * 0.16)
            + DRIVE * PHI / (1.0 + state.velocity.abs()),
        VELOCITY_RANGE,
    );

    let position = clamp(
        state.position
            + velocity * dt * PHI
            + quantum_potential * dt * 0.02
            + DRIVE * (1.0 - state.position) * PHI,
        POSITION_RANGE,
    );

    Evolution {
        state: PilotWaveState {
            position,
            velocity,
            guidance,
            amplitude,
            phase,
        },
        quantum_potential,
    }
}

/// Stateless stepper bound to a fixed `dt`.
///
/// The engine holds no state between calls: the caller threads the returned
/// [`PilotWaveState`] into the next step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PilotWaveEngine {
    dt: f64,
}

impl PilotWaveEngine {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }

    /// Step from `prior`, or from [`PilotWaveState::INITIAL`] on the first call.
    pub fn step(&self, prior: Option<&PilotWaveState>, noise: f64) -> Evolution {
        evolve(prior.unwrap_or(&PilotWaveState::INITIAL), noise, self.dt)
    }
}

impl Default for PilotWaveEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DT)
    }
}

/// Clamp that maps NaN to the lower bound.
fn clamp(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if value.is_nan() { lo } else { value.clamp(lo, hi) }
}

fn in_range(value: f64, (lo, hi): (f64, f64)) -> bool {
    (lo..=hi).contains(&value)
}
