//! Benchmark session driver.
//!
//! Runs iterations × queries strictly in order, threading the pilot-wave state
//! from each run into the next. Run N is always derived from run N−1, so the
//! loop is never reordered or parallelized.
//!
//! Interruption is cooperative: an [`AtomicBool`] (normally flipped by a
//! Ctrl+C handler) is checked before every run. A run already sleeping on its
//! simulated latency finishes first.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::executor::{BenchmarkRun, RunExecutor};
use crate::noise::NoiseGenerator;
use crate::pilot_wave::PilotWaveState;
use crate::report::{ExitStatus, SessionSummary, write_artifact};
use crate::telemetry::{TelemetrySink, toggle};

/// A configured session, ready to run once.
pub struct BenchmarkSession {
    config: HarnessConfig,
    executor: RunExecutor,
    interrupted: Arc<AtomicBool>,
}

/// Everything a finished (or interrupted) session produced.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub runs: Vec<BenchmarkRun>,
    pub final_state: Option<PilotWaveState>,
    pub interrupted: bool,
    pub elapsed: Duration,
}

/// Summary plus the exit status derived from it.
#[derive(Debug, Clone)]
pub struct SessionVerdict {
    pub summary: SessionSummary,
    pub status: ExitStatus,
}

impl BenchmarkSession {
    /// Session with a noise generator seeded from `config.seed`.
    pub fn new(config: HarnessConfig) -> Self {
        let noise = NoiseGenerator::from_seed(config.seed);
        Self::with_noise(config, noise)
    }

    /// Session with an explicit noise generator (replay, tests).
    pub fn with_noise(config: HarnessConfig, noise: NoiseGenerator) -> Self {
        Self {
            executor: RunExecutor::new(config.executor(), noise),
            config,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Flag that stops the session before its next run when set.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Execute every run in order.
    pub fn run(mut self, telemetry: &mut dyn TelemetrySink) -> SessionOutcome {
        let start = Instant::now();
        let total = self.config.total_runs();
        let mut runs = Vec::new();
        let mut state: Option<PilotWaveState> = None;
        let mut interrupted = false;

        telemetry.property("ChaosMode", toggle(self.config.chaos));
        telemetry.property("PilotWave", toggle(self.config.pilot_wave));
        log::info!(
            "session start: {} iterations x {} queries, chaos={}, pilot_wave={}",
            self.config.iterations,
            self.config.queries.len(),
            self.config.chaos,
            self.config.pilot_wave
        );

        'outer: for iteration in 0..self.config.iterations {
            for query in &self.config.queries {
                if self.interrupted.load(Ordering::SeqCst) {
                    interrupted = true;
                    break 'outer;
                }
                let (run, next) = self.executor.execute(
                    query,
                    iteration as u64,
                    self.config.chaos,
                    state.as_ref(),
                    telemetry,
                );
                if run.noise.abs() >= self.config.entropy_threshold {
                    log::warn!(
                        "entropy threshold exceeded on '{}' (noise {:+.3})",
                        run.query,
                        run.noise
                    );
                }
                runs.push(run);
                state = Some(next);
            }
        }

        if interrupted {
            log::warn!("session interrupted after {}/{} runs", runs.len(), total);
        }

        SessionOutcome {
            runs,
            final_state: state,
            interrupted,
            elapsed: start.elapsed(),
        }
    }
}

impl SessionOutcome {
    pub fn summarize(&self, config: &HarnessConfig) -> SessionVerdict {
        let summary = SessionSummary::from_runs(
            &self.runs,
            config.chaos,
            config.pilot_wave,
            &config.thresholds(),
        );
        let status = ExitStatus::for_session(&summary, self.interrupted);
        SessionVerdict { summary, status }
    }

    /// Summarize, write the artifact to `path`, and signal completion.
    ///
    /// An artifact write failure is returned as an error and no completion
    /// marker is emitted.
    pub fn conclude(
        &self,
        config: &HarnessConfig,
        path: &Path,
        telemetry: &mut dyn TelemetrySink,
    ) -> Result<SessionVerdict> {
        let verdict = self.summarize(config);
        write_artifact(path, &verdict.summary, &self.runs)?;
        telemetry.property("EntropyState", verdict.summary.entropy_state.as_str());
        telemetry.done(verdict.status.code());
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::ReplayGaussian;
    use crate::report::read_artifact;
    use crate::telemetry::{AnsiTelemetry, Marker, NoopTelemetry};

    /// Records the stream and raises the interrupt flag after `after` units.
    struct InterruptAfter {
        inner: AnsiTelemetry<Vec<u8>>,
        flag: Arc<AtomicBool>,
        after: usize,
    }

    impl TelemetrySink for InterruptAfter {
        fn emit(&mut self, marker: Marker<'_>) {
            self.inner.emit(marker);
            if marker == Marker::UnitEnd {
                self.after = self.after.saturating_sub(1);
                if self.after == 0 {
                    self.flag.store(true, Ordering::SeqCst);
                }
            }
        }

        fn status(&mut self, ok: bool, detail: &str) {
            self.inner.status(ok, detail);
        }
    }

    fn quiet_config() -> HarnessConfig {
        HarnessConfig {
            simulate_delay: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_chaos_off_scenario() {
        let session = BenchmarkSession::new(quiet_config());
        let outcome = session.run(&mut NoopTelemetry);

        assert_eq!(outcome.runs.len(), 15);
        assert!(!outcome.interrupted);
        assert!(outcome.runs.iter().all(|r| r.noise == 0.0 && r.success));

        let mut previous = PilotWaveState::INITIAL.position;
        for run in &outcome.runs {
            assert!(run.coherence > previous, "{} !> {previous}", run.coherence);
            previous = run.coherence;
        }
    }

    #[test]
    fn test_queries_cycle_in_order() {
        let outcome = BenchmarkSession::new(quiet_config()).run(&mut NoopTelemetry);
        let names: Vec<&str> = outcome.runs.iter().take(6).map(|r| r.query.as_str()).collect();
        assert_eq!(
            names,
            ["coherent", "medium", "incoherent", "coherent", "medium", "incoherent"]
        );
    }

    #[test]
    fn test_interrupt_before_start_runs_nothing() {
        let session = BenchmarkSession::new(quiet_config());
        session.interrupt_handle().store(true, Ordering::SeqCst);
        let outcome = session.run(&mut NoopTelemetry);
        assert!(outcome.interrupted);
        assert!(outcome.runs.is_empty());
        assert_eq!(outcome.summarize(&quiet_config()).status, ExitStatus::Interrupted);
    }

    #[test]
    fn test_interrupt_mid_session_keeps_completed_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("partial.json");
        // Far more runs than could ever be buffered up front.
        let config = HarnessConfig {
            iterations: 1_000_000_000,
            ..quiet_config()
        };
        let session = BenchmarkSession::new(config.clone());
        let mut sink = InterruptAfter {
            inner: AnsiTelemetry::new(Vec::new()),
            flag: session.interrupt_handle(),
            after: 4,
        };

        let outcome = session.run(&mut sink);
        assert!(outcome.interrupted);
        assert_eq!(outcome.runs.len(), 4);

        let verdict = outcome.conclude(&config, &path, &mut sink).unwrap();
        assert_eq!(verdict.status, ExitStatus::Interrupted);
        assert_eq!(verdict.summary.run_count, 4);

        let artifact = read_artifact(&path).unwrap();
        assert_eq!(artifact.runs.len(), 4);
        let names: Vec<&str> = artifact.runs.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(names, ["coherent", "medium", "incoherent", "coherent"]);

        let out = String::from_utf8(sink.inner.into_inner()).unwrap();
        assert_eq!(out.matches("\x1b]633;A\x07").count(), 4);
        assert!(out.ends_with("\x1b]633;D;130\x07"));
    }

    #[test]
    fn test_replayed_chaos_sessions_match() {
        let config = HarnessConfig {
            chaos: true,
            pilot_wave: true,
            ..quiet_config()
        };
        let samples: Vec<f64> = (0..15).map(|i| (i as f64 * 0.7).sin() * 2.0).collect();
        let run = |samples: Vec<f64>| {
            let noise = NoiseGenerator::new(Box::new(ReplayGaussian::new(samples)));
            BenchmarkSession::with_noise(config.clone(), noise).run(&mut NoopTelemetry)
        };
        let a = run(samples.clone());
        let b = run(samples);
        assert_eq!(a.runs, b.runs);
        assert_eq!(a.final_state, b.final_state);
    }

    #[test]
    fn test_session_announces_modes() {
        let config = HarnessConfig {
            iterations: 1,
            queries: vec!["only".to_string()],
            chaos: true,
            ..quiet_config()
        };
        let mut sink = AnsiTelemetry::new(Vec::new());
        BenchmarkSession::new(config).run(&mut sink);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.starts_with(
            "\x1b]633;P;ChaosMode=enabled\x07\x1b]633;P;PilotWave=disabled\x07"
        ));
        assert_eq!(out.matches("\x1b]633;A\x07").count(), 1);
    }

    #[test]
    fn test_conclude_writes_artifact_and_done_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.json");
        let config = HarnessConfig {
            pilot_wave: true,
            ..quiet_config()
        };
        let outcome = BenchmarkSession::new(config.clone()).run(&mut NoopTelemetry);

        let mut sink = AnsiTelemetry::new(Vec::new());
        let verdict = outcome.conclude(&config, &path, &mut sink).unwrap();
        assert_eq!(verdict.status, ExitStatus::Nominal);
        assert_eq!(verdict.summary.target_met, Some(true));
        assert!(path.exists());

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.ends_with("\x1b]633;D;0\x07"));
    }
}
