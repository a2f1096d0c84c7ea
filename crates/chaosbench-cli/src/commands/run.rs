//! `chaosbench run`: run a benchmark session and write its artifact.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use chaosbench_core::session::SessionVerdict;
use chaosbench_core::telemetry::{self, TelemetrySink};
use chaosbench_core::{BenchmarkSession, HarnessConfig, HarnessError};

use super::{EXIT_FATAL, parse_list};

pub struct RunCommandConfig<'a> {
    pub config_path: Option<&'a str>,
    pub iterations: Option<usize>,
    pub chaos: bool,
    pub pilot_wave: bool,
    pub queries: Option<&'a str>,
    pub seed: Option<u64>,
    pub output_path: Option<&'a str>,
    pub no_delay: bool,
    pub entropy_threshold: Option<f64>,
    pub gain_target: Option<f64>,
}

/// Run the session command. Never returns.
pub fn run(cmd: RunCommandConfig<'_>) {
    let mut sink = telemetry::for_stdout();

    let config = match build_config(&cmd) {
        Ok(c) => c,
        Err(e) => fail(sink.as_mut(), &e),
    };

    let session = BenchmarkSession::new(config.clone());
    let flag = session.interrupt_handle();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        log::warn!("cannot install Ctrl+C handler: {e}");
    }

    print_banner(session.config());

    let outcome = session.run(sink.as_mut());
    if outcome.interrupted {
        eprintln!(
            "Interrupted after {}/{} runs; writing partial results",
            outcome.runs.len(),
            config.total_runs()
        );
    }

    let verdict = match outcome.conclude(&config, &config.output, sink.as_mut()) {
        Ok(v) => v,
        Err(e) => fail(sink.as_mut(), &e),
    };

    print_summary(&verdict, &config.output, outcome.elapsed.as_secs_f64());
    std::process::exit(verdict.status.code());
}

/// Defaults, then the config file, then flags.
fn build_config(cmd: &RunCommandConfig<'_>) -> Result<HarnessConfig, HarnessError> {
    let mut config = match cmd.config_path {
        Some(p) => HarnessConfig::load_from_path(Path::new(p))?,
        None => HarnessConfig::default(),
    };

    if let Some(n) = cmd.iterations {
        config.iterations = n;
    }
    config.chaos |= cmd.chaos;
    config.pilot_wave |= cmd.pilot_wave;
    if let Some(raw) = cmd.queries {
        config.queries = parse_list(raw);
    }
    if cmd.seed.is_some() {
        config.seed = cmd.seed;
    }
    if let Some(p) = cmd.output_path {
        config.output = PathBuf::from(p);
    }
    if cmd.no_delay {
        config.simulate_delay = false;
    }
    if let Some(t) = cmd.entropy_threshold {
        config.entropy_threshold = t;
    }
    if let Some(t) = cmd.gain_target {
        config.gain_target = t;
    }

    config.validate().map_err(|message| HarnessError::Config {
        path: cmd.config_path.map_or_else(|| PathBuf::from("<flags>"), PathBuf::from),
        message,
    })?;
    Ok(config)
}

fn print_banner(config: &HarnessConfig) {
    println!("Benchmark session");
    println!("  Queries:    {}", config.queries.join(", "));
    println!("  Iterations: {}", config.iterations);
    println!("  Chaos:      {}", telemetry::toggle(config.chaos));
    println!("  Pilot wave: {}", telemetry::toggle(config.pilot_wave));
    if let Some(seed) = config.seed {
        println!("  Seed:       {seed}");
    }
    println!("  Output:     {}", config.output.display());
    println!();
}

fn print_summary(verdict: &SessionVerdict, output: &Path, elapsed_secs: f64) {
    let s = &verdict.summary;
    let coherence = |c: Option<f64>| c.map_or_else(|| "-".to_string(), |c| format!("{c:.3}"));

    println!();
    println!("Summary ({} runs in {elapsed_secs:.2}s)", s.run_count);
    println!("  Avg latency:     {:.2} ms", s.avg_latency_ms);
    println!("  Freshness score: {:.2} ms", s.fib_score);
    println!(
        "  Coherence:       {} -> {} (avg {:.3})",
        coherence(s.initial_coherence),
        coherence(s.final_coherence),
        s.avg_coherence
    );
    println!(
        "  Coherence gain:  {:+.1}% ({})",
        s.coherence_gain * 100.0,
        s.gain_class
    );
    println!(
        "  Entropy state:   {} (max |noise| {:.3})",
        s.entropy_state, s.max_abs_noise
    );
    println!("  Failed runs:     {}", s.failed_runs);
    match s.target_met {
        Some(true) => println!("  Target:          met"),
        Some(false) => println!("  Target:          missed"),
        None => {}
    }
    println!("  Artifact:        {}", output.display());
    println!("  Exit code:       {}", verdict.status.code());
}

fn fail(sink: &mut dyn TelemetrySink, err: &HarnessError) -> ! {
    eprintln!("Error: {err}");
    sink.done(EXIT_FATAL);
    std::process::exit(EXIT_FATAL);
}
