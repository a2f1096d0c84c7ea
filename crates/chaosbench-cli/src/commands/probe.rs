//! `chaosbench probe`: time an external validator over a document.

use std::path::Path;

use chaosbench_core::probe::{DEFAULT_CHAOS_LEVELS, DEFAULT_SWEEP_THRESHOLDS};
use chaosbench_core::{
    ChaosLevelReport, HarnessError, ProbeReport, ThresholdCheck, ValidatorCommand, chaos_sweep,
    probe_document, threshold_sweep,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{EXIT_FATAL, parse_numbers};

pub struct ProbeCommandConfig<'a> {
    pub validator: &'a str,
    pub document: &'a str,
    pub iterations: usize,
    pub threshold: u32,
    pub chaos_level: f64,
    pub seed: Option<u64>,
    pub output_path: Option<&'a str>,
    pub chaos_sweep: bool,
    pub levels: Option<&'a str>,
    pub threshold_sweep: bool,
    pub thresholds: Option<&'a str>,
}

/// Run the probe command.
pub fn run(cmd: ProbeCommandConfig<'_>) {
    let Some(validator) = ValidatorCommand::parse(cmd.validator) else {
        usage_error("--validator must name a program");
    };
    if !(0.0..=1.0).contains(&cmd.chaos_level) {
        usage_error(&format!(
            "--chaos-level must be within 0..=1, got {}",
            cmd.chaos_level
        ));
    }
    let levels = match cmd.levels.map(parse_numbers::<f64>) {
        None => DEFAULT_CHAOS_LEVELS.to_vec(),
        Some(Ok(l)) if l.iter().all(|v| (0.0..=1.0).contains(v)) => l,
        Some(Ok(_)) => usage_error("--levels must all be within 0..=1"),
        Some(Err(e)) => usage_error(&format!("--levels: {e}")),
    };
    let thresholds = match cmd.thresholds.map(parse_numbers::<u32>) {
        None => DEFAULT_SWEEP_THRESHOLDS.to_vec(),
        Some(Ok(t)) => t,
        Some(Err(e)) => usage_error(&format!("--thresholds: {e}")),
    };

    let path = Path::new(cmd.document);
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => fatal(&HarnessError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    };

    let mut rng = match cmd.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    println!("Validator probe");
    println!("  Validator:   {}", cmd.validator);
    println!("  Document:    {}", path.display());
    println!("  Iterations:  {}", cmd.iterations);
    println!("  Threshold:   {}%", cmd.threshold);
    println!("  Chaos level: {:.0}%", cmd.chaos_level * 100.0);
    println!();

    let report = match probe_document(
        &validator,
        &content,
        cmd.iterations,
        cmd.threshold,
        cmd.chaos_level,
        &mut rng,
    ) {
        Ok(r) => r,
        Err(e) => fatal(&e),
    };
    print_report(&report);

    let sweep = if cmd.chaos_sweep {
        match chaos_sweep(
            &validator,
            &content,
            &levels,
            cmd.iterations,
            cmd.threshold,
            &mut rng,
        ) {
            Ok(s) => {
                print_chaos_sweep(&s);
                Some(s)
            }
            Err(e) => fatal(&e),
        }
    } else {
        None
    };

    let checks = if cmd.threshold_sweep {
        match threshold_sweep(&validator, &content, &thresholds) {
            Ok(c) => {
                print_threshold_sweep(&c);
                Some(c)
            }
            Err(e) => fatal(&e),
        }
    } else {
        None
    };

    if let Some(out) = cmd.output_path {
        let doc = serde_json::json!({
            "report": report,
            "chaos_sweep": sweep,
            "threshold_sweep": checks,
        });
        match serde_json::to_string_pretty(&doc) {
            Ok(json) => {
                if let Err(e) = std::fs::write(out, json) {
                    fatal(&HarnessError::Io {
                        path: out.into(),
                        source: e,
                    });
                }
                println!();
                println!("  Report written to {out}");
            }
            Err(e) => fatal(&HarnessError::Serialize(e)),
        }
    }
}

fn print_report(report: &ProbeReport) {
    println!(
        "  Elapsed:  avg {:.3}s  min {:.3}s  max {:.3}s",
        report.avg_elapsed_secs, report.min_elapsed_secs, report.max_elapsed_secs
    );
    match report.avg_score {
        Some(score) => println!("  Score:    avg {score:.1}%"),
        None => println!("  Score:    not reported"),
    }
    println!("  Passed:   {}/{}", report.passed, report.iterations);
}

fn print_chaos_sweep(levels: &[ChaosLevelReport]) {
    println!();
    println!("Chaos resistance");
    for level in levels {
        let score = level
            .report
            .avg_score
            .map_or_else(|| "n/a".to_string(), |s| format!("{s:.0}%"));
        match level.degradation {
            Some(d) => println!(
                "  {:>3.0}%  score {score:>5}  degradation {d:+.0} pts",
                level.report.chaos_level * 100.0
            ),
            None => println!(
                "  {:>3.0}%  score {score:>5}",
                level.report.chaos_level * 100.0
            ),
        }
    }
}

fn print_threshold_sweep(checks: &[ThresholdCheck]) {
    println!();
    println!("Threshold accuracy");
    for check in checks {
        let score = check
            .score
            .map_or_else(|| "n/a".to_string(), |s| format!("{s}%"));
        let verdict = if check.passed { "PASS" } else { "FAIL" };
        println!("  {:>3}%  {verdict}  (score {score})", check.threshold);
    }
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(EXIT_FATAL);
}

fn fatal(err: &HarnessError) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(EXIT_FATAL);
}
