//! External validator probe.
//!
//! The validator under benchmark is a black box: the harness only needs its
//! exit code, wall-clock time, and the `Overall Score: NN%` line it prints on
//! stdout. Documents can be perturbed first with [`inject_chaos`] to measure
//! how the score degrades under corruption ([`chaos_sweep`]), and the same
//! document can be checked against several pass thresholds at once
//! ([`threshold_sweep`]).

use std::io::Write;
use std::process::Command;
use std::time::{Duration, Instant};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::error::{HarnessError, Result};

/// Marker the validator prints before its score.
const SCORE_MARKER: &str = "Overall Score:";

/// Corruption levels of a default chaos sweep. The first is the baseline.
pub const DEFAULT_CHAOS_LEVELS: &[f64] = &[0.0, 0.1, 0.2, 0.3, 0.5];

/// Pass thresholds of a default threshold sweep.
pub const DEFAULT_SWEEP_THRESHOLDS: &[u32] = &[60, 80, 99];

/// Program plus leading arguments. The document path and
/// `--threshold <n>` are appended on every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ValidatorCommand {
    /// Split a whitespace-separated command line. `None` when empty.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Result of one validator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorOutcome {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub score: Option<u32>,
    pub passed: bool,
}

/// Run the validator once against `document`.
pub fn run_validator(
    cmd: &ValidatorCommand,
    document: &std::path::Path,
    threshold: u32,
) -> Result<ValidatorOutcome> {
    let start = Instant::now();
    let output = Command::new(&cmd.program)
        .args(&cmd.args)
        .arg(document)
        .arg("--threshold")
        .arg(threshold.to_string())
        .output()
        .map_err(|source| HarnessError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;
    let elapsed = start.elapsed();

    let stdout = String::from_utf8_lossy(&output.stdout);
    let score = parse_overall_score(&stdout);
    log::debug!(
        "validator {} exited {:?} in {:.3}s, score {:?}",
        cmd.program,
        output.status.code(),
        elapsed.as_secs_f64(),
        score
    );

    Ok(ValidatorOutcome {
        exit_code: output.status.code(),
        elapsed,
        score,
        passed: output.status.success(),
    })
}

/// Extract `NN` from the first `Overall Score: NN%` line.
pub fn parse_overall_score(stdout: &str) -> Option<u32> {
    let line = stdout.lines().find(|l| l.contains(SCORE_MARKER))?;
    let (_, rest) = line.split_once(SCORE_MARKER)?;
    rest.split('%').next()?.trim().parse().ok()
}

/// Kind of edit applied to one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaosEdit {
    /// Blank the line.
    Delete,
    /// Insert a copy of the line before it.
    Duplicate,
    /// Shuffle the line's words.
    Scramble,
}

/// Corrupt roughly `level` of the document's lines (at least one edit).
pub fn inject_chaos(content: &str, level: f64, rng: &mut impl Rng) -> String {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    let edits = ((lines.len() as f64 * level.max(0.0)) as usize).max(1);

    for _ in 0..edits {
        let idx = rng.random_range(0..lines.len());
        let edit = match rng.random_range(0..3) {
            0 => ChaosEdit::Delete,
            1 => ChaosEdit::Duplicate,
            _ => ChaosEdit::Scramble,
        };
        match edit {
            ChaosEdit::Delete => lines[idx].clear(),
            ChaosEdit::Duplicate => {
                let copy = lines[idx].clone();
                lines.insert(idx, copy);
            }
            ChaosEdit::Scramble => {
                let mut words: Vec<&str> = lines[idx].split_whitespace().collect();
                words.shuffle(rng);
                let scrambled = words.join(" ");
                lines[idx] = scrambled;
            }
        }
    }

    lines.join("\n")
}

/// Aggregate of repeated validator runs over one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub iterations: usize,
    pub chaos_level: f64,
    pub avg_elapsed_secs: f64,
    pub min_elapsed_secs: f64,
    pub max_elapsed_secs: f64,
    /// Mean over invocations that printed a score.
    pub avg_score: Option<f64>,
    pub passed: usize,
}

/// Write `content` (chaos-injected when `chaos_level > 0`) to a temporary
/// `.md` file and validate it `iterations` times.
pub fn probe_document(
    cmd: &ValidatorCommand,
    content: &str,
    iterations: usize,
    threshold: u32,
    chaos_level: f64,
    rng: &mut impl Rng,
) -> Result<ProbeReport> {
    let mut elapsed = Vec::with_capacity(iterations);
    let mut scores = Vec::new();
    let mut passed = 0;

    for _ in 0..iterations {
        let doc = if chaos_level > 0.0 {
            inject_chaos(content, chaos_level, rng)
        } else {
            content.to_string()
        };

        let file = scratch_document(&doc)?;
        let outcome = run_validator(cmd, file.path(), threshold)?;
        elapsed.push(outcome.elapsed.as_secs_f64());
        if let Some(score) = outcome.score {
            scores.push(f64::from(score));
        }
        if outcome.passed {
            passed += 1;
        }
    }

    let avg = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    let (avg_elapsed_secs, min_elapsed_secs) = if elapsed.is_empty() {
        (0.0, 0.0)
    } else {
        (avg(&elapsed), elapsed.iter().copied().fold(f64::INFINITY, f64::min))
    };
    Ok(ProbeReport {
        iterations,
        chaos_level,
        avg_elapsed_secs,
        min_elapsed_secs,
        max_elapsed_secs: elapsed.iter().copied().fold(0.0, f64::max),
        avg_score: (!scores.is_empty()).then(|| avg(&scores)),
        passed,
    })
}

/// One level of a chaos sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChaosLevelReport {
    #[serde(flatten)]
    pub report: ProbeReport,
    /// Baseline average score minus this level's average score, in
    /// percentage points. Positive means the score dropped. `None` for the
    /// baseline itself and when either side reported no score.
    pub degradation: Option<f64>,
}

/// Probe `content` at each corruption level and compare against the
/// uncorrupted baseline.
///
/// The baseline is level `0.0`; it is prepended when `levels` does not
/// start with it. Levels run in order with the shared `rng`.
pub fn chaos_sweep(
    cmd: &ValidatorCommand,
    content: &str,
    levels: &[f64],
    iterations: usize,
    threshold: u32,
    rng: &mut impl Rng,
) -> Result<Vec<ChaosLevelReport>> {
    let mut plan = Vec::with_capacity(levels.len() + 1);
    if levels.first() != Some(&0.0) {
        plan.push(0.0);
    }
    plan.extend_from_slice(levels);

    let mut baseline: Option<f64> = None;
    let mut out = Vec::with_capacity(plan.len());
    for (idx, level) in plan.into_iter().enumerate() {
        let report = probe_document(cmd, content, iterations, threshold, level, rng)?;
        let degradation = if idx == 0 {
            baseline = report.avg_score;
            None
        } else {
            match (baseline, report.avg_score) {
                (Some(base), Some(score)) => Some(base - score),
                _ => None,
            }
        };
        log::info!(
            "chaos level {:.0}%: avg score {:?}, degradation {:?}",
            level * 100.0,
            report.avg_score,
            degradation
        );
        out.push(ChaosLevelReport {
            report,
            degradation,
        });
    }
    Ok(out)
}

/// Validator verdict for one pass threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdCheck {
    pub threshold: u32,
    pub score: Option<u32>,
    pub passed: bool,
}

/// Validate the unmodified `content` once per threshold.
pub fn threshold_sweep(
    cmd: &ValidatorCommand,
    content: &str,
    thresholds: &[u32],
) -> Result<Vec<ThresholdCheck>> {
    let file = scratch_document(content)?;
    thresholds
        .iter()
        .map(|&threshold| -> Result<ThresholdCheck> {
            let outcome = run_validator(cmd, file.path(), threshold)?;
            Ok(ThresholdCheck {
                threshold,
                score: outcome.score,
                passed: outcome.passed,
            })
        })
        .collect()
}

/// Write `content` to a fresh `.md` file removed on drop.
fn scratch_document(content: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("chaosbench-")
        .suffix(".md")
        .tempfile()
        .map_err(|e| HarnessError::io(std::env::temp_dir(), e))?;
    file.write_all(content.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| HarnessError::io(file.path(), e))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    // -----------------------------------------------------------------------
    // Score parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_score_basic() {
        let out = "Validating...\nOverall Score: 87%\nDone";
        assert_eq!(parse_overall_score(out), Some(87));
    }

    #[test]
    fn test_parse_score_with_decoration() {
        assert_eq!(parse_overall_score("  ✅ Overall Score:   100 % (pass)"), Some(100));
    }

    #[test]
    fn test_parse_score_first_match_wins() {
        assert_eq!(
            parse_overall_score("Overall Score: 40%\nOverall Score: 90%"),
            Some(40)
        );
    }

    #[test]
    fn test_parse_score_absent_or_garbage() {
        assert_eq!(parse_overall_score(""), None);
        assert_eq!(parse_overall_score("Score: 50%"), None);
        assert_eq!(parse_overall_score("Overall Score: n/a"), None);
    }

    // -----------------------------------------------------------------------
    // Command parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_command_parse() {
        let cmd = ValidatorCommand::parse("node build/index.js wave-validate").unwrap();
        assert_eq!(cmd.program, "node");
        assert_eq!(cmd.args, vec!["build/index.js", "wave-validate"]);
        assert!(ValidatorCommand::parse("   ").is_none());
    }

    // -----------------------------------------------------------------------
    // Chaos injection
    // -----------------------------------------------------------------------

    #[test]
    fn test_inject_chaos_is_seed_deterministic() {
        let doc = "# Title\n\nalpha beta gamma\ndelta epsilon\n\n## End\nomega";
        let a = inject_chaos(doc, 0.3, &mut StdRng::seed_from_u64(5));
        let b = inject_chaos(doc, 0.3, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_inject_chaos_edit_count() {
        let doc = vec!["x"; 20].join("\n");
        let out = inject_chaos(&doc, 0.25, &mut StdRng::seed_from_u64(11));
        let lines: Vec<&str> = out.split('\n').collect();
        // 5 edits; only duplicates grow the document.
        assert!(lines.len() >= 20 && lines.len() <= 25);
        assert!(lines.iter().all(|l| *l == "x" || l.is_empty()));
    }

    #[test]
    fn test_inject_chaos_minimum_one_edit() {
        let doc = vec!["a b"; 4].join("\n");
        let mut rng = StdRng::seed_from_u64(3);
        let changed = (0..32)
            .map(|_| inject_chaos(&doc, 0.0, &mut rng))
            .filter(|out| *out != doc)
            .count();
        assert!(changed > 0);
    }

    #[test]
    fn test_inject_chaos_empty_document() {
        let out = inject_chaos("", 0.5, &mut StdRng::seed_from_u64(1));
        assert!(out.chars().all(|c| c == '\n'));
    }

    // -----------------------------------------------------------------------
    // Process invocation
    // -----------------------------------------------------------------------

    #[test]
    fn test_spawn_failure_is_reported() {
        let cmd = ValidatorCommand::parse("chaosbench-definitely-missing-binary").unwrap();
        let err = run_validator(&cmd, std::path::Path::new("doc.md"), 80).unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn shell(script: &str) -> ValidatorCommand {
        ValidatorCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "validator".to_string()],
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_run_validator_collects_outcome() {
        let cmd = shell("echo \"Overall Score: 72%\"; test \"$2\" = --threshold && exit 0; exit 9");
        let outcome = run_validator(&cmd, std::path::Path::new("doc.md"), 80).unwrap();
        assert_eq!(outcome.score, Some(72));
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.passed);
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_document_aggregates() {
        let cmd = shell("grep -q coherent \"$1\" && echo 'Overall Score: 90%' && exit 0; exit 1");
        let mut rng = StdRng::seed_from_u64(2);
        let report = probe_document(&cmd, "a coherent doc", 3, 80, 0.0, &mut rng).unwrap();
        assert_eq!(report.iterations, 3);
        assert_eq!(report.passed, 3);
        assert_eq!(report.avg_score, Some(90.0));
        assert!(report.min_elapsed_secs <= report.avg_elapsed_secs);
        assert!(report.avg_elapsed_secs <= report.max_elapsed_secs);
    }

    // -----------------------------------------------------------------------
    // Sweeps
    // -----------------------------------------------------------------------

    /// Scores the number of intact `keep alpha` lines.
    #[cfg(unix)]
    fn counting_validator() -> ValidatorCommand {
        shell("n=$(grep -cx 'keep alpha' \"$1\"); echo \"Overall Score: $n%\"; exit 0")
    }

    #[cfg(unix)]
    #[test]
    fn test_chaos_sweep_baseline_and_degradation() {
        let doc = vec!["keep alpha"; 40].join("\n");
        let mut rng = StdRng::seed_from_u64(8);
        let sweep =
            chaos_sweep(&counting_validator(), &doc, DEFAULT_CHAOS_LEVELS, 2, 80, &mut rng)
                .unwrap();

        let levels: Vec<f64> = sweep.iter().map(|l| l.report.chaos_level).collect();
        assert_eq!(levels, DEFAULT_CHAOS_LEVELS);
        assert_eq!(sweep[0].report.avg_score, Some(40.0));
        assert_eq!(sweep[0].degradation, None);
        for level in &sweep[1..] {
            let score = level.report.avg_score.unwrap();
            assert_eq!(level.degradation, Some(40.0 - score));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_chaos_sweep_prepends_baseline() {
        let doc = vec!["keep alpha"; 10].join("\n");
        let mut rng = StdRng::seed_from_u64(9);
        let sweep = chaos_sweep(&counting_validator(), &doc, &[0.5], 1, 80, &mut rng).unwrap();
        assert_eq!(sweep.len(), 2);
        assert_eq!(sweep[0].report.chaos_level, 0.0);
        assert_eq!(sweep[0].report.avg_score, Some(10.0));
        assert_eq!(sweep[1].report.chaos_level, 0.5);
        assert!(sweep[1].degradation.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_chaos_sweep_without_scores_has_no_degradation() {
        let mut rng = StdRng::seed_from_u64(1);
        let sweep = chaos_sweep(&shell("exit 0"), "a\nb", &[0.0, 0.5], 1, 80, &mut rng).unwrap();
        assert!(sweep.iter().all(|l| l.degradation.is_none()));
    }

    #[cfg(unix)]
    #[test]
    fn test_threshold_sweep_reports_each_threshold() {
        // Passes while the requested threshold is at most the score.
        let cmd = shell("echo 'Overall Score: 70%'; [ \"$3\" -le 70 ]");
        let checks = threshold_sweep(&cmd, "doc", DEFAULT_SWEEP_THRESHOLDS).unwrap();
        let verdicts: Vec<(u32, bool)> = checks.iter().map(|c| (c.threshold, c.passed)).collect();
        assert_eq!(verdicts, [(60, true), (80, false), (99, false)]);
        assert!(checks.iter().all(|c| c.score == Some(70)));
    }

    #[test]
    fn test_threshold_sweep_spawn_failure() {
        let cmd = ValidatorCommand::parse("chaosbench-definitely-missing-binary").unwrap();
        let err = threshold_sweep(&cmd, "doc", &[60]).unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[test]
    fn test_threshold_sweep_empty_is_empty() {
        let cmd = ValidatorCommand::parse("chaosbench-definitely-missing-binary").unwrap();
        assert!(threshold_sweep(&cmd, "doc", &[]).unwrap().is_empty());
    }
}
