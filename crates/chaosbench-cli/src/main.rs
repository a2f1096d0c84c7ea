//! CLI for chaosbench: benchmark sessions scored under chaos.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chaosbench")]
#[command(about = "chaosbench: chaos-aware benchmark harness with a pilot-wave coherence model")]
#[command(version = chaosbench_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark session: iterations × queries, scored and written as JSON.
    /// Exit code: 0 nominal, 1 entropy exceeded, 2 gain target missed, 130 interrupted.
    Run {
        /// Passes over the query list
        #[arg(long)]
        iterations: Option<usize>,

        /// Inject stochastic noise into every run
        #[arg(long)]
        chaos: bool,

        /// Enable pilot-wave recovery and gain-target grading
        #[arg(long)]
        pilot_wave: bool,

        /// Comma-separated query identifiers (default: coherent,medium,incoherent)
        #[arg(long)]
        queries: Option<String>,

        /// Seed the noise stream for a reproducible session
        #[arg(long)]
        seed: Option<u64>,

        /// Artifact path (default: benchmark_results.json)
        #[arg(long)]
        output: Option<String>,

        /// JSON config file; flags given here override it
        #[arg(long)]
        config: Option<String>,

        /// Compute latencies without sleeping
        #[arg(long)]
        no_delay: bool,

        /// Override the |noise| entropy threshold
        #[arg(long)]
        entropy_threshold: Option<f64>,

        /// Override the coherence gain target (ratio, e.g. 0.25)
        #[arg(long)]
        gain_target: Option<f64>,
    },

    /// Time an external validator against a document, optionally chaos-injected.
    Probe {
        /// Validator command line; the document path and --threshold are appended
        #[arg(long)]
        validator: String,

        /// Document to validate
        #[arg(long)]
        document: String,

        /// Number of validator invocations
        #[arg(long, default_value = "10")]
        iterations: usize,

        /// Score threshold passed to the validator
        #[arg(long, default_value = "80")]
        threshold: u32,

        /// Fraction of lines to corrupt before each invocation (0 disables)
        #[arg(long, default_value = "0.0")]
        chaos_level: f64,

        /// Seed for chaos injection
        #[arg(long)]
        seed: Option<u64>,

        /// Write the probe report as JSON
        #[arg(long)]
        output: Option<String>,

        /// Also measure score degradation across increasing chaos levels
        #[arg(long)]
        chaos_sweep: bool,

        /// Comma-separated chaos levels for --chaos-sweep (default: 0,0.1,0.2,0.3,0.5)
        #[arg(long)]
        levels: Option<String>,

        /// Also check pass/fail at several thresholds
        #[arg(long)]
        threshold_sweep: bool,

        /// Comma-separated thresholds for --threshold-sweep (default: 60,80,99)
        #[arg(long)]
        thresholds: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            iterations,
            chaos,
            pilot_wave,
            queries,
            seed,
            output,
            config,
            no_delay,
            entropy_threshold,
            gain_target,
        } => commands::run::run(commands::run::RunCommandConfig {
            config_path: config.as_deref(),
            iterations,
            chaos,
            pilot_wave,
            queries: queries.as_deref(),
            seed,
            output_path: output.as_deref(),
            no_delay,
            entropy_threshold,
            gain_target,
        }),
        Commands::Probe {
            validator,
            document,
            iterations,
            threshold,
            chaos_level,
            seed,
            output,
            chaos_sweep,
            levels,
            threshold_sweep,
            thresholds,
        } => commands::probe::run(commands::probe::ProbeCommandConfig {
            validator: &validator,
            document: &document,
            iterations,
            threshold,
            chaos_level,
            seed,
            output_path: output.as_deref(),
            chaos_sweep,
            levels: levels.as_deref(),
            threshold_sweep,
            thresholds: thresholds.as_deref(),
        }),
    }
}
