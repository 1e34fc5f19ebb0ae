//! glyphclick CLI
//!
//! Command-line interface for solving click-order picture captchas: read a
//! challenge, print the four click points in the order the title asks for.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use core_pipeline::{encode_verify_code, Level, Profile, Solution, Solver, SolverConfig};
use ocr_bridge::{tesseract_recognizers, ComponentDetector};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("BUILT_GIT_COMMIT_HASH"),
    "\nbuilt:  ",
    env!("BUILT_TIME_UTC"),
    "\nhost:   ",
    env!("BUILT_HOST"),
);

/// File extensions `batch` picks up
const CHALLENGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "b64", "txt"];

#[derive(Parser)]
#[command(name = "glyphclick")]
#[command(about = "Solve click-order picture captchas", long_about = None)]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SolverArgs {
    /// Solver config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Effort level: fast, balanced, accurate or max
    #[arg(short, long)]
    level: Option<Level>,

    /// Tesseract data directory
    #[arg(long)]
    tessdata: Option<String>,

    /// Tesseract language
    #[arg(long, default_value = "chi_sim")]
    lang: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// JSON array of click points
    Points,
    /// `x-y` pairs as submitted to the provider
    Verify,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a single challenge
    Solve {
        /// Challenge image, or a .b64/.txt file holding its base64 payload
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, value_enum, default_value = "points")]
        format: OutputFormat,

        /// Print the full solution (titles, votes, matrix) as JSON
        #[arg(long)]
        explain: bool,

        #[command(flatten)]
        solver: SolverArgs,
    },

    /// Solve every challenge under a directory and report the success rate
    Batch {
        /// Directory of challenges
        #[arg(short, long)]
        dir: PathBuf,

        #[command(flatten)]
        solver: SolverArgs,
    },

    /// List the built-in profiles
    Profiles,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(
        target_triple = built_info::TARGET,
        rustc = built_info::RUSTC_VERSION,
        "glyphclick starting"
    );

    match cli.command {
        Commands::Solve {
            input,
            format,
            explain,
            solver,
        } => {
            let solver = build_solver(&solver);
            let solution = solve_file(&solver, &input)?;
            println!("{}", render(&solution, &solver, format, explain)?);
            Ok(())
        }
        Commands::Batch { dir, solver } => {
            let solver = build_solver(&solver);
            let report = run_batch(&solver, &dir)?;
            println!(
                "solved {}/{} ({:.1}%), mean latency {:.1} ms",
                report.solved,
                report.total,
                report.success_rate() * 100.0,
                report.mean_latency().as_secs_f64() * 1000.0
            );
            Ok(())
        }
        Commands::Profiles => {
            for level in Level::ALL {
                println!("{}", describe_profile(&Profile::for_level(level)));
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_solver(args: &SolverArgs) -> Solver {
    let mut config = match &args.config {
        Some(path) => SolverConfig::load_or_default(path),
        None => SolverConfig::default(),
    };
    if let Some(level) = args.level {
        config = config.with_level(level);
    }

    let recognizers = tesseract_recognizers(args.tessdata.clone(), &args.lang);
    let detector = Arc::new(ComponentDetector::default());
    let solver = Solver::from_config(&config, recognizers, detector);
    info!(
        profile = %solver.profile().name,
        variants = solver.profile().variants_per_box(),
        "solver ready"
    );
    solver
}

/// A challenge as read from disk
#[derive(Debug, PartialEq)]
enum Challenge {
    Base64(String),
    Encoded(Vec<u8>),
}

fn read_challenge(path: &Path) -> Result<Challenge> {
    let is_text = matches!(extension(path).as_deref(), Some("b64") | Some("txt"));
    if is_text {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Challenge::Base64(text))
    } else {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Challenge::Encoded(bytes))
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn solve_file(solver: &Solver, path: &Path) -> Result<Solution> {
    let solution = match read_challenge(path)? {
        Challenge::Base64(text) => solver.try_solve(&text),
        Challenge::Encoded(bytes) => solver.try_solve_bytes(&bytes),
    }
    .with_context(|| format!("Failed to solve {}", path.display()))?;
    Ok(solution)
}

fn render(
    solution: &Solution,
    solver: &Solver,
    format: OutputFormat,
    explain: bool,
) -> Result<String> {
    if explain {
        return Ok(serde_json::to_string_pretty(solution)?);
    }
    Ok(match format {
        OutputFormat::Points => serde_json::to_string(&solution.points)?,
        OutputFormat::Verify => {
            encode_verify_code(&solution.points, solver.template().submit_y_scale)
        }
    })
}

#[derive(Debug, Default, PartialEq)]
struct BatchReport {
    total: usize,
    solved: usize,
    elapsed: Duration,
}

impl BatchReport {
    fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.solved as f64 / self.total as f64
        }
    }

    fn mean_latency(&self) -> Duration {
        if self.total == 0 {
            Duration::ZERO
        } else {
            self.elapsed / self.total as u32
        }
    }
}

fn is_challenge(path: &Path) -> bool {
    extension(path)
        .map(|e| CHALLENGE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

fn run_batch(solver: &Solver, dir: &Path) -> Result<BatchReport> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let mut report = BatchReport::default();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_challenge(path) {
            continue;
        }

        let started = Instant::now();
        let points = match read_challenge(path) {
            Ok(Challenge::Base64(text)) => solver.solve(&text),
            Ok(Challenge::Encoded(bytes)) => solver.solve_bytes(&bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable challenge");
                continue;
            }
        };
        report.elapsed += started.elapsed();
        report.total += 1;

        match points {
            Some(points) => {
                report.solved += 1;
                println!("{}\t{}", path.display(), serde_json::to_string(&points)?);
            }
            None => println!("{}\tunsolved", path.display()),
        }
    }
    Ok(report)
}

fn describe_profile(profile: &Profile) -> String {
    let shape = match &profile.shape {
        Some(s) => format!(
            "shape refinement on (votes x{}, shape x{})",
            s.vote_weight, s.shape_weight
        ),
        None => "shape refinement off".to_string(),
    };
    format!(
        "{:<10} {:>4} variants per box, {} pass(es), {}",
        profile.name,
        profile.variants_per_box(),
        profile.passes.len(),
        shape
    )
}
