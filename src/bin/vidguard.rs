use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use vidguard::{
    AnalysisConfig, Analyzer, DEFAULT_CHUNK_SIZE, DetectorConfig, DigestAlgorithm,
    DissimilarityMetric, ErrorKind, FfmpegLogLevel, IntegrityReport, OperationType,
    ProgressCallback, ProgressInfo, VidGuardError,
};

const CLI_AFTER_HELP: &str = "Examples:\n  vidguard analyze input.mp4\n  vidguard analyze input.mp4 --out audit --sensitivity 5 --progress\n  vidguard hash input.mp4 --algorithm sha256\n  vidguard metadata input.mp4 --json\n  vidguard completions zsh > _vidguard";

const REPORT_FILE_NAME: &str = "report.json";

#[derive(Debug, Parser)]
#[command(
    name = "vidguard",
    version,
    about = "Fingerprint video files and flag frames that look altered",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show progress bars.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true, value_parser = parse_log_level)]
    log_level: Option<FfmpegLogLevel>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Hash a video, scan its frames, and write an integrity report.
    #[command(
        about = "Analyse a video and write an integrity report",
        after_help = "Examples:\n  vidguard analyze input.mp4\n  vidguard analyze input.mp4 --out audit --json\n  vidguard analyze input.mp4 --metric changed-pixels --pixel-threshold 30"
    )]
    Analyze {
        /// Input video path.
        input: PathBuf,
        /// Output directory for report.json.
        #[arg(long, default_value = "output")]
        out: PathBuf,
        /// Also print the report JSON to stdout.
        #[arg(long)]
        json: bool,
        /// Digest algorithm: md5 | sha256 | blake3.
        #[arg(long, default_value = "md5", value_parser = parse_algorithm)]
        algorithm: DigestAlgorithm,
        /// Frame comparison metric: mad | changed-pixels.
        #[arg(long, default_value = "mad", value_parser = parse_metric)]
        metric: DissimilarityMetric,
        /// Luma change (0-255) counted by the changed-pixels metric.
        #[arg(long)]
        pixel_threshold: Option<u8>,
        /// Baseline standard deviations a score must exceed to be flagged.
        #[arg(long)]
        sensitivity: Option<f64>,
        /// Scores at or below this are never flagged.
        #[arg(long)]
        min_score: Option<f64>,
        /// Number of recent scores in the baseline.
        #[arg(long)]
        window: Option<usize>,
        /// Flag both edges of a one-frame discontinuity.
        #[arg(long)]
        no_return_edge_suppression: bool,
        /// Hash before scanning instead of concurrently.
        #[arg(long)]
        sequential: bool,
        /// Bytes read per hashing step.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Print the digest of a file's bytes.
    #[command(about = "Hash a file")]
    Hash {
        /// Input file path.
        input: PathBuf,
        /// Digest algorithm: md5 | sha256 | blake3.
        #[arg(long, default_value = "md5", value_parser = parse_algorithm)]
        algorithm: DigestAlgorithm,
    },

    /// Print container metadata for a video (alias: probe).
    #[command(
        about = "Print video metadata",
        visible_alias = "probe",
        after_help = "Examples:\n  vidguard metadata input.mp4\n  vidguard metadata input.mp4 --json"
    )]
    Metadata {
        /// Input video path.
        input: PathBuf,
        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_algorithm(value: &str) -> Result<DigestAlgorithm, String> {
    value.parse().map_err(|error: VidGuardError| error.to_string())
}

fn parse_metric(value: &str) -> Result<DissimilarityMetric, String> {
    value.parse().map_err(|error: VidGuardError| error.to_string())
}

fn parse_log_level(value: &str) -> Result<FfmpegLogLevel, String> {
    value.parse().map_err(|error: VidGuardError| error.to_string())
}

fn exit_code(error: &(dyn Error + 'static)) -> i32 {
    match error.downcast_ref::<VidGuardError>().map(VidGuardError::kind) {
        Some(ErrorKind::SourceUnavailable) => 2,
        Some(ErrorKind::UnsupportedFormat) => 3,
        Some(ErrorKind::IoFailure) => 4,
        _ => 1,
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Some(level) = global.log_level {
        vidguard::set_ffmpeg_log_level(level);
    }
}

/// One bar per operation; hashing and frame scanning run side by side.
struct TerminalProgress {
    _bars: MultiProgress,
    hashing: ProgressBar,
    frames: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn Error>> {
        let bars = MultiProgress::new();
        let style = ProgressStyle::with_template(
            "{spinner:.green} {prefix:>7} {bar:40.cyan/blue} {pos}/{len} {msg}",
        )?
        .progress_chars("##-");

        let hashing = bars.add(ProgressBar::no_length().with_style(style.clone()));
        hashing.set_prefix("hash");
        let frames = bars.add(ProgressBar::no_length().with_style(style));
        frames.set_prefix("frames");

        Ok(Self {
            _bars: bars,
            hashing,
            frames,
        })
    }

    fn finish(&self) {
        self.hashing.finish_with_message("done");
        self.frames.finish_with_message("done");
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let bar = match info.operation {
            OperationType::Hashing => &self.hashing,
            OperationType::FrameScan => &self.frames,
            _ => return,
        };
        if let Some(total) = info.total {
            bar.set_length(total);
        }
        bar.set_position(info.current);
    }
}

fn print_summary(report: &IntegrityReport, report_path: &Path) {
    let score = report.integrity_score();
    let score_text = format!("{score:.2}%");
    let score_text = if !report.is_suspect() {
        score_text.green().bold()
    } else if score >= 99.0 {
        score_text.yellow().bold()
    } else {
        score_text.red().bold()
    };

    println!("{} {}", "hash:".bold(), report.hash);
    println!(
        "{} {} @ {:.2} fps, {} frames",
        "video:".bold(),
        report.metadata.resolution(),
        report.metadata.fps,
        report.metadata.frame_count,
    );
    if report.frame_count_mismatch() {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!(
                "container declares {} frames but {} were decoded",
                report.metadata.frame_count, report.decoded_frame_count
            )
            .yellow()
        );
    }
    if report.is_suspect() {
        println!(
            "{} {:?}",
            "altered frames:".red().bold(),
            report.altered_frames.as_slice()
        );
    } else {
        println!("{} none", "altered frames:".bold());
    }
    println!("{} {score_text}", "integrity:".bold());
    println!("{} {}", "saved".green().bold(), report_path.display());
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global);

    match cli.command {
        Commands::Analyze {
            input,
            out,
            json,
            algorithm,
            metric,
            pixel_threshold,
            sensitivity,
            min_score,
            window,
            no_return_edge_suppression,
            sequential,
            chunk_size,
        } => {
            let report_path = out.join(REPORT_FILE_NAME);
            ensure_writable_path(&report_path, cli.global.overwrite)?;

            let metric = match (metric, pixel_threshold) {
                (DissimilarityMetric::ChangedPixelRatio { .. }, Some(pixel_threshold)) => {
                    DissimilarityMetric::ChangedPixelRatio { pixel_threshold }
                }
                (metric, _) => metric,
            };

            let mut detector =
                DetectorConfig::new().suppress_return_edges(!no_return_edge_suppression);
            if let Some(sensitivity) = sensitivity {
                detector = detector.sensitivity_multiplier(sensitivity);
            }
            if let Some(min_score) = min_score {
                detector = detector.min_score(min_score);
            }
            if let Some(window) = window {
                detector = detector.baseline_window(window);
            }

            let mut config = AnalysisConfig::new()
                .with_detector(detector)
                .with_metric(metric)
                .with_digest_algorithm(algorithm)
                .with_chunk_size(chunk_size)
                .with_concurrent_hashing(!sequential);

            let progress = if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new()?);
                config = config
                    .with_progress(progress.clone())
                    .with_batch_size(10);
                Some(progress)
            } else {
                None
            };

            let report = Analyzer::new(config).analyze(&input)?;
            if let Some(progress) = progress {
                progress.finish();
            }

            report.write_to(&report_path)?;
            if json {
                println!("{}", report.to_json_pretty()?);
            } else {
                print_summary(&report, &report_path);
            }
        }
        Commands::Hash { input, algorithm } => {
            let hash = vidguard::hash_file(&input, algorithm)?;
            println!("{hash}  {}", input.display());
        }
        Commands::Metadata { input, json } => {
            let metadata = Analyzer::default().probe(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&metadata)?);
            } else {
                println!("Codec: {}", metadata.codec);
                println!("Resolution: {}", metadata.resolution());
                println!("Frame rate: {:.3} fps", metadata.fps);
                if metadata.frame_count > 0 {
                    println!(
                        "Frames: {} ({:?})",
                        metadata.frame_count, metadata.frame_count_source
                    );
                } else {
                    println!("Frames: unknown");
                }
                println!("Duration: {:.3}s", metadata.duration.as_secs_f64());
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vidguard", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(exit_code(error.as_ref()));
    }
}
