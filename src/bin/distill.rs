use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use distill::{
    AnchorPolicy, CalibrationOptions, ExtractOptions, FfmpegLogLevel, OutputFormat,
    ProgressCallback, ProgressInfo, VideoSource,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  distill metadata input.mp4 --json\n  distill calibrate input.mp4 --target 120 --progress\n  distill extract input.mp4 --out keyframes --threshold 0.65 --ext jpg\n  distill auto input.mp4 --out keyframes --target 120 --progress\n  distill completions zsh > _distill";

#[derive(Debug, Parser)]
#[command(
    name = "distill",
    version,
    about = "Distill videos into their distinct keyframes",
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
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// Allow writing into an existing output directory.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print metadata for a video file (alias: probe).
    #[command(
        about = "Print video metadata",
        visible_alias = "probe",
        visible_alias = "info",
        after_help = "Examples:\n  distill metadata input.mp4\n  distill metadata input.mp4 --json"
    )]
    Metadata {
        /// Input video path.
        input: String,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Find the similarity threshold that yields a target keyframe count.
    #[command(
        about = "Calibrate a similarity threshold",
        visible_alias = "infer",
        after_help = "Examples:\n  distill calibrate input.mp4 --target 120\n  distill calibrate input.mp4 --target 120 --tolerance 0.01 --json"
    )]
    Calibrate {
        /// Input video path.
        input: String,
        /// Desired number of keyframes.
        #[arg(long)]
        target: u64,
        /// Relative tolerance on the achieved count (0.005 = 0.5%).
        #[arg(long, default_value_t = distill::DEFAULT_TOLERANCE)]
        tolerance: f64,
        /// Maximum number of search iterations.
        #[arg(long, default_value_t = distill::DEFAULT_MAX_ITERATIONS)]
        max_iterations: u32,
        /// Anchor policy: dual (observed frames) or single (retained frame).
        #[arg(long, default_value = "dual")]
        policy: String,
        /// Output the result, including the search path, as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract keyframes at a fixed threshold to an output directory.
    #[command(
        about = "Extract keyframes",
        after_help = "Examples:\n  distill extract input.mp4 --out keyframes --threshold 0.65\n  distill extract input.mp4 --out frames --all-frames --ext bmp"
    )]
    Extract {
        /// Input video path.
        input: String,
        /// Output directory for keyframe images.
        #[arg(long)]
        out: PathBuf,
        /// Similarity threshold in [0, 1]; frames scoring below it are kept.
        #[arg(long, default_value_t = 0.65)]
        threshold: f64,
        /// Output image format (png, jpg, bmp).
        #[arg(long, default_value = "png")]
        ext: String,
        /// Anchor policy: dual (observed frames) or single (retained frame).
        #[arg(long, default_value = "dual")]
        policy: String,
        /// Write every decoded frame instead of detecting keyframes.
        #[arg(long)]
        all_frames: bool,
        /// Frames per progress report / output flush batch.
        #[arg(long, default_value_t = 10)]
        buffer_size: u64,
    },

    /// Calibrate a threshold for a target count, then extract with it.
    #[command(
        about = "Calibrate and extract in one run",
        after_help = "Examples:\n  distill auto input.mp4 --out keyframes --target 120 --progress"
    )]
    Auto {
        /// Input video path.
        input: String,
        /// Output directory for keyframe images.
        #[arg(long)]
        out: PathBuf,
        /// Desired number of keyframes.
        #[arg(long)]
        target: u64,
        /// Relative tolerance on the achieved count.
        #[arg(long, default_value_t = distill::DEFAULT_TOLERANCE)]
        tolerance: f64,
        /// Output image format (png, jpg, bmp).
        #[arg(long, default_value = "png")]
        ext: String,
        /// Anchor policy: dual (observed frames) or single (retained frame).
        #[arg(long, default_value = "dual")]
        policy: String,
    },

    /// Count keyframes at several thresholds over a single decode.
    #[command(
        about = "Sweep thresholds and report counts",
        after_help = "Examples:\n  distill sweep input.mp4 --thresholds 0.2,0.4,0.6,0.8\n  distill sweep input.mp4 --thresholds 0.5,0.9 --json"
    )]
    Sweep {
        /// Input video path.
        input: String,
        /// Comma-separated list of thresholds in [0, 1].
        #[arg(long, value_delimiter = ',')]
        thresholds: Vec<f64>,
        /// Decode fresh for every threshold instead of replaying from memory.
        #[arg(long)]
        no_cache: bool,
        /// Output the counts as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_policy(value: &str) -> Option<AnchorPolicy> {
    match value.to_ascii_lowercase().as_str() {
        "dual" | "observed" | "dual-observed" => Some(AnchorPolicy::DualObserved),
        "single" | "retained" | "single-retained" => Some(AnchorPolicy::SingleRetained),
        _ => None,
    }
}

fn parse_output_format(value: &str) -> Option<OutputFormat> {
    match value.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => Some(OutputFormat::Png),
        "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
        "bmp" => Some(OutputFormat::Bmp),
        _ => None,
    }
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level
            .parse()
            .map_err(|_| format!("unsupported --log-level: {level}"))?;
        distill::set_ffmpeg_log_level(parsed);
    } else {
        // Calibration decodes the same file dozens of times; keep FFmpeg's
        // own stderr chatter down to actual errors unless asked otherwise.
        distill::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    }

    Ok(())
}

fn ensure_writable_dir(path: &PathBuf, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !overwrite {
        return Err(format!(
            "output directory already exists: {} (use --overwrite)",
            path.display()
        )
        .into());
    }
    if path.exists() {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("writing into existing directory {}", path.display()).yellow()
        );
    }
    Ok(())
}

/// Drives an indicatif bar from the library's progress callbacks.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(label: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {msg} {bar:40.cyan/blue} {pos}/{len}")?;
        bar.set_style(style.progress_chars("##-"));
        bar.set_message(label.to_string());
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
    }
}

fn calibration_options(
    global: &GlobalOptions,
    policy: &str,
    tolerance: f64,
    max_iterations: u32,
) -> Result<(CalibrationOptions, Option<Arc<TerminalProgress>>), Box<dyn std::error::Error>> {
    let policy = parse_policy(policy).ok_or(format!("unsupported --policy: {policy}"))?;
    let mut options = CalibrationOptions::new()
        .with_tolerance(tolerance)
        .with_max_iterations(max_iterations)
        .with_policy(policy);

    let mut bar = None;
    if global.progress {
        let progress = Arc::new(TerminalProgress::new("calibrating")?);
        options = options.with_progress(progress.clone());
        bar = Some(progress);
    }

    Ok((options, bar))
}

fn print_inference_result(result: &distill::InferenceResult, target: u64, json: bool) {
    if json {
        let payload = json!({
            "optimal_threshold": result.optimal_threshold,
            "frame_count": result.frame_count,
            "target": target,
            "iterations": result.iterations,
            "converged": result.converged,
            "search_path": result.search_path.iter().map(|step| json!({
                "threshold": step.threshold,
                "frame_count": step.frame_count,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).expect("serialize inference result")
        );
        return;
    }

    if result.converged {
        println!(
            "{} {}",
            "converged:".green().bold(),
            format!(
                "threshold {:.5} -> {} frames (target {}) in {} iterations",
                result.optimal_threshold, result.frame_count, target, result.iterations,
            )
            .green()
        );
    } else {
        println!(
            "{} {}",
            "not converged:".yellow().bold(),
            format!(
                "best threshold {:.5} -> {} frames (target {}) after {} iterations",
                result.optimal_threshold, result.frame_count, target, result.iterations,
            )
            .yellow()
        );
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Metadata { input, json } => {
            let source = VideoSource::open(&input)?;
            let metadata = source.metadata();
            if json {
                let payload = json!({
                    "width": metadata.width,
                    "height": metadata.height,
                    "fps": metadata.frames_per_second,
                    "frame_count": metadata.frame_count,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "codec": metadata.codec,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "Video: {}x{} @ {:.2} fps [{}]",
                    metadata.width, metadata.height, metadata.frames_per_second, metadata.codec,
                );
                println!("Duration: {:?}", metadata.duration);
                println!("Frames: ~{}", metadata.frame_count);
            }
        }
        Commands::Calibrate {
            input,
            target,
            tolerance,
            max_iterations,
            policy,
            json,
        } => {
            let (options, bar) =
                calibration_options(&cli.global, &policy, tolerance, max_iterations)?;
            let result = distill::infer_threshold(&input, target, &options)?;
            if let Some(bar) = bar {
                bar.finish();
            }

            if cli.global.verbose {
                for (step_number, step) in result.search_path.iter().enumerate() {
                    eprintln!(
                        "  iteration {}: threshold {:.5} -> {} frames",
                        step_number + 1,
                        step.threshold,
                        step.frame_count,
                    );
                }
            }

            print_inference_result(&result, target, json);
        }
        Commands::Extract {
            input,
            out,
            threshold,
            ext,
            policy,
            all_frames,
            buffer_size,
        } => {
            ensure_writable_dir(&out, cli.global.overwrite)?;

            let policy = parse_policy(&policy).ok_or(format!("unsupported --policy: {policy}"))?;
            let format =
                parse_output_format(&ext).ok_or(format!("unsupported --ext: {ext}"))?;

            let mut options = ExtractOptions::new()
                .with_policy(policy)
                .with_detect_keyframes(!all_frames)
                .with_output_format(format)
                .with_buffer_size(buffer_size);

            let mut bar = None;
            if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new("extracting")?);
                options = options.with_progress(progress.clone());
                bar = Some(progress);
            }

            let files = distill::extract_keyframes(&input, &out, threshold, &options)?;
            if let Some(bar) = bar {
                bar.finish();
            }

            if cli.global.verbose {
                for file in &files {
                    eprintln!("wrote {}", file.display());
                }
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Extracted {} keyframe(s) to {}", files.len(), out.display()).green()
            );
        }
        Commands::Auto {
            input,
            out,
            target,
            tolerance,
            ext,
            policy,
        } => {
            ensure_writable_dir(&out, cli.global.overwrite)?;
            let format =
                parse_output_format(&ext).ok_or(format!("unsupported --ext: {ext}"))?;

            let (options, bar) = calibration_options(
                &cli.global,
                &policy,
                tolerance,
                distill::DEFAULT_MAX_ITERATIONS,
            )?;
            let result = distill::infer_threshold(&input, target, &options)?;
            if let Some(bar) = bar {
                bar.finish();
            }
            print_inference_result(&result, target, false);

            // Extract with the policy the threshold was calibrated against so
            // the calibrated count transfers exactly.
            let mut extract_options = ExtractOptions::new()
                .with_policy(options.policy)
                .with_output_format(format);

            let mut bar = None;
            if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new("extracting")?);
                extract_options = extract_options.with_progress(progress.clone());
                bar = Some(progress);
            }

            let files =
                distill::extract_keyframes(&input, &out, result.optimal_threshold, &extract_options)?;
            if let Some(bar) = bar {
                bar.finish();
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Extracted {} keyframe(s) to {}", files.len(), out.display()).green()
            );
        }
        Commands::Sweep {
            input,
            thresholds,
            no_cache,
            json,
        } => {
            if thresholds.is_empty() {
                return Err("--thresholds requires at least one value".into());
            }

            let options = ExtractOptions::new().with_enable_cache(!no_cache);
            let counts = distill::sweep_thresholds(&input, &thresholds, &options)?;

            if json {
                let payload: Vec<_> = counts
                    .iter()
                    .map(|(threshold, count)| {
                        json!({ "threshold": threshold, "frame_count": count })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for (threshold, count) in counts {
                    println!("threshold {threshold:.5} -> {count} keyframes");
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "distill", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
