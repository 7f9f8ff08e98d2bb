use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use env_logger::Env;
use forgery_score::{
    ChannelReduction, DEFAULT_BATCH_SIZE, DEFAULT_FRAMES_PER_CLIP, Device, FfmpegLogLevel,
    ForgeryScorer, OnnxClassifier, OperationType, ProgressCallback, ProgressInfo, ScoreOptions,
    VideoMetadata,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  forgery-score score input.mp4 --weights models/weights/lipforensics_ff.onnx\n  forgery-score score input.mp4 --device cuda:0 --progress --json\n  forgery-score probe input.mp4 --json\n  forgery-score completions zsh > _forgery-score";

const DEFAULT_WEIGHTS: &str = "models/weights/lipforensics_ff.onnx";

#[derive(Debug, Parser)]
#[command(
    name = "forgery-score",
    version,
    about = "Score videos for facial forgery with a pretrained classifier",
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

    /// Show a progress bar while decoding and scoring.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<FfmpegLogLevel>,

    /// Worker threads for frame preprocessing (requires the `rayon` feature).
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute the forgery score of a video.
    #[command(
        after_help = "Examples:\n  forgery-score score input.mp4\n  forgery-score score input.mp4 --weights model.onnx --batch-size 16 --channels planes"
    )]
    Score {
        /// Input video path.
        input: PathBuf,

        /// Pretrained classifier exported to ONNX.
        #[arg(long, default_value = DEFAULT_WEIGHTS)]
        weights: PathBuf,

        /// Sequence-length hint passed to the classifier for every clip.
        #[arg(long, default_value_t = DEFAULT_FRAMES_PER_CLIP)]
        frames_per_clip: usize,

        /// Clips per classifier call.
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Compute device (cpu, cuda, cuda:N).
        #[arg(long, default_value = "cpu")]
        device: String,

        /// Channel reduction before normalization (luma, planes).
        #[arg(long, default_value = "luma")]
        channels: ChannelReduction,

        /// Output the result as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print video metadata.
    #[command(visible_alias = "info")]
    Probe {
        /// Input video path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Renders decode and inference progress on one terminal bar.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg:>9} {bar:40.cyan/blue} {pos}/{len} ({eta})",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let stage = match info.operation {
            OperationType::Decoding => "decoding",
            OperationType::Inference => "scoring",
            _ => "working",
        };
        if self.bar.message() != stage {
            self.bar.set_message(stage);
            self.bar.reset();
        }
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
    }
}

impl Drop for BarProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

fn metadata_json(metadata: &VideoMetadata) -> serde_json::Value {
    json!({
        "width": metadata.width,
        "height": metadata.height,
        "frames_per_second": metadata.frames_per_second,
        "frame_count": metadata.frame_count,
        "duration_seconds": metadata.duration.as_secs_f64(),
        "codec": metadata.codec,
        "format": metadata.format,
    })
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    if let Some(level) = global.log_level {
        forgery_score::set_ffmpeg_log_level(level);
    }

    if let Some(threads) = global.threads.filter(|&threads| threads > 0) {
        #[cfg(feature = "rayon")]
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;

        #[cfg(not(feature = "rayon"))]
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("--threads {threads} ignored; build with the `rayon` feature").yellow()
        );
    }

    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Score {
            input,
            weights,
            frames_per_clip,
            batch_size,
            device,
            channels,
            json,
        } => {
            let mut options = ScoreOptions::new()
                .with_frames_per_clip(frames_per_clip)
                .with_batch_size(batch_size)
                .with_channel_reduction(channels)
                .with_device(device.parse::<Device>()?);
            if cli.global.progress {
                options = options.with_progress(Arc::new(BarProgress::new()?));
            }
            options.validate()?;

            let classifier = OnnxClassifier::from_options(&weights, &options)?;
            let device = classifier.device();
            let mut scorer = ForgeryScorer::new(classifier, options)?;
            let report = scorer.score_video(&input)?;

            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "score": report.score.value(),
                    "frame_count": report.frame_count,
                    "batch_count": report.batch_count,
                    "clip_shape": report.clip_shape,
                    "device": device.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "Forgery score for {}: {}",
                    input.display(),
                    report.score.to_string().bold()
                );
            }
        }
        Commands::Probe { input, json } => {
            let metadata = forgery_score::probe(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&metadata_json(&metadata))?);
            } else {
                println!("{} {}", "File:".bold(), input.display());
                println!("{} {}", "Format:".bold(), metadata.format);
                println!("{} {}", "Codec:".bold(), metadata.codec);
                println!(
                    "{} {}x{} @ {:.3} fps",
                    "Video:".bold(),
                    metadata.width,
                    metadata.height,
                    metadata.frames_per_second
                );
                println!(
                    "{} ~{} frames, {:.2}s",
                    "Length:".bold(),
                    metadata.frame_count,
                    metadata.duration.as_secs_f64()
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "forgery-score", &mut std::io::stdout());
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
