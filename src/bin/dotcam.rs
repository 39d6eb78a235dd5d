use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dotcam", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grab one frame, stylize it, and write a PNG.
    Frame(FrameArgs),
    /// Record a stylized MP4 (requires `ffmpeg` on PATH).
    Record(RecordArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Input video file to stylize.
    #[arg(long = "in", conflicts_with = "camera")]
    in_path: Option<PathBuf>,

    /// Camera index to capture from (requires the `camera` build feature).
    #[arg(long)]
    camera: Option<u32>,

    /// Canvas width in pixels.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Canvas height in pixels.
    #[arg(long, default_value_t = 480)]
    height: u32,
}

#[derive(Args, Debug)]
struct StyleArgs {
    /// Dot diameter in canvas pixels.
    #[arg(long, default_value_t = 3)]
    pixel_size: u32,

    /// Blank spacing between dots in canvas pixels.
    #[arg(long, default_value_t = 3)]
    gap_size: u32,

    /// Contrast multiplier around the 128 midpoint.
    #[arg(long, default_value_t = 1.0)]
    contrast: f32,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    style: StyleArgs,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RecordArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    style: StyleArgs,

    /// Output MP4 path.
    #[arg(long, default_value = dotcam::DEFAULT_RECORDING_FILENAME)]
    out: PathBuf,

    /// Capture frame rate.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Recording duration in seconds (camera sources; file sources stop at
    /// end of stream if that comes first).
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Transcode file sources without real-time pacing.
    #[arg(long)]
    no_pacing: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Record(args) => cmd_record(args),
    }
}

fn style_config(args: &StyleArgs) -> anyhow::Result<dotcam::StyleConfig> {
    let style = dotcam::StyleConfig {
        pixel_size: args.pixel_size,
        gap_size: args.gap_size,
        contrast_factor: args.contrast,
    };
    style.validate()?;
    Ok(style)
}

fn open_source(
    args: &SourceArgs,
    fps: dotcam::Fps,
) -> anyhow::Result<Box<dyn dotcam::FrameSource>> {
    let canvas = dotcam::Canvas::new(args.width, args.height)?;

    if let Some(index) = args.camera {
        return open_camera(index, canvas);
    }

    let Some(in_path) = args.in_path.as_ref() else {
        anyhow::bail!("no source given: pass --in <video> or --camera <index>");
    };
    Ok(Box::new(dotcam::VideoFileSource::open(
        in_path, canvas, fps,
    )?))
}

#[cfg(feature = "camera")]
fn open_camera(index: u32, canvas: dotcam::Canvas) -> anyhow::Result<Box<dyn dotcam::FrameSource>> {
    Ok(Box::new(dotcam::CameraSource::open(index, canvas)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(
    _index: u32,
    _canvas: dotcam::Canvas,
) -> anyhow::Result<Box<dyn dotcam::FrameSource>> {
    anyhow::bail!("camera capture requires building with the 'camera' feature")
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let style = style_config(&args.style)?;
    let mut source = open_source(&args.source, dotcam::Fps::standard())?;

    let frame = dotcam::grab_styled_frame(
        source.as_mut(),
        &style,
        &dotcam::RenderSettings::default(),
    )?;

    if let Some(parent) = args.out.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    // Dots are opaque over an opaque clear color, so premultiplied data can be
    // written out as-is.
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .map_err(|e| anyhow::anyhow!("write png '{}': {e}", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_record(args: RecordArgs) -> anyhow::Result<()> {
    let style = style_config(&args.style)?;
    let fps = dotcam::Fps::new(args.fps, 1)?;
    let mut source = open_source(&args.source, fps)?;

    if !(args.duration.is_finite() && args.duration > 0.0) {
        anyhow::bail!("--duration must be a positive number of seconds");
    }
    let max_frames = (args.duration * fps.as_f64()).round().max(1.0) as u64;

    let opts = dotcam::SessionOpts {
        style,
        fps,
        max_frames,
        paced: !args.no_pacing,
        ..dotcam::SessionOpts::new(&args.out)
    };

    let stats = dotcam::record_session(source.as_mut(), &opts)?;
    eprintln!(
        "wrote {} ({} frames)",
        args.out.display(),
        stats.frames_recorded
    );
    Ok(())
}
