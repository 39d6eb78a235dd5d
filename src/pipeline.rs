use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use crate::{
    capture::FrameSource,
    core::{Canvas, Fps, FrameRGBA},
    encode_ffmpeg::Mp4Settings,
    error::{DotcamError, DotcamResult},
    recorder::Recorder,
    render_cpu::{CpuRenderer, RenderSettings},
    sampler::sample_frame,
    style::StyleConfig,
};

/// Sample + render one frame: the whole per-tick transform.
pub fn stylize_frame(
    frame: &FrameRGBA,
    style: &StyleConfig,
    renderer: &mut CpuRenderer,
) -> DotcamResult<FrameRGBA> {
    if frame.canvas() != renderer.canvas() {
        return Err(DotcamError::validation(format!(
            "source frame {}x{} does not match renderer canvas {}x{}",
            frame.width,
            frame.height,
            renderer.canvas().width,
            renderer.canvas().height
        )));
    }
    let raster = sample_frame(frame, style)?;
    renderer.render(&raster, style)
}

/// Fixed-interval pacing for the capture loop. No adaptive tuning: if a tick
/// runs long the clock resynchronizes rather than bursting to catch up.
pub struct FrameClock {
    interval: Duration,
    next: Instant,
}

impl FrameClock {
    pub fn new(fps: Fps) -> Self {
        let interval = Duration::from_secs_f64(fps.frame_duration_secs());
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    /// Sleep until the next tick boundary.
    pub fn tick(&mut self) {
        let now = Instant::now();
        if now < self.next {
            std::thread::sleep(self.next - now);
            self.next += self.interval;
        } else {
            self.next = now + self.interval;
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionOpts {
    pub style: StyleConfig,
    pub settings: RenderSettings,
    pub fps: Fps,
    /// Stop after this many stylized frames (or at end of stream).
    pub max_frames: u64,
    /// When false, run the loop flat out (tests, file transcodes).
    pub paced: bool,
    pub out_path: PathBuf,
    pub bg_rgba: [u8; 4],
    pub overwrite: bool,
}

impl SessionOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            style: StyleConfig::default(),
            settings: RenderSettings::default(),
            fps: Fps::standard(),
            max_frames: u64::MAX,
            paced: true,
            out_path: out_path.into(),
            bg_rgba: [0, 0, 0, 255],
            overwrite: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_captured: u64,
    pub frames_recorded: u64,
}

/// Run the capture loop: per tick, sample then render to completion, feeding
/// the recorder; then finalize the clip into one MP4.
pub fn record_session(
    source: &mut dyn FrameSource,
    opts: &SessionOpts,
) -> DotcamResult<SessionStats> {
    opts.style.validate()?;
    if opts.max_frames == 0 {
        return Err(DotcamError::validation("session max_frames must be >= 1"));
    }

    let canvas = source.canvas();

    // Fail before any frame is captured if the session could never finalize:
    // the encoder constraints are known up front.
    let fps = opts.fps.as_integer().ok_or_else(|| {
        DotcamError::validation("mp4 encoding currently requires integer fps (fps.den == 1)")
    })?;
    Mp4Settings {
        canvas,
        fps,
        out_path: opts.out_path.clone(),
        bg_rgba: opts.bg_rgba,
        overwrite: opts.overwrite,
    }
    .validate()?;

    let mut renderer = CpuRenderer::new(canvas, opts.settings.clone())?;
    let mut recorder = Recorder::new(canvas, opts.fps);
    let mut clock = opts.paced.then(|| FrameClock::new(opts.fps));
    let mut stats = SessionStats::default();

    recorder.start();
    while stats.frames_captured < opts.max_frames {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        stats.frames_captured += 1;

        let styled = stylize_frame(&frame, &opts.style, &mut renderer)?;
        recorder.push_frame(&styled)?;
        stats.frames_recorded += 1;

        if let Some(clock) = clock.as_mut() {
            clock.tick();
        }
    }

    let clip = recorder.stop()?;
    tracing::info!(
        frames = clip.frame_count,
        out = %opts.out_path.display(),
        "finalizing recording"
    );
    clip.write_mp4(&opts.out_path, opts.bg_rgba, opts.overwrite)?;
    Ok(stats)
}

/// Grab and stylize a single frame (the `frame` CLI command).
pub fn grab_styled_frame(
    source: &mut dyn FrameSource,
    style: &StyleConfig,
    settings: &RenderSettings,
) -> DotcamResult<FrameRGBA> {
    let canvas: Canvas = source.canvas();
    let mut renderer = CpuRenderer::new(canvas, settings.clone())?;
    let frame = source
        .next_frame()?
        .ok_or_else(|| DotcamError::capture("source produced no frames"))?;
    stylize_frame(&frame, style, &mut renderer)
}
