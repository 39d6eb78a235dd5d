#![forbid(unsafe_code)]

pub mod capture;
pub mod core;
pub mod encode_ffmpeg;
pub mod error;
pub mod pipeline;
pub mod recorder;
pub mod render_cpu;
pub mod sampler;
pub mod style;

pub use capture::{FrameSource, VideoFileSource, VideoSourceInfo, probe_video};
pub use self::core::{Canvas, Fps, FrameRGBA};
pub use encode_ffmpeg::{Mp4Settings, Mp4Writer, ffmpeg_available};
pub use error::{DotcamError, DotcamResult};
pub use pipeline::{
    FrameClock, SessionOpts, SessionStats, grab_styled_frame, record_session, stylize_frame,
};
pub use recorder::{DEFAULT_RECORDING_FILENAME, Recorder, RecorderState, RecordingClip};
pub use render_cpu::{CpuRenderer, RenderSettings};
pub use sampler::sample_frame;
pub use style::{RasterBuffer, StyleConfig, adjust_contrast, to_grayscale};

#[cfg(feature = "camera")]
pub use capture::CameraSource;
