use std::{
    io::Read as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, Stdio},
};

use crate::{
    core::{Canvas, Fps, FrameRGBA},
    error::{DotcamError, DotcamResult},
};

/// A live stream of full-resolution frames at a fixed canvas size.
///
/// `next_frame` returns `Ok(None)` on a clean end of stream (finite sources);
/// camera sources never end on their own.
pub trait FrameSource {
    fn canvas(&self) -> Canvas;
    fn next_frame(&mut self) -> DotcamResult<Option<FrameRGBA>>;
}

#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub duration_sec: f64,
}

/// Ask ffprobe for the geometry, frame rate and duration of the first video
/// stream in a file.
pub fn probe_video(source_path: &Path) -> DotcamResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct Probe {
        #[serde(default)]
        streams: Vec<Stream>,
        format: Option<Format>,
    }
    #[derive(serde::Deserialize)]
    struct Stream {
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct Format {
        duration: Option<String>,
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| DotcamError::capture(format!("could not launch ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(DotcamError::capture(format!(
            "ffprobe could not read '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let probe: Probe = serde_json::from_slice(&out.stdout)
        .map_err(|e| DotcamError::capture(format!("unexpected ffprobe output: {e}")))?;
    let stream = probe.streams.into_iter().next().ok_or_else(|| {
        DotcamError::capture(format!("'{}' has no video stream", source_path.display()))
    })?;

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(DotcamError::capture("video stream is missing its geometry"));
    };
    let frame_rate = stream
        .r_frame_rate
        .as_deref()
        .and_then(frame_rate_to_f64)
        .ok_or_else(|| DotcamError::capture("video stream reports no usable frame rate"))?;
    let duration_sec = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse().ok())
        .unwrap_or(0.0);

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        frame_rate,
        duration_sec,
    })
}

/// ffprobe reports rates as "num/den" ratios.
fn frame_rate_to_f64(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    if !num.is_finite() || !(den > 0.0) {
        return None;
    }
    Some(num / den)
}

/// Sequential frame source over a video file, decoded by a spawned system
/// `ffmpeg` scaled to the requested canvas and resampled to the target fps.
pub struct VideoFileSource {
    info: VideoSourceInfo,
    canvas: Canvas,
    child: Child,
    stdout: Option<ChildStdout>,
    frame_len: usize,
}

impl VideoFileSource {
    pub fn open(source_path: &Path, canvas: Canvas, fps: Fps) -> DotcamResult<Self> {
        let info = probe_video(source_path)?;

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(source_path)
            .args([
                "-vf",
                &format!("scale={}:{}", canvas.width, canvas.height),
                "-r",
                &format!("{}/{}", fps.num, fps.den),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                DotcamError::capture(format!("failed to spawn ffmpeg for video decode: {e}"))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DotcamError::capture("failed to open ffmpeg stdout (unexpected)"))?;

        tracing::debug!(
            source = %source_path.display(),
            source_fps = info.frame_rate,
            "opened video file source"
        );

        Ok(Self {
            info,
            canvas,
            child,
            stdout: Some(stdout),
            frame_len: canvas.byte_len_rgba8(),
        })
    }

    pub fn info(&self) -> &VideoSourceInfo {
        &self.info
    }
}

impl FrameSource for VideoFileSource {
    fn canvas(&self) -> Canvas {
        self.canvas
    }

    fn next_frame(&mut self) -> DotcamResult<Option<FrameRGBA>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut data = vec![0u8; self.frame_len];
        let mut filled = 0usize;
        while filled < self.frame_len {
            let n = stdout.read(&mut data[filled..]).map_err(|e| {
                DotcamError::capture(format!("failed to read decoded frame from ffmpeg: {e}"))
            })?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            // Clean end of stream.
            self.stdout = None;
            return Ok(None);
        }
        if filled < self.frame_len {
            return Err(DotcamError::capture(format!(
                "truncated frame from ffmpeg: got {filled} of {} bytes",
                self.frame_len
            )));
        }

        Ok(Some(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data,
            premultiplied: false,
        }))
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        drop(self.stdout.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(feature = "camera")]
pub use self::camera::CameraSource;

#[cfg(feature = "camera")]
mod camera {
    use nokhwa::{
        Camera,
        pixel_format::RgbFormat,
        utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    };

    use super::*;

    /// Live camera source via `nokhwa`, acquired once at startup.
    ///
    /// Acquisition failure is logged and surfaced as an error; there is no
    /// retry.
    pub struct CameraSource {
        camera: Camera,
        canvas: Canvas,
    }

    impl CameraSource {
        pub fn open(index: u32, canvas: Canvas) -> DotcamResult<Self> {
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

            let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
                tracing::error!(index, error = %e, "camera acquisition failed");
                DotcamError::capture(format!("failed to open camera {index}: {e}"))
            })?;

            camera.open_stream().map_err(|e| {
                tracing::error!(index, error = %e, "camera stream start failed");
                DotcamError::capture(format!("failed to start camera {index} stream: {e}"))
            })?;

            tracing::debug!(index, "opened camera source");
            Ok(Self { camera, canvas })
        }
    }

    impl FrameSource for CameraSource {
        fn canvas(&self) -> Canvas {
            self.canvas
        }

        fn next_frame(&mut self) -> DotcamResult<Option<FrameRGBA>> {
            let frame = self
                .camera
                .frame()
                .map_err(|e| DotcamError::capture(format!("camera frame grab failed: {e}")))?;
            let decoded = frame
                .decode_image::<RgbFormat>()
                .map_err(|e| DotcamError::capture(format!("camera frame decode failed: {e}")))?;

            let resized = if decoded.width() == self.canvas.width
                && decoded.height() == self.canvas.height
            {
                decoded
            } else {
                image::imageops::resize(
                    &decoded,
                    self.canvas.width,
                    self.canvas.height,
                    image::imageops::FilterType::Triangle,
                )
            };

            let mut data = Vec::with_capacity(self.canvas.byte_len_rgba8());
            for px in resized.pixels() {
                data.extend_from_slice(&[px.0[0], px.0[1], px.0[2], 255]);
            }

            Ok(Some(FrameRGBA {
                width: self.canvas.width,
                height: self.canvas.height,
                data,
                premultiplied: false,
            }))
        }
    }
}
