use std::{
    io::Write as _,
    path::PathBuf,
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    core::{Canvas, FrameRGBA},
    error::{DotcamError, DotcamResult},
};

/// Settings for one MP4 output file.
#[derive(Clone, Debug)]
pub struct Mp4Settings {
    pub canvas: Canvas,
    pub fps: u32,
    pub out_path: PathBuf,
    /// Opaque background that translucent pixels are flattened over.
    pub bg_rgba: [u8; 4],
    pub overwrite: bool,
}

impl Mp4Settings {
    /// Reject canvases the encoder cannot accept. Callers that run a capture
    /// loop should call this before capturing anything.
    pub fn validate(&self) -> DotcamResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(DotcamError::validation("mp4 canvas must be non-zero"));
        }
        if self.fps == 0 {
            return Err(DotcamError::validation("mp4 fps must be at least 1"));
        }
        // yuv420p chroma subsampling halves both axes.
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            return Err(DotcamError::validation(format!(
                "mp4 canvas must have even dimensions, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        Ok(())
    }
}

pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Streams flattened RGBA frames into a spawned `ffmpeg`, which containerizes
/// them as H.264/yuv420p MP4 with `+faststart`.
pub struct Mp4Writer {
    settings: Mp4Settings,
    child: Child,
    stdin: Option<ChildStdin>,
    flat: Vec<u8>,
}

impl Mp4Writer {
    pub fn create(settings: Mp4Settings) -> DotcamResult<Self> {
        settings.validate()?;

        if settings.out_path.exists() && !settings.overwrite {
            return Err(DotcamError::validation(format!(
                "refusing to overwrite existing '{}'",
                settings.out_path.display()
            )));
        }
        if let Some(dir) = settings.out_path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(|e| {
                DotcamError::encode(format!(
                    "cannot create output directory '{}': {e}",
                    dir.display()
                ))
            })?;
        }
        if !ffmpeg_available() {
            return Err(DotcamError::encode("mp4 output needs ffmpeg on PATH"));
        }

        let geometry = format!("{}x{}", settings.canvas.width, settings.canvas.height);
        let rate = settings.fps.to_string();
        let mut child = Command::new("ffmpeg")
            .arg(if settings.overwrite { "-y" } else { "-n" })
            .args(["-loglevel", "error"])
            // Input: raw RGBA frames on stdin at the session geometry/rate.
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .args(["-s", &geometry, "-r", &rate, "-i", "pipe:0"])
            // Output: video-only H.264, faststart so the file streams.
            .args(["-an", "-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .args(["-movflags", "+faststart"])
            .arg(&settings.out_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DotcamError::encode(format!("could not launch ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DotcamError::encode("ffmpeg child has no stdin pipe"))?;

        tracing::debug!(
            out = %settings.out_path.display(),
            fps = settings.fps,
            "ffmpeg encoder started"
        );

        Ok(Self {
            flat: vec![0u8; settings.canvas.byte_len_rgba8()],
            settings,
            child,
            stdin: Some(stdin),
        })
    }

    pub fn write_frame(&mut self, frame: &FrameRGBA) -> DotcamResult<()> {
        if frame.canvas() != self.settings.canvas {
            return Err(DotcamError::validation(format!(
                "encoder expects {}x{} frames, got {}x{}",
                self.settings.canvas.width,
                self.settings.canvas.height,
                frame.width,
                frame.height
            )));
        }
        frame.validate()?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(DotcamError::encode("mp4 writer is already finished"));
        };

        flatten_over(&mut self.flat, frame, self.settings.bg_rgba);
        stdin
            .write_all(&self.flat)
            .map_err(|e| DotcamError::encode(format!("ffmpeg rejected frame data: {e}")))
    }

    /// Close the pipe so ffmpeg finalizes the container, then reap it.
    pub fn finish(mut self) -> DotcamResult<()> {
        self.stdin = None;

        let out = self
            .child
            .wait_with_output()
            .map_err(|e| DotcamError::encode(format!("ffmpeg did not exit cleanly: {e}")))?;
        if !out.status.success() {
            return Err(DotcamError::encode(format!(
                "ffmpeg failed ({}): {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Flatten one frame over an opaque background into `dst`, honoring the
/// frame's alpha mode. Fully opaque pixels (the common case for dot-grid
/// output) are copied through untouched.
fn flatten_over(dst: &mut [u8], frame: &FrameRGBA, bg: [u8; 4]) {
    for (out, px) in dst.chunks_exact_mut(4).zip(frame.data.chunks_exact(4)) {
        let alpha = u32::from(px[3]);
        if alpha == 255 {
            out.copy_from_slice(px);
            continue;
        }

        let remainder = 255 - alpha;
        for c in 0..3 {
            let fg = if frame.premultiplied {
                u32::from(px[c])
            } else {
                div255(u32::from(px[c]) * alpha)
            };
            out[c] = (fg + div255(u32::from(bg[c]) * remainder)).min(255) as u8;
        }
        out[3] = 255;
    }
}

fn div255(v: u32) -> u32 {
    (v + 127) / 255
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(width: u32, height: u32, fps: u32) -> Mp4Settings {
        Mp4Settings {
            canvas: Canvas { width, height },
            fps,
            out_path: PathBuf::from("out/clip.mp4"),
            bg_rgba: [0, 0, 0, 255],
            overwrite: true,
        }
    }

    fn flat_one(px: [u8; 4], premultiplied: bool, bg: [u8; 4]) -> [u8; 4] {
        let frame = FrameRGBA {
            width: 1,
            height: 1,
            data: px.to_vec(),
            premultiplied,
        };
        let mut dst = [0u8; 4];
        flatten_over(&mut dst, &frame, bg);
        dst
    }

    #[test]
    fn settings_reject_unencodable_canvases() {
        assert!(settings(0, 480, 30).validate().is_err());
        assert!(settings(63, 480, 30).validate().is_err());
        assert!(settings(640, 479, 30).validate().is_err());
        assert!(settings(640, 480, 0).validate().is_err());
        assert!(settings(640, 480, 30).validate().is_ok());
    }

    #[test]
    fn opaque_pixels_pass_through_unchanged() {
        assert_eq!(
            flat_one([12, 200, 7, 255], true, [90, 90, 90, 255]),
            [12, 200, 7, 255]
        );
    }

    #[test]
    fn half_alpha_premul_red_flattens_over_black() {
        // Premultiplied: rgb already carries the alpha weight.
        assert_eq!(
            flat_one([128, 0, 0, 128], true, [0, 0, 0, 255]),
            [128, 0, 0, 255]
        );
    }

    #[test]
    fn half_alpha_straight_red_flattens_over_black() {
        assert_eq!(
            flat_one([255, 0, 0, 128], false, [0, 0, 0, 255]),
            [128, 0, 0, 255]
        );
    }

    #[test]
    fn transparent_pixel_takes_background() {
        assert_eq!(
            flat_one([0, 0, 0, 0], true, [30, 40, 50, 255]),
            [30, 40, 50, 255]
        );
    }
}
