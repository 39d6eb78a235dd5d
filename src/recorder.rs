use std::path::Path;

use crate::{
    core::{Canvas, Fps, FrameRGBA},
    encode_ffmpeg::{Mp4Settings, Mp4Writer},
    error::{DotcamError, DotcamResult},
};

/// Fixed output filename when the caller does not pick one.
pub const DEFAULT_RECORDING_FILENAME: &str = "dotcam-recording.mp4";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// One finished start-to-stop capture: the concatenated chunk sequence.
#[derive(Clone, Debug)]
pub struct RecordingClip {
    pub canvas: Canvas,
    pub fps: Fps,
    pub frame_count: u64,
    pub premultiplied: bool,
    /// All chunks concatenated in arrival order (raw RGBA8 frame payloads).
    pub data: Vec<u8>,
}

impl RecordingClip {
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Encode the clip into a single MP4 file via the system ffmpeg.
    pub fn write_mp4(
        &self,
        out_path: impl AsRef<Path>,
        bg_rgba: [u8; 4],
        overwrite: bool,
    ) -> DotcamResult<()> {
        if self.is_empty() {
            return Err(DotcamError::validation(
                "recording clip has no frames to encode",
            ));
        }
        let fps = self.fps.as_integer().ok_or_else(|| {
            DotcamError::validation("mp4 encoding currently requires integer fps (fps.den == 1)")
        })?;

        let settings = Mp4Settings {
            canvas: self.canvas,
            fps,
            out_path: out_path.as_ref().to_path_buf(),
            bg_rgba,
            overwrite,
        };

        let frame_len = self.canvas.byte_len_rgba8();
        let mut writer = Mp4Writer::create(settings)?;
        for payload in self.data.chunks_exact(frame_len) {
            let frame = FrameRGBA {
                width: self.canvas.width,
                height: self.canvas.height,
                data: payload.to_vec(),
                premultiplied: self.premultiplied,
            };
            writer.write_frame(&frame)?;
        }
        writer.finish()
    }
}

/// Two-state recording controller.
///
/// `start` resets the chunk sequence and begins accumulating; `stop`
/// concatenates everything buffered since the last start into one
/// [`RecordingClip`]. The chunk sequence is only non-empty between a start and
/// the next stop.
pub struct Recorder {
    canvas: Canvas,
    fps: Fps,
    state: RecorderState,
    chunks: Vec<Vec<u8>>,
    // Latched from the first pushed frame of a session; all later frames
    // must agree.
    premultiplied: Option<bool>,
}

impl Recorder {
    pub fn new(canvas: Canvas, fps: Fps) -> Self {
        Self {
            canvas,
            fps,
            state: RecorderState::Idle,
            chunks: Vec::new(),
            premultiplied: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Begin a recording session. Any chunks buffered by a previous start that
    /// was never stopped are discarded.
    pub fn start(&mut self) {
        if !self.chunks.is_empty() {
            tracing::warn!(
                discarded = self.chunks.len(),
                "recorder restarted without stop; dropping buffered chunks"
            );
        }
        self.chunks.clear();
        self.premultiplied = None;
        self.state = RecorderState::Recording;
        tracing::debug!("recording started");
    }

    /// Append one stylized frame as a chunk. Errors while idle.
    pub fn push_frame(&mut self, frame: &FrameRGBA) -> DotcamResult<()> {
        if self.state != RecorderState::Recording {
            return Err(DotcamError::validation(
                "recorder is idle; call start before push_frame",
            ));
        }
        if frame.width != self.canvas.width || frame.height != self.canvas.height {
            return Err(DotcamError::validation(format!(
                "recorded frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.canvas.width, self.canvas.height
            )));
        }
        frame.validate()?;

        match self.premultiplied {
            None => self.premultiplied = Some(frame.premultiplied),
            Some(mode) if mode != frame.premultiplied => {
                return Err(DotcamError::validation(
                    "recorded frames must share one alpha mode within a session",
                ));
            }
            Some(_) => {}
        }
        self.chunks.push(frame.data.clone());
        Ok(())
    }

    /// Finalize the session: concatenate all chunks into one clip and return
    /// to idle. Errors while idle.
    pub fn stop(&mut self) -> DotcamResult<RecordingClip> {
        if self.state != RecorderState::Recording {
            return Err(DotcamError::validation(
                "recorder is idle; nothing to stop",
            ));
        }

        let frame_count = self.chunks.len() as u64;
        let mut data = Vec::with_capacity(frame_count as usize * self.canvas.byte_len_rgba8());
        for chunk in self.chunks.drain(..) {
            data.extend_from_slice(&chunk);
        }
        self.state = RecorderState::Idle;
        tracing::debug!(frames = frame_count, "recording stopped");

        Ok(RecordingClip {
            canvas: self.canvas,
            fps: self.fps,
            frame_count,
            premultiplied: self.premultiplied.take().unwrap_or(true),
            data,
        })
    }
}
