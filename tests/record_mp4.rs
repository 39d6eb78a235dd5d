use std::{path::PathBuf, process::Command};

use dotcam::{Canvas, Fps, SessionOpts, StyleConfig, VideoFileSource, probe_video, record_session};

fn ffmpeg_tools_available() -> bool {
    let ffmpeg_ok = Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    let ffprobe_ok = Command::new("ffprobe")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    ffmpeg_ok && ffprobe_ok
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dotcam_{tag}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn synth_clip(path: &std::path::Path) -> anyhow::Result<()> {
    let status = Command::new("ffmpeg")
        .args([
            "-v",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            "testsrc=size=64x64:rate=30",
            "-t",
            "1",
            "-pix_fmt",
            "yuv420p",
            "-c:v",
            "libx264",
        ])
        .arg(path)
        .status()?;
    anyhow::ensure!(status.success(), "ffmpeg failed creating test clip");
    Ok(())
}

#[test]
fn file_source_records_a_playable_mp4() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not on PATH");
        return;
    }

    let dir = scratch_dir("record");
    let clip_path = dir.join("clip.mp4");
    synth_clip(&clip_path).expect("synthesize input clip");

    let canvas = Canvas::new(64, 64).unwrap();
    let fps = Fps::standard();
    let mut source = VideoFileSource::open(&clip_path, canvas, fps).expect("open video source");

    let out_path = dir.join("stylized.mp4");
    let opts = SessionOpts {
        style: StyleConfig::default(),
        fps,
        max_frames: 12,
        paced: false,
        ..SessionOpts::new(&out_path)
    };

    let stats = record_session(&mut source, &opts).expect("record session");
    assert_eq!(stats.frames_recorded, 12);
    assert!(out_path.exists());

    // The finalized file is itself a probeable video at the canvas size.
    let info = probe_video(&out_path).expect("probe stylized output");
    assert_eq!((info.width, info.height), (64, 64));
    assert!(info.duration_sec > 0.0);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn file_source_stops_cleanly_at_end_of_stream() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not on PATH");
        return;
    }

    let dir = scratch_dir("eos");
    let clip_path = dir.join("clip.mp4");
    synth_clip(&clip_path).expect("synthesize input clip");

    let canvas = Canvas::new(64, 64).unwrap();
    let fps = Fps::standard();
    let mut source = VideoFileSource::open(&clip_path, canvas, fps).expect("open video source");

    // Budget far beyond the ~30 frames in the 1s clip: the session must end at
    // the stream boundary, not error.
    let out_path = dir.join("stylized.mp4");
    let opts = SessionOpts {
        fps,
        max_frames: 10_000,
        paced: false,
        ..SessionOpts::new(&out_path)
    };

    let stats = record_session(&mut source, &opts).expect("record session");
    assert!(stats.frames_captured > 0);
    assert!(stats.frames_captured < 10_000);
    assert_eq!(stats.frames_captured, stats.frames_recorded);
    assert!(out_path.exists());

    let _ = std::fs::remove_dir_all(&dir);
}
