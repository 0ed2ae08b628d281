//! ffmpeg and ffprobe invocations used to assemble videos.

use crate::error::CapabilityError;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

type ToolResult<T> = std::result::Result<T, CapabilityError>;

/// Frame rate of the silent video.
pub const FPS: u32 = 24;

/// Pattern the frame files are written with, relative to the frame directory.
pub const FRAME_PATTERN: &str = "frame_%05d.png";

/// File name for the frame with the given 0-based position.
pub fn frame_file_name(position: u32) -> String {
    format!("frame_{:05}.png", position)
}

/// How many times a video must be repeated to cover the audio.
pub fn loop_count(audio_secs: f64, video_secs: f64) -> u32 {
    if video_secs <= 0.0 || audio_secs <= 0.0 {
        return 1;
    }
    ((audio_secs / video_secs).ceil() as u32).max(1)
}

/// Concat demuxer list repeating `video` `loops` times.
///
/// The concat demuxer resolves entries against the list's own directory, so
/// only the file name is written and the list must sit beside the video.
pub fn concat_list(video: &Path, loops: u32) -> String {
    let name = video
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| video.to_string_lossy().into_owned());
    let escaped = name.replace('\'', "'\\''");
    (0..loops.max(1))
        .map(|_| format!("file '{}'\n", escaped))
        .collect()
}

fn args(items: &[&dyn AsRef<OsStr>]) -> Vec<OsString> {
    items.iter().map(|a| a.as_ref().to_os_string()).collect()
}

/// Arguments turning numbered PNG frames into an H.264 video at [`FPS`].
pub fn encode_args(frames_dir: &Path, dest: &Path) -> Vec<OsString> {
    let fps = FPS.to_string();
    let pattern = frames_dir.join(FRAME_PATTERN);
    args(&[
        &"-y", &"-loglevel", &"error",
        &"-framerate", &fps,
        &"-i", &pattern,
        &"-c:v", &"libx264",
        &"-pix_fmt", &"yuv420p",
        &dest,
    ])
}

/// Arguments repeating a video through the concat demuxer without re-encoding.
pub fn concat_args(list: &Path, dest: &Path) -> Vec<OsString> {
    args(&[
        &"-y", &"-loglevel", &"error",
        &"-f", &"concat",
        &"-safe", &"0",
        &"-i", &list,
        &"-c", &"copy",
        &dest,
    ])
}

/// Arguments combining the first video stream with the first audio stream,
/// cut to exactly `audio_secs`.
pub fn mux_args(video: &Path, audio: &Path, audio_secs: f64, dest: &Path) -> Vec<OsString> {
    let length = format!("{:.3}", audio_secs);
    args(&[
        &"-y", &"-loglevel", &"error",
        &"-i", &video,
        &"-i", &audio,
        &"-map", &"0:v:0",
        &"-map", &"1:a:0",
        &"-c:v", &"libx264",
        &"-pix_fmt", &"yuv420p",
        &"-c:a", &"aac",
        &"-t", &length,
        &dest,
    ])
}

/// Arguments asking ffprobe for the container format as JSON.
pub fn duration_args(path: &Path) -> Vec<OsString> {
    args(&[&"-v", &"quiet", &"-print_format", &"json", &"-show_format", &path])
}

/// A command with piped output that is killed if its future is dropped.
fn command(tool: &str) -> Command {
    let mut cmd = Command::new(tool);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Run a tool with the given arguments, mapping spawn and exit failures.
async fn execute(tool: &'static str, args: Vec<OsString>) -> ToolResult<Output> {
    let mut cmd = command(tool);
    cmd.args(args);
    debug!("Running {:?}", cmd.as_std());

    match cmd.output().await {
        Ok(out) if out.status.success() => Ok(out),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(CapabilityError::service(tool, err.trim()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CapabilityError::ToolNotFound(tool.into()))
        }
        Err(e) => Err(CapabilityError::service(tool, e)),
    }
}

/// Encode numbered PNG frames into an H.264 video at [`FPS`].
pub async fn encode_frames(frames_dir: &Path, dest: &Path) -> ToolResult<()> {
    execute("ffmpeg", encode_args(frames_dir, dest)).await?;
    Ok(())
}

/// Duration of a media file in seconds.
pub async fn media_duration(path: &Path) -> ToolResult<f64> {
    let output = execute("ffprobe", duration_args(path)).await?;

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| CapabilityError::malformed("ffprobe", "invalid JSON output"))?;

    parse_duration(&parsed)
        .ok_or_else(|| CapabilityError::malformed("ffprobe", format!("no duration for {}", path.display())))
}

fn parse_duration(report: &serde_json::Value) -> Option<f64> {
    report["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
}

/// Repeat a video using the concat demuxer without re-encoding.
pub async fn concat_copy(list: &Path, dest: &Path) -> ToolResult<()> {
    execute("ffmpeg", concat_args(list, dest)).await?;
    Ok(())
}

/// Combine a video track with speech, cut to exactly `audio_secs`.
pub async fn mux(video: &Path, audio: &Path, audio_secs: f64, dest: &Path) -> ToolResult<()> {
    execute("ffmpeg", mux_args(video, audio, audio_secs, dest)).await?;
    Ok(())
}
