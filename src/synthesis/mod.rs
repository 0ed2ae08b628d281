//! Media synthesis: turn a generated script into a file on disk.
//!
//! Text is written as-is, audio goes through text-to-speech, and video runs
//! speech and frame rendering side by side before looping the silent video
//! to the length of the narration and muxing the two.

pub mod ffmpeg;

use crate::capability::{guarded, Animator, SpeechSynthesizer};
use crate::config::Settings;
use crate::error::{CapabilityError, NewsreelError, Result};
use crate::generation::GeneratedContent;
use crate::request::{MediaFormat, MediaRequest};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const NEWS_FILE: &str = "news.txt";
pub const SPEECH_FILE: &str = "speech.mp3";
pub const VIDEO_FILE: &str = "video.mp4";
pub const COMBINED_FILE: &str = "combined_video.mp4";
const LOOPED_FILE: &str = "looped_video.mp4";
const CONCAT_LIST: &str = "concat.txt";

/// A finished media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub format: MediaFormat,
}

impl MediaArtifact {
    /// Path relative to the output root, as served by the web UI.
    pub fn relative_to(&self, root: &Path) -> PathBuf {
        self.path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.path.clone())
    }
}

pub struct MediaSynthesizer {
    speech: Arc<dyn SpeechSynthesizer>,
    animator: Arc<dyn Animator>,
    output_root: PathBuf,
    unique_per_request: bool,
    frame_count: u32,
    speech_timeout: Duration,
    frame_timeout: Duration,
    encode_timeout: Duration,
}

impl MediaSynthesizer {
    pub fn new(speech: Arc<dyn SpeechSynthesizer>, animator: Arc<dyn Animator>, settings: &Settings) -> Self {
        Self {
            speech,
            animator,
            output_root: settings.output_dir(),
            unique_per_request: settings.output.unique_per_request,
            frame_count: settings.animation.max_frames.max(1),
            speech_timeout: settings.timeouts.speech(),
            frame_timeout: settings.timeouts.frame(),
            encode_timeout: settings.timeouts.encode(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Directory this run writes into, created if missing.
    async fn run_dir(&self) -> Result<PathBuf> {
        let dir = if self.unique_per_request {
            let id = uuid::Uuid::new_v4().simple().to_string();
            let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
            self.output_root.join(format!("{}-{}", stamp, &id[..8]))
        } else {
            self.output_root.clone()
        };
        tokio::fs::create_dir_all(&dir).await.map_err(disk)?;
        Ok(dir)
    }

    /// Produce the artifact for a request.
    #[instrument(skip_all, fields(format = %request.format()))]
    pub async fn synthesize(
        &self,
        content: &GeneratedContent,
        request: &MediaRequest,
        cancel: &CancellationToken,
    ) -> Result<MediaArtifact> {
        let dir = self.run_dir().await?;

        let path = match request.format() {
            MediaFormat::Text => {
                let path = dir.join(NEWS_FILE);
                tokio::fs::write(&path, &content.script).await.map_err(disk)?;
                path
            }
            MediaFormat::Audio => {
                let path = dir.join(SPEECH_FILE);
                self.write_speech(&content.script, &path, cancel).await?;
                path
            }
            MediaFormat::Video => {
                let visual = content.visual_prompt.as_deref().ok_or_else(|| {
                    NewsreelError::synthesis(CapabilityError::malformed(
                        "animation",
                        "video content without a visual prompt",
                    ))
                })?;
                self.synthesize_video(&content.script, visual, &dir, cancel).await?
            }
        };

        info!("Wrote {:?}", path);
        Ok(MediaArtifact {
            path,
            format: request.format(),
        })
    }

    async fn write_speech(&self, script: &str, dest: &Path, cancel: &CancellationToken) -> Result<()> {
        let audio = guarded(cancel, "speech", self.speech_timeout, self.speech.synthesize_speech(script))
            .await
            .map_err(NewsreelError::synthesis)?;
        tokio::fs::write(dest, &audio).await.map_err(disk)?;
        debug!("Speech: {} bytes", audio.len());
        Ok(())
    }

    async fn synthesize_video(
        &self,
        script: &str,
        visual: &str,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let speech_path = dir.join(SPEECH_FILE);
        let video_path = dir.join(VIDEO_FILE);

        tokio::try_join!(
            self.write_speech(script, &speech_path, cancel),
            self.render_silent_video(visual, dir, &video_path, cancel),
        )?;

        let combined = dir.join(COMBINED_FILE);
        self.loop_and_mux(&video_path, &speech_path, dir, &combined, cancel)
            .await?;
        Ok(combined)
    }

    /// Render frames and encode them. On failure no partial video is left behind.
    async fn render_silent_video(
        &self,
        visual: &str,
        dir: &Path,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let frames_dir = tempfile::Builder::new()
            .prefix("frames-")
            .tempdir_in(dir)
            .map_err(disk)?;
        let frames_path = frames_dir.path().to_path_buf();

        let outcome = self.encode_frames(visual, &frames_path, dest, cancel).await;

        if let Err(e) = frames_dir.close() {
            warn!("Could not remove {:?}: {}", frames_path, e);
        }
        if outcome.is_err() && dest.exists() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        outcome
    }

    async fn encode_frames(
        &self,
        visual: &str,
        frames_dir: &Path,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut frames = self.animator.render_frames(visual, self.frame_count);
        let mut written = 0u32;

        loop {
            let next = guarded(cancel, "animation", self.frame_timeout, async {
                Ok(frames.next().await)
            })
            .await
            .map_err(NewsreelError::synthesis)?;

            let Some(frame) = next else {
                break;
            };
            let frame = frame.map_err(NewsreelError::synthesis)?;

            tokio::fs::write(frames_dir.join(ffmpeg::frame_file_name(written)), &frame.png)
                .await
                .map_err(disk)?;
            written += 1;
        }

        if written == 0 {
            return Err(NewsreelError::synthesis(CapabilityError::malformed(
                "animation",
                "no frames were rendered",
            )));
        }
        info!("Rendered {} frames", written);

        guarded(cancel, "ffmpeg", self.encode_timeout, ffmpeg::encode_frames(frames_dir, dest))
            .await
            .map_err(NewsreelError::synthesis)
    }

    /// Loop the silent video to cover the speech, then combine both.
    async fn loop_and_mux(
        &self,
        video: &Path,
        speech: &Path,
        dir: &Path,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let audio_secs = self.tool(cancel, "ffprobe", ffmpeg::media_duration(speech)).await?;
        let video_secs = self.tool(cancel, "ffprobe", ffmpeg::media_duration(video)).await?;
        let loops = ffmpeg::loop_count(audio_secs, video_secs);
        info!(
            "Looping {:.1}s video {}x to cover {:.1}s of speech",
            video_secs, loops, audio_secs
        );

        let list = dir.join(CONCAT_LIST);
        let looped = dir.join(LOOPED_FILE);
        tokio::fs::write(&list, ffmpeg::concat_list(video, loops))
            .await
            .map_err(disk)?;

        let outcome = async {
            self.tool(cancel, "ffmpeg", ffmpeg::concat_copy(&list, &looped)).await?;
            self.tool(cancel, "ffmpeg", ffmpeg::mux(&looped, speech, audio_secs, dest))
                .await
        }
        .await;

        for scratch in [&list, &looped] {
            if scratch.exists() {
                let _ = tokio::fs::remove_file(scratch).await;
            }
        }
        outcome
    }

    async fn tool<T>(
        &self,
        cancel: &CancellationToken,
        name: &'static str,
        call: impl std::future::Future<Output = std::result::Result<T, CapabilityError>>,
    ) -> Result<T> {
        guarded(cancel, name, self.encode_timeout, call)
            .await
            .map_err(NewsreelError::synthesis)
    }
}

/// Filesystem failures while producing media are synthesis failures.
fn disk(err: std::io::Error) -> NewsreelError {
    NewsreelError::synthesis(CapabilityError::Io(err))
}
