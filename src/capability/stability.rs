//! Frame rendering through the Stability REST text-to-image API.
//!
//! Frames are rendered one request at a time with the seed stepped per frame.
//! Every frame shares the prompt, but each seed produces an unrelated image,
//! so the encoded video cuts between separate renderings of the same scene.

use super::{Animator, CapabilityResult, Frame, FrameStream};
use crate::config::AnimationSettings;
use crate::error::CapabilityError;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const ANIMATION: &str = "animation";

pub struct StabilityAnimator {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    api_key: Option<String>,
    settings: AnimationSettings,
}

impl StabilityAnimator {
    pub fn new(client: reqwest::Client, api_key: Option<String>, settings: AnimationSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                api_key,
                settings,
            }),
        }
    }
}

#[derive(Serialize)]
struct TextToImageRequest<'a> {
    text_prompts: [TextPrompt<'a>; 1],
    cfg_scale: f32,
    width: u32,
    height: u32,
    samples: u32,
    steps: u32,
    seed: u32,
}

#[derive(Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
    weight: f32,
}

#[derive(Deserialize)]
struct TextToImageResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Deserialize)]
struct Artifact {
    base64: String,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

impl Inner {
    async fn render(&self, prompt: &str, index: u32) -> CapabilityResult<Frame> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CapabilityError::service(ANIMATION, "STABILITY_KEY is not configured"))?;

        let url = format!(
            "{}/v1/generation/{}/text-to-image",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.engine
        );

        let body = TextToImageRequest {
            text_prompts: [TextPrompt { text: prompt, weight: 1.0 }],
            cfg_scale: self.settings.cfg_scale,
            width: self.settings.width,
            height: self.settings.height,
            samples: 1,
            steps: self.settings.steps,
            seed: self.settings.seed.wrapping_add(index),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CapabilityError::service(ANIMATION, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(CapabilityError::service(
                ANIMATION,
                format!("HTTP {}: {}", status, detail),
            ));
        }

        let payload: TextToImageResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::malformed(ANIMATION, e))?;

        decode_frame(payload, index)
    }
}

fn decode_frame(payload: TextToImageResponse, index: u32) -> CapabilityResult<Frame> {
    let artifact = payload
        .artifacts
        .into_iter()
        .next()
        .ok_or_else(|| CapabilityError::malformed(ANIMATION, "response has no artifacts"))?;

    if artifact.finish_reason.as_deref() == Some("ERROR") {
        return Err(CapabilityError::service(ANIMATION, "frame generation reported ERROR"));
    }

    let png = BASE64_STANDARD
        .decode(artifact.base64)
        .map_err(|e| CapabilityError::malformed(ANIMATION, format!("base64 decode failed: {}", e)))?;

    debug!("Rendered frame {} ({} bytes)", index, png.len());

    Ok(Frame {
        index,
        png: Bytes::from(png),
    })
}

impl Animator for StabilityAnimator {
    fn render_frames(&self, prompt: &str, frame_count: u32) -> FrameStream {
        let inner = Arc::clone(&self.inner);
        let prompt: Arc<str> = Arc::from(prompt);

        futures::stream::iter(0..frame_count)
            .then(move |index| {
                let inner = Arc::clone(&inner);
                let prompt = Arc::clone(&prompt);
                async move { inner.render(&prompt, index).await }
            })
            .boxed()
    }
}
