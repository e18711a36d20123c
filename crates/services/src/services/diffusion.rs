use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_CFG_SCALE: f64 = 7.0;
const DEFAULT_SAMPLER: &str = "Euler a";
const DEFAULT_DENOISING_STRENGTH: f64 = 0.75;

/// Wire value the backend interprets as "pick a random seed".
pub const RANDOM_SEED: i64 = -1;

#[derive(Debug, Error)]
pub enum DiffusionError {
    #[error("Diffusion API request timed out")]
    Timeout,
    #[error("Diffusion API error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("Diffusion API returned no images")]
    EmptyResponse,
    #[error("Diffusion API request failed: {0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for DiffusionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DiffusionError::Timeout
        } else {
            DiffusionError::Request(err)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Txt2ImgRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: i32,
    pub height: i32,
    pub steps: i32,
    pub cfg_scale: f64,
    pub sampler_index: String,
    pub seed: i64,
}

impl Txt2ImgRequest {
    pub fn new(
        prompt: String,
        negative_prompt: Option<String>,
        width: i32,
        height: i32,
        steps: i32,
        seed: Option<i64>,
    ) -> Self {
        Self {
            prompt,
            negative_prompt: negative_prompt.unwrap_or_default(),
            width,
            height,
            steps,
            cfg_scale: DEFAULT_CFG_SCALE,
            sampler_index: DEFAULT_SAMPLER.to_string(),
            seed: seed.unwrap_or(RANDOM_SEED),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Img2ImgRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: i32,
    pub height: i32,
    pub steps: i32,
    pub denoising_strength: f64,
    pub init_images: Vec<String>,
    pub cfg_scale: f64,
    pub sampler_index: String,
    pub seed: i64,
}

impl Img2ImgRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prompt: String,
        negative_prompt: Option<String>,
        width: i32,
        height: i32,
        steps: i32,
        denoising_strength: Option<f64>,
        init_image_base64: String,
        seed: Option<i64>,
    ) -> Self {
        Self {
            prompt,
            negative_prompt: negative_prompt.unwrap_or_default(),
            width,
            height,
            steps,
            denoising_strength: denoising_strength.unwrap_or(DEFAULT_DENOISING_STRENGTH),
            init_images: vec![init_image_base64],
            cfg_scale: DEFAULT_CFG_SCALE,
            sampler_index: DEFAULT_SAMPLER.to_string(),
            seed: seed.unwrap_or(RANDOM_SEED),
        }
    }
}

/// Raw response from the diffusion backend. `info` is a JSON string, not an
/// object; the seed actually used lives inside it.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    pub images: Vec<String>,
    #[serde(default)]
    pub info: String,
}

impl GenerationResponse {
    pub fn first_image(&self) -> Result<&str, DiffusionError> {
        self.images
            .first()
            .map(String::as_str)
            .ok_or(DiffusionError::EmptyResponse)
    }
}

/// Extracts the seed the backend reports in its `info` payload. Returns
/// `None` when the payload is missing, malformed, or has no seed field.
pub fn seed_from_info(info: &str) -> Option<i64> {
    let parsed: serde_json::Value = serde_json::from_str(info).ok()?;
    parsed.get("seed")?.as_i64()
}

#[async_trait]
pub trait DiffusionApi: Send + Sync {
    async fn txt2img(&self, request: Txt2ImgRequest) -> Result<GenerationResponse, DiffusionError>;
    async fn img2img(&self, request: Img2ImgRequest) -> Result<GenerationResponse, DiffusionError>;
}

#[derive(Clone)]
pub struct DiffusionService {
    client: reqwest::Client,
    base_url: String,
    // Generation can legitimately run for minutes on large step counts.
    timeout: Duration,
}

impl DiffusionService {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }

    async fn post_generation<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<GenerationResponse, DiffusionError> {
        let url = format!("{}/sdapi/v1/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiffusionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: GenerationResponse = response.json().await?;
        if result.images.is_empty() {
            return Err(DiffusionError::EmptyResponse);
        }
        Ok(result)
    }
}

#[async_trait]
impl DiffusionApi for DiffusionService {
    async fn txt2img(&self, request: Txt2ImgRequest) -> Result<GenerationResponse, DiffusionError> {
        tracing::debug!(
            steps = request.steps,
            seed = request.seed,
            "submitting txt2img request"
        );
        self.post_generation("txt2img", &request).await
    }

    async fn img2img(&self, request: Img2ImgRequest) -> Result<GenerationResponse, DiffusionError> {
        tracing::debug!(
            steps = request.steps,
            seed = request.seed,
            "submitting img2img request"
        );
        self.post_generation("img2img", &request).await
    }
}
