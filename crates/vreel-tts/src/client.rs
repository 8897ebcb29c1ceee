//! HTTP TTS service client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::error::{TtsError, TtsResult};
use crate::synthesizer::SpeechSynthesizer;
use crate::types::SynthesisEnvelope;

/// Configuration for the TTS client.
#[derive(Debug, Clone)]
pub struct TtsClientConfig {
    /// Synthesis endpoint; text is sent as the `text` query parameter
    pub endpoint: String,
    /// Timeout for the synthesis request
    pub timeout: Duration,
    /// Timeout for downloading the rendered audio
    pub download_timeout: Duration,
    /// Pause before each synthesis request, to stay under rate limits
    pub request_delay: Duration,
}

impl Default for TtsClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8002/tts".to_string(),
            timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(30),
            request_delay: Duration::from_millis(500),
        }
    }
}

impl TtsClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("TTS_SERVICE_URL").unwrap_or(defaults.endpoint),
            timeout: std::env::var("TTS_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            download_timeout: std::env::var("TTS_DOWNLOAD_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            request_delay: std::env::var("TTS_REQUEST_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_delay),
        }
    }

    /// Returns a new config without the inter-request pause.
    pub fn without_delay(mut self) -> Self {
        self.request_delay = Duration::ZERO;
        self
    }
}

/// Client for the HTTP TTS service.
///
/// One synthesis is two requests: the endpoint answers a
/// [`SynthesisEnvelope`], then the audio is fetched from its URL.
#[derive(Debug, Clone)]
pub struct HttpTtsClient {
    http: Client,
    endpoint: Url,
    config: TtsClientConfig,
}

impl HttpTtsClient {
    /// Create a new client.
    pub fn new(config: TtsClientConfig) -> TtsResult<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| TtsError::Config(format!("invalid endpoint {}: {}", config.endpoint, e)))?;

        let http = Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(TtsError::Network)?;

        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> TtsResult<Self> {
        Self::new(TtsClientConfig::from_env())
    }

    pub fn config(&self) -> &TtsClientConfig {
        &self.config
    }

    async fn request_audio_url(&self, text: &str) -> TtsResult<Url> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[("text", text)])
            .timeout(self.config.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: SynthesisEnvelope = response
            .json()
            .await
            .map_err(|e| TtsError::InvalidResponse(e.to_string()))?;

        if !envelope.is_success() {
            return Err(TtsError::Rejected {
                code: envelope.code,
                message: envelope.msg.clone().unwrap_or_default(),
            });
        }

        let url = envelope
            .audio_url()
            .ok_or_else(|| TtsError::InvalidResponse("no audio URL in response".to_string()))?;

        // Relative URLs resolve against the endpoint
        self.endpoint
            .join(url)
            .map_err(|e| TtsError::InvalidResponse(format!("bad audio URL {}: {}", url, e)))
    }

    async fn download(&self, url: Url) -> TtsResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .timeout(self.config.download_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(TtsError::EmptyAudio);
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpTtsClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn synthesize(&self, text: &str) -> TtsResult<Vec<u8>> {
        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }

        let preview: String = text.chars().take(10).collect();
        debug!(text = %preview, "Requesting speech synthesis");

        let url = self.request_audio_url(text).await.inspect_err(|e| {
            warn!(text = %preview, error = %e, "Speech synthesis request failed");
        })?;

        debug!(url = %url, "Downloading synthesized audio");
        let audio = self.download(url).await?;

        debug!(text = %preview, bytes = audio.len(), "Received synthesized audio");
        Ok(audio)
    }
}
