mod session;
mod timing;

pub use session::{MemorySessionStore, SessionStore};
pub use timing::VerifyTiming;

use std::collections::HashMap;
use std::env;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use indexmap::IndexMap;
use reqwest::{header::HeaderValue, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tokio::time::{sleep, Duration};
use tracing::debug;

use citetrace_core::{Citation, Verification};

const MAX_RETRIES: usize = 6;

/// A source document already registered with the verification service,
/// referenced by its opaque id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRef {
    pub attachment_id: String,
    pub file_name: String,
    #[serde(default)]
    pub page_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyRequest {
    pub attachments: Vec<AttachmentRef>,
    /// Citation key → citation, as produced by the scanner.
    pub citations: IndexMap<String, Citation>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    verifications: HashMap<String, Verification>,
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    file_name: &'a str,
    content_base64: String,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("CITETRACE_API_KEY")
            .map_err(|_| anyhow!("CITETRACE_API_KEY is not set"))?;
        let base_url = env::var("CITETRACE_BASE_URL")
            .unwrap_or_else(|_| "https://api.citetrace.dev".to_string());
        Ok(Self { api_key, base_url })
    }
}

/// HTTP client for the hosted verification API. Responses are keyed by the
/// same citation keys the core generates, which is the whole join contract.
#[derive(Clone)]
pub struct VerifyClient {
    http: Client,
    config: ClientConfig,
}

impl VerifyClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    pub async fn verify(&self, request: &VerifyRequest) -> Result<HashMap<String, Verification>> {
        let url = format!(
            "{}/v1/verify",
            self.config.base_url.trim_end_matches('/')
        );
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let response = match self
                .http
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt > MAX_RETRIES {
                        return Err(err).with_context(|| "verify request failed");
                    }
                    sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
            };
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt > MAX_RETRIES {
                    return Err(anyhow!("verify API rate limited after {MAX_RETRIES} retries"));
                }
                let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                sleep(wait).await;
                continue;
            }
            let body = response
                .error_for_status()
                .context("verify API returned an error")?
                .json::<VerifyResponse>()
                .await
                .context("failed to decode verify response")?;
            debug!(count = body.verifications.len(), "verification results received");
            return Ok(body.verifications);
        }
    }

    pub fn verify_blocking(&self, request: &VerifyRequest) -> Result<HashMap<String, Verification>> {
        let rt = Runtime::new().context("failed to create tokio runtime")?;
        rt.block_on(self.verify(request))
    }

    /// Register a source document with the verification service. The returned
    /// reference carries the opaque attachment id citations will name.
    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<AttachmentRef> {
        let url = format!(
            "{}/v1/attachments",
            self.config.base_url.trim_end_matches('/')
        );
        let payload = UploadRequest {
            file_name,
            content_base64: BASE64.encode(bytes),
        };
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let response = match self
                .http
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt > MAX_RETRIES {
                        return Err(err).with_context(|| "upload request failed");
                    }
                    sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
            };
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt > MAX_RETRIES {
                    return Err(anyhow!("upload API rate limited after {MAX_RETRIES} retries"));
                }
                let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                sleep(wait).await;
                continue;
            }
            let attachment = response
                .error_for_status()
                .context("upload API returned an error")?
                .json::<AttachmentRef>()
                .await
                .context("failed to decode upload response")?;
            debug!(attachment_id = %attachment.attachment_id, "attachment registered");
            return Ok(attachment);
        }
    }

    pub fn upload_blocking(&self, file_name: &str, bytes: &[u8]) -> Result<AttachmentRef> {
        let rt = Runtime::new().context("failed to create tokio runtime")?;
        rt.block_on(self.upload(file_name, bytes))
    }
}

fn backoff_delay(attempt: usize, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(value) = retry_after {
        if let Ok(text) = value.to_str() {
            if let Ok(secs) = text.parse::<u64>() {
                return Duration::from_secs(secs.max(1));
            }
        }
    }
    let capped = attempt.min(6) as u32;
    Duration::from_secs(1u64 << capped)
}
