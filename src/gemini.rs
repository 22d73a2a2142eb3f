use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{error, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GeminiOptions;
use crate::imgutil;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// 图生图客户端抽象，服务端在测试里用桩实现替换
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// 根据输入图片和文字指令生成新图片
    ///
    /// 模型拒绝出图和调用失败都返回 None，调用方只需要区分"拿到图"和"没拿到"
    async fn generate(&self, image: &[u8], prompt: &str) -> Option<Vec<u8>>;
}

/// Gemini 图片生成客户端
pub struct GeminiClient {
    client: Client,
    base: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(opts: &GeminiOptions) -> Result<Self> {
        if opts.google_api_key.is_empty() {
            bail!("GOOGLE_API_KEY 不能为空");
        }
        Ok(Self {
            client: Client::new(),
            base: API_BASE.to_string(),
            api_key: opts.google_api_key.clone(),
            model: opts.gemini_model.clone(),
            timeout: Duration::from_secs(opts.gemini_timeout),
        })
    }

    #[cfg(test)]
    fn with_base(mut self, base: String) -> Self {
        self.base = base;
        self
    }

    async fn call(&self, image: &[u8], prompt: &str) -> Result<Option<Vec<u8>>> {
        // 从字节内容检测真实格式，不信任客户端声明的 content-type
        let mime = imgutil::detect_mime(image);
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part::text(prompt), Part::inline(mime, STANDARD.encode(image))],
            }],
            generation_config: GenerationConfig { response_modalities: vec!["IMAGE".to_string()] },
        };

        let url = format!("{}/{}:generateContent?key={}", self.base, self.model, self.api_key);
        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let body: GenerateResponse = resp.json().await?;

        // 只取第一个候选里第一段带图片数据的 part
        let parts = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();
        for part in parts {
            if let Some(inline) = part.inline_data {
                return Ok(Some(STANDARD.decode(inline.data.as_bytes())?));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, image: &[u8], prompt: &str) -> Option<Vec<u8>> {
        match self.call(image, prompt).await {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => {
                warn!("Gemini 没有返回图片数据");
                None
            }
            Err(e) => {
                error!("调用 Gemini 失败: {e:?}");
                None
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self { text: Some(text.to_string()), inline_data: None }
    }

    fn inline(mime: &str, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData { mime_type: mime.to_string(), data }),
        }
    }
}
