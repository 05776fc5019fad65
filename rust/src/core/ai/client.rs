//! 视觉大模型接口（OpenAI 兼容 chat completions）

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::VisionError;

const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "qwen/qwen-2.5-vl-7b-instruct";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// 视觉接口配置
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl VisionConfig {
    /// 从环境变量读取：
    /// - `ZAP_VISION_API_KEY`（必需）
    /// - `ZAP_VISION_ENDPOINT` / `ZAP_VISION_MODEL` / `ZAP_VISION_TIMEOUT_SECS`（可选）
    pub fn from_env() -> Result<Self, VisionError> {
        let api_key = std::env::var("ZAP_VISION_API_KEY")
            .map_err(|_| VisionError::Config("ZAP_VISION_API_KEY not set".to_string()))?;

        let mut config = Self {
            api_key: Some(api_key),
            ..Self::default()
        };

        if let Ok(endpoint) = std::env::var("ZAP_VISION_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("ZAP_VISION_MODEL") {
            config.model = model;
        }
        if let Ok(raw) = std::env::var("ZAP_VISION_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                VisionError::Config(format!("invalid ZAP_VISION_TIMEOUT_SECS: {}", raw))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// 视觉模型调用：一张图片 + 一段提示词，返回模型的原始文本
pub trait VisionClient: Send + Sync {
    fn complete(&self, prompt: &str, jpeg: &[u8]) -> Result<String, VisionError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// 基于 reqwest 阻塞客户端的实现，超时由 `VisionConfig::timeout` 限定
pub struct HttpVisionClient {
    config: VisionConfig,
    client: Client,
}

impl HttpVisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    fn build_request(&self, prompt: &str, jpeg: &[u8]) -> ChatRequest {
        let data_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg));
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: 300,
            temperature: 0.0,
        }
    }
}

impl VisionClient for HttpVisionClient {
    fn complete(&self, prompt: &str, jpeg: &[u8]) -> Result<String, VisionError> {
        let request = self.build_request(prompt, jpeg);
        debug!(
            "🌐 Vision request to {} ({} bytes image)",
            self.config.endpoint,
            jpeg.len()
        );

        let mut builder = self.client.post(&self.config.endpoint).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(VisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = resp.json()?;
        extract_content(body)
    }
}

fn extract_content(body: ChatResponse) -> Result<String, VisionError> {
    body.choices
        .into_iter()
        .find_map(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(VisionError::EmptyResponse)
}
