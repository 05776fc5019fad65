use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat};
use log::{info, warn};
use thiserror::Error;

use crate::api::models::zapping::ChannelInfo;
use crate::core::zapping::AnalysisRegion;

mod client;
mod parser;

pub use client::{HttpVisionClient, VisionClient, VisionConfig};
pub use parser::{parse_banner_response, BannerParse};

/// 固定提示词，描述期望的 JSON 结构
pub const BANNER_PROMPT: &str = "You are reading a TV channel banner overlay. \
Return ONLY a JSON object with exactly these keys: \
{\"channel_name\": string or null, \"program_name\": string or null, \
\"start_time\": \"HH:MM\" or null, \"end_time\": \"HH:MM\" or null}. \
Use null for any field that is not clearly readable. Do not add any other text.";

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI 接口返回错误状态 {status}: {body}")]
    Status { status: u16, body: String },
    #[error("AI 响应为空")]
    EmptyResponse,
    #[error("配置错误: {0}")]
    Config(String),
    #[error("横幅图片编码失败: {0}")]
    Encode(#[from] image::ImageError),
}

impl VisionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, VisionError::Http(e) if e.is_timeout())
    }
}

/// 横幅解析器：调用视觉模型并解析其回复，任何失败都降级为"无频道信息"
pub struct BannerParser {
    client: Box<dyn VisionClient>,
    jpeg_quality: u8,
}

impl BannerParser {
    pub fn new(client: impl VisionClient + 'static) -> Self {
        Self {
            client: Box::new(client),
            jpeg_quality: 85,
        }
    }

    /// 使用环境变量配置的 HTTP 客户端
    pub fn from_env() -> Result<Self, VisionError> {
        let config = VisionConfig::from_env()?;
        info!("🤖 Vision endpoint: {} ({})", config.endpoint, config.model);
        Ok(Self::new(HttpVisionClient::new(config)?))
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// 裁剪横幅区域并编码为 JPEG
    pub fn encode_banner(
        &self,
        image: &DynamicImage,
        region: &AnalysisRegion,
    ) -> Result<Vec<u8>, VisionError> {
        let cropped = DynamicImage::ImageRgb8(
            image
                .crop_imm(region.x, region.y, region.width, region.height)
                .to_rgb8(),
        );

        let mut buffer = Cursor::new(Vec::new());
        cropped.write_to(&mut buffer, ImageOutputFormat::Jpeg(self.jpeg_quality))?;
        Ok(buffer.into_inner())
    }

    /// 对已编码的横幅图片发起一次识别
    pub fn read(&self, jpeg: &[u8]) -> BannerParse {
        match self.client.complete(BANNER_PROMPT, jpeg) {
            Ok(text) => parse_banner_response(&text),
            Err(e) if e.is_timeout() => {
                warn!("⏱️ Vision request timed out, no channel info for this frame");
                BannerParse::Empty
            }
            Err(e) => {
                warn!("⚠️ Vision request failed: {}", e);
                BannerParse::Empty
            }
        }
    }

    /// 从帧中识别频道信息，失败时返回全空的 `ChannelInfo`
    pub fn extract(&self, image: &DynamicImage, region: &AnalysisRegion) -> ChannelInfo {
        let jpeg = match self.encode_banner(image, region) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!("⚠️ {}", e);
                return ChannelInfo::default();
            }
        };

        let parsed = self.read(&jpeg);
        match &parsed {
            BannerParse::Json(info) => info!("📺 Banner (json): {:?}", info),
            BannerParse::Fallback(info) => info!("📺 Banner (fallback): {:?}", info),
            BannerParse::Empty => info!("📺 Banner: nothing recoverable"),
        }
        parsed.into_info()
    }
}
