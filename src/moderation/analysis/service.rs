//! 分析服务接口
//!
//! 远程分析服务被视为黑盒：请求 `{text|image_url, url}`，返回
//! `{action, reasons, ...}`。任何非成功状态或传输错误都算失败。

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::moderation::analysis::verdict::AnalysisVerdict;
use crate::moderation::config::ModerationConfig;
use crate::moderation::error::{ModerationError, ModerationResult};

/// 分析请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnalysisRequest {
    Text { text: String, url: String },
    Image { image_url: String, url: String },
}

impl AnalysisRequest {
    pub fn text(text: impl Into<String>, page_url: impl Into<String>) -> Self {
        AnalysisRequest::Text {
            text: text.into(),
            url: page_url.into(),
        }
    }

    pub fn image(image_url: impl Into<String>, page_url: impl Into<String>) -> Self {
        AnalysisRequest::Image {
            image_url: image_url.into(),
            url: page_url.into(),
        }
    }

    /// 相对于服务根地址的接口路径
    pub fn endpoint(&self) -> &'static str {
        match self {
            AnalysisRequest::Text { .. } => "analyze/text",
            AnalysisRequest::Image { .. } => "analyze/image",
        }
    }
}

/// 分析服务
///
/// 管道运行在单线程上，实现不要求 `Send`。
#[async_trait(?Send)]
pub trait AnalysisService {
    /// 分析单条内容
    async fn analyze(&self, request: &AnalysisRequest) -> ModerationResult<AnalysisVerdict>;

    /// 健康检查
    async fn health_check(&self) -> bool;
}

/// 基于 HTTP/JSON 的分析服务客户端
pub struct HttpAnalysisService {
    client: reqwest::Client,
    api_url: String,
}

impl HttpAnalysisService {
    pub fn new(config: &ModerationConfig) -> ModerationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("pageguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ModerationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }
}

#[async_trait(?Send)]
impl AnalysisService for HttpAnalysisService {
    async fn analyze(&self, request: &AnalysisRequest) -> ModerationResult<AnalysisVerdict> {
        let endpoint = self.endpoint_url(request.endpoint());
        tracing::debug!("请求分析服务: {}", endpoint);

        let response = self
            .client
            .post(&endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ModerationError::from(e).with_context(request.endpoint()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModerationError::ServiceError {
                status: status.as_u16(),
                message,
            });
        }

        let payload: Value = response.json().await?;
        AnalysisVerdict::from_payload(payload)
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.endpoint_url("health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("健康检查失败: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let text = AnalysisRequest::text("hello there", "https://example.com/a");
        assert_eq!(
            serde_json::to_value(&text).unwrap(),
            json!({"text": "hello there", "url": "https://example.com/a"})
        );
        assert_eq!(text.endpoint(), "analyze/text");

        let image = AnalysisRequest::image("https://cdn.example.com/x.png", "https://example.com/");
        assert_eq!(
            serde_json::to_value(&image).unwrap(),
            json!({"image_url": "https://cdn.example.com/x.png", "url": "https://example.com/"})
        );
        assert_eq!(image.endpoint(), "analyze/image");
    }

    #[test]
    fn test_endpoint_url_trims_slash() {
        let config = ModerationConfig::with_api_url("http://localhost:5000/");
        let service = HttpAnalysisService::new(&config).unwrap();
        assert_eq!(service.api_url(), "http://localhost:5000");
        assert_eq!(
            service.endpoint_url("health"),
            "http://localhost:5000/health"
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // 端口 9 (discard) 通常没有监听
        let config = ModerationConfig {
            request_timeout_secs: 1,
            ..ModerationConfig::with_api_url("http://127.0.0.1:9")
        };
        let service = HttpAnalysisService::new(&config).unwrap();

        let error = service
            .analyze(&AnalysisRequest::text("some text here", "https://example.com/"))
            .await
            .unwrap_err();
        assert!(error.is_transport());
        assert!(!service.health_check().await);
    }
}
