//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::moderation::error::{ModerationError, ModerationResult};

/// 审核管道配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModerationConfig {
    // 基础配置
    pub enabled: bool,
    pub api_url: String,
    pub request_timeout_secs: u64,

    // 批次配置
    pub batch_size: usize,
    pub batch_delay_ms: u64,

    // 观察器配置
    pub debounce_ms: u64,
    pub full_scan_interval_secs: u64,
    pub image_scan_interval_secs: u64,
    pub registry_reset_secs: u64,
    pub health_check_interval_secs: u64,
    pub heading_initial_delay_ms: u64,
    pub text_initial_delay_ms: u64,
    pub image_load_timeout_secs: u64,

    // 过滤规则
    pub min_text_length: usize,
    pub min_image_dimension: u32,
    pub trusted_image_domains: Vec<String>,
    pub excluded_selectors: Vec<String>,

    // 历史与提示
    pub history_limit: usize,
    pub notification_ttl_secs: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: constants::DEFAULT_API_URL.to_string(),
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),

            batch_size: constants::DEFAULT_BATCH_SIZE,
            batch_delay_ms: constants::BATCH_DELAY_MS,

            debounce_ms: constants::DEBOUNCE_MS,
            full_scan_interval_secs: constants::FULL_SCAN_INTERVAL.as_secs(),
            image_scan_interval_secs: constants::IMAGE_SCAN_INTERVAL.as_secs(),
            registry_reset_secs: constants::REGISTRY_RESET_INTERVAL.as_secs(),
            health_check_interval_secs: constants::HEALTH_CHECK_INTERVAL.as_secs(),
            heading_initial_delay_ms: constants::HEADING_INITIAL_DELAY_MS,
            text_initial_delay_ms: constants::TEXT_INITIAL_DELAY_MS,
            image_load_timeout_secs: constants::IMAGE_LOAD_TIMEOUT.as_secs(),

            min_text_length: constants::MIN_TEXT_LENGTH,
            min_image_dimension: constants::MIN_IMAGE_DIMENSION,
            trusted_image_domains: constants::TRUSTED_IMAGE_DOMAINS
                .iter()
                .map(|domain| domain.to_string())
                .collect(),
            excluded_selectors: constants::EXCLUDED_SELECTORS
                .iter()
                .map(|selector| selector.to_string())
                .collect(),

            history_limit: constants::DEFAULT_HISTORY_LIMIT,
            notification_ttl_secs: constants::NOTIFICATION_TTL.as_secs(),
        }
    }
}

impl ModerationConfig {
    /// 创建指向指定分析服务的默认配置
    pub fn with_api_url(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ModerationResult<()> {
        if self.batch_size == 0 {
            return Err(ModerationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.debounce_ms == 0 {
            return Err(ModerationError::ConfigError("防抖间隔不能为0".to_string()));
        }

        if self.full_scan_interval_secs == 0 || self.image_scan_interval_secs == 0 {
            return Err(ModerationError::ConfigError("扫描间隔不能为0".to_string()));
        }

        if self.registry_reset_secs == 0 || self.health_check_interval_secs == 0 {
            return Err(ModerationError::ConfigError("定时器间隔不能为0".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(ModerationError::ConfigError("请求超时不能为0".to_string()));
        }

        if self.history_limit == 0 {
            return Err(ModerationError::ConfigError("历史记录上限不能为0".to_string()));
        }

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ModerationError::ConfigError(format!(
                "无效的分析服务地址: {}",
                self.api_url
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖（只覆盖显式设置的变量）
    pub fn apply_env_overrides(&mut self) -> ModerationResult<()> {
        use crate::env::{moderation, storage, EnvVar};

        if let Some(enabled) = moderation::Enabled::get_override() {
            self.enabled = enabled?;
        }

        if let Some(api_url) = moderation::ApiUrl::get_override() {
            self.api_url = api_url?;
            tracing::info!("环境变量覆盖 API URL: {}", self.api_url);
        }

        if let Some(batch_size) = moderation::BatchSize::get_override() {
            self.batch_size = batch_size?;
        }

        if let Some(batch_delay) = moderation::BatchDelay::get_override() {
            self.batch_delay_ms = batch_delay?.as_millis() as u64;
        }

        if let Some(timeout) = moderation::RequestTimeout::get_override() {
            self.request_timeout_secs = timeout?.as_secs();
        }

        if let Some(min_length) = moderation::MinTextLength::get_override() {
            self.min_text_length = min_length?;
        }

        if let Some(min_dimension) = moderation::MinImageDimension::get_override() {
            self.min_image_dimension = min_dimension?;
        }

        if let Some(limit) = storage::HistoryLimit::get_override() {
            self.history_limit = limit?;
        }

        Ok(())
    }

    /// 转换为Duration类型
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn full_scan_interval(&self) -> Duration {
        Duration::from_secs(self.full_scan_interval_secs)
    }

    pub fn image_scan_interval(&self) -> Duration {
        Duration::from_secs(self.image_scan_interval_secs)
    }

    pub fn registry_reset_interval(&self) -> Duration {
        Duration::from_secs(self.registry_reset_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn heading_initial_delay(&self) -> Duration {
        Duration::from_millis(self.heading_initial_delay_ms)
    }

    pub fn text_initial_delay(&self) -> Duration {
        Duration::from_millis(self.text_initial_delay_ms)
    }

    pub fn image_load_timeout(&self) -> Duration {
        Duration::from_secs(self.image_load_timeout_secs)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_ttl_secs)
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: ModerationConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> ModerationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(Self { config })
    }

    /// 从指定文件创建（仍然应用环境变量覆盖）
    pub fn from_file(path: &str) -> ModerationResult<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &ModerationConfig {
        &self.config
    }

    pub fn into_config(self) -> ModerationConfig {
        self.config
    }

    /// 从文件加载配置
    fn load_config() -> ModerationResult<ModerationConfig> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        // 查找配置文件
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(ModerationConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &str) -> ModerationResult<ModerationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModerationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        // 尝试TOML格式
        if path.ends_with(".toml") {
            toml::from_str(&content)
                .map_err(|e| ModerationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        } else {
            // 尝试JSON格式
            serde_json::from_str(&content)
                .map_err(|e| ModerationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> ModerationResult<()> {
        let config = ModerationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| ModerationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ModerationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
