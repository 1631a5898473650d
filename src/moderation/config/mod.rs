//! 审核配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, ModerationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 批次处理相关
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const BATCH_DELAY_MS: u64 = 100;

    // 观察器计时
    pub const DEBOUNCE_MS: u64 = 300;
    pub const FULL_SCAN_INTERVAL: Duration = Duration::from_secs(10);
    pub const IMAGE_SCAN_INTERVAL: Duration = Duration::from_secs(3);
    pub const REGISTRY_RESET_INTERVAL: Duration = Duration::from_secs(300); // 5分钟
    pub const HEADING_INITIAL_DELAY_MS: u64 = 100;
    pub const TEXT_INITIAL_DELAY_MS: u64 = 500;

    // 分析服务
    pub const DEFAULT_API_URL: &str = "http://localhost:5000";
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
    pub const IMAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(5);
    pub const IMAGE_LOAD_POLL_MS: u64 = 100;

    // 过滤阈值
    pub const MIN_TEXT_LENGTH: usize = 10;
    pub const MIN_IMAGE_DIMENSION: u32 = 50;

    // 占位文本分档
    pub const SHORT_TEXT_LIMIT: usize = 50;
    pub const MEDIUM_TEXT_LIMIT: usize = 200;

    // 历史记录
    pub const DEFAULT_HISTORY_LIMIT: usize = 100;
    pub const HISTORY_PREVIEW_CHARS: usize = 100;
    pub const NOTIFICATION_TTL: Duration = Duration::from_secs(8);

    // 可信图片域名，这些来源的图片从不送去分析
    pub const TRUSTED_IMAGE_DOMAINS: &[&str] = &[
        "wikipedia.org",
        "wikimedia.org",
        "githubusercontent.com",
        "gravatar.com",
        "cloudflare.com",
        "jsdelivr.net",
        "unpkg.com",
    ];

    // 界面元素（导航、按钮、菜单），标题除外
    pub const EXCLUDED_SELECTORS: &[&str] = &[
        "nav",
        "button",
        "menu",
        "[role=navigation]",
        "[role=button]",
        "[role=menu]",
        "select",
        "script",
        "style",
        "noscript",
        "textarea",
        "input",
    ];

    pub const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

    pub const TEXT_TAGS: &[&str] = &[
        "p", "span", "div", "li", "td", "th", "blockquote", "a", "label", "figcaption",
        "article", "section", "dd", "dt", "em", "strong", "b", "i",
    ];

    // 本地回退词表：比远程服务更窄，只做整词匹配
    pub const PROFANITY_WORDS: &[&str] = &[
        "fuck",
        "shit",
        "bitch",
        "asshole",
        "bastard",
        "cunt",
        "dickhead",
        "motherfucker",
    ];

    pub const HATE_SPEECH_TERMS: &[&str] = &[
        "kill all",
        "white power",
        "ethnic cleansing",
        "subhuman",
        "master race",
        "death to all",
    ];

    pub const SENSITIVE_IMAGE_KEYWORDS: &[&str] =
        &["nsfw", "porn", "xxx", "nude", "gore", "explicit"];

    // 注入节点使用的标记
    pub const FILTERED_CLASS: &str = "pg-filtered";
    pub const INDICATOR_CLASS: &str = "pg-indicator";
    pub const IMAGE_CONTAINER_CLASS: &str = "pg-image-container";
    pub const OVERLAY_CLASS: &str = "pg-overlay";
    pub const SHOW_BUTTON_CLASS: &str = "pg-show-button";
    pub const MODAL_CLASS: &str = "pg-modal";
    pub const NOTIFICATION_CLASS: &str = "pg-notification";
    pub const ORIGINAL_ATTR: &str = "data-pg-original";
    pub const INJECTED_ATTR: &str = "data-pageguard";
    pub const BLUR_STYLE: &str = "filter: blur(20px)";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "pageguard.toml",
        ".pageguard.toml",
        "~/.config/pageguard/config.toml",
    ];
}
