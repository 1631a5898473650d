//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。所有变量以 `PAGEGUARD_` 为前缀。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 只在变量被显式设置时返回值，用于覆盖配置文件
    fn get_override() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "PAGEGUARD_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 审核相关环境变量
pub mod moderation {
    use super::*;

    /// 保护开关
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "PAGEGUARD_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable content protection";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 分析服务地址
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "PAGEGUARD_API_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Analysis service base URL";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("http://localhost:5000".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.trim_end_matches('/').to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// 每批最多处理的元素数
    pub struct BatchSize;
    impl EnvVar<usize> for BatchSize {
        const NAME: &'static str = "PAGEGUARD_BATCH_SIZE";
        const DEFAULT: Option<usize> = Some(10);
        const DESCRIPTION: &'static str = "Maximum elements analyzed per dispatch cycle";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100)
        }
    }

    /// 批次间隔
    pub struct BatchDelay;
    impl EnvVar<Duration> for BatchDelay {
        const NAME: &'static str = "PAGEGUARD_BATCH_DELAY_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(100));
        const DESCRIPTION: &'static str = "Delay between dispatch cycles in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let millis = parse_positive_usize(value, Self::NAME, 0, 60_000)?;
            Ok(Duration::from_millis(millis as u64))
        }
    }

    /// 分析请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "PAGEGUARD_REQUEST_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(10));
        const DESCRIPTION: &'static str = "Analysis request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_usize(value, Self::NAME, 1, 120)?;
            Ok(Duration::from_secs(seconds as u64))
        }
    }

    /// 文本最小长度
    pub struct MinTextLength;
    impl EnvVar<usize> for MinTextLength {
        const NAME: &'static str = "PAGEGUARD_MIN_TEXT_LENGTH";
        const DEFAULT: Option<usize> = Some(10);
        const DESCRIPTION: &'static str = "Minimum trimmed text length sent for analysis";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 10_000)
        }
    }

    /// 图片最小尺寸
    pub struct MinImageDimension;
    impl EnvVar<u32> for MinImageDimension {
        const NAME: &'static str = "PAGEGUARD_MIN_IMAGE_DIMENSION";
        const DEFAULT: Option<u32> = Some(50);
        const DESCRIPTION: &'static str = "Minimum natural width/height of analyzed images";

        fn parse(value: &str) -> EnvResult<u32> {
            Ok(parse_positive_usize(value, Self::NAME, 1, 4096)? as u32)
        }
    }
}

/// 存储相关环境变量
pub mod storage {
    use super::*;

    /// 历史记录上限
    pub struct HistoryLimit;
    impl EnvVar<usize> for HistoryLimit {
        const NAME: &'static str = "PAGEGUARD_HISTORY_LIMIT";
        const DEFAULT: Option<usize> = Some(100);
        const DESCRIPTION: &'static str = "Maximum number of history entries kept";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100_000)
        }
    }

    /// 历史记录文件
    pub struct HistoryPath;
    impl EnvVar<String> for HistoryPath {
        const NAME: &'static str = "PAGEGUARD_HISTORY_PATH";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "JSON file used to persist filtered history";

        fn parse(value: &str) -> EnvResult<String> {
            let path = value.trim();
            if path.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Path cannot be empty".to_string(),
                });
            }
            Ok(shellexpand::tilde(path).to_string())
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_parsing() {
        assert!(moderation::Enabled::parse("true").unwrap());
        assert!(moderation::Enabled::parse("ON").unwrap());
        assert!(!moderation::Enabled::parse("0").unwrap());
        assert!(!moderation::Enabled::parse("disabled").unwrap());
        assert!(moderation::Enabled::parse("maybe").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert_eq!(
            moderation::ApiUrl::parse("http://localhost:5000/").unwrap(),
            "http://localhost:5000"
        );
        assert!(moderation::ApiUrl::parse("ftp://example.com").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(moderation::BatchSize::parse("25").unwrap(), 25);
        assert!(moderation::BatchSize::parse("0").is_err());
        assert!(moderation::BatchSize::parse("1000").is_err());
        assert_eq!(
            moderation::BatchDelay::parse("250").unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert!(core::LogLevel::parse("verbose").is_err());
    }
}
