//! # 工具模块
//!
//! - `url` - 域名匹配、主机名提取、地址解析与文本截断

pub mod url;

// Re-export commonly used items for convenience
pub use url::{domain_is_within_domain, host_of, resolve_url, truncate_chars, Url};
