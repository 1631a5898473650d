//! # PageGuard Library
//!
//! 在页面内对文本和图片进行实时内容审核：发现候选元素、去重、分批分析，
//! 并以可撤销的方式隐藏或模糊被判定为不良的内容。
//!
//! ## 模块组织
//!
//! - `parsers` - HTML 解析、DOM 操作、选择器与序列化
//! - `utils` - 工具函数（域名匹配、文本截断）
//! - `env` - 类型安全的环境变量
//! - `moderation` - 审核管道（观察、队列、分析、处理与恢复）

pub mod env;
pub mod moderation;
pub mod parsers;
pub mod utils;

// Re-export commonly used items for convenience
pub use moderation::{
    AnalysisVerdict, Action, Command, CommandResponse, ConfigManager, LiveDocument,
    ModerationConfig, ModerationError, ModerationPipeline, ModerationResult,
};
pub use parsers::*;
pub use utils::*;
