//! 核心模块
//!
//! - `context`: 管道共享状态
//! - `messaging`: 扩展命令与应答
//! - `service`: 管道组装与生命周期

pub mod context;
pub mod messaging;
pub mod service;

pub use context::PipelineContext;
pub use messaging::{Command, CommandResponse, EncryptedItem};
pub use service::ModerationPipeline;
