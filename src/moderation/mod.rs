//! 内容审核模块
//!
//! 在活动文档上持续发现候选内容、去重、分批送去分析，并以可撤销的方式应用结果：
//! - **document**: 活动文档与变更记录
//! - **pipeline**: 候选发现、元素登记、处理队列与批次调度
//! - **analysis**: 远程分析服务、本地启发式回退与图片探测
//! - **actions**: 文本遮罩、图片模糊、全局恢复与内容找回
//! - **storage**: 历史记录与设置存储
//! - **core**: 管道上下文、扩展消息与生命周期
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use pageguard::moderation::{
//!     HttpAnalysisService, LiveDocument, MemoryHistoryStore, MemorySettingsStore,
//!     ModerationConfig, ModerationPipeline,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ModerationConfig::default();
//! let document = Rc::new(LiveDocument::parse("<p>hello</p>", "https://example.com/")?);
//! let service = Rc::new(HttpAnalysisService::new(&config)?);
//! let pipeline = ModerationPipeline::new(
//!     document,
//!     service,
//!     config,
//!     Rc::new(MemoryHistoryStore::new(100)),
//!     Rc::new(MemorySettingsStore::default()),
//! );
//!
//! tokio::task::LocalSet::new()
//!     .run_until(async {
//!         pipeline.start();
//!         pipeline.run_to_idle().await;
//!         pipeline.shutdown();
//!     })
//!     .await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 动作模块 - 应用与撤销视觉修改
pub mod actions;

/// 分析模块 - 远程优先、本地回退的内容分类
pub mod analysis;

/// 配置管理模块
pub mod config;

/// 核心模块 - 共享上下文、消息处理与管道生命周期
pub mod core;

/// 活动文档模块
pub mod document;

/// 错误处理模块
pub mod error;

/// 处理管道模块 - 发现、登记、排队与调度
pub mod pipeline;

/// 存储模块 - 历史记录与设置
pub mod storage;

// ============================================================================
// 公共API导出
// ============================================================================

pub use actions::{ActionApplier, AppliedModification, RestoreReport};
pub use analysis::{
    Action, AnalysisClient, AnalysisOutcome, AnalysisRequest, AnalysisService, AnalysisVerdict,
    HttpAnalysisService, LocalHeuristicAnalyzer, VerdictSource,
};
pub use config::{ConfigManager, ModerationConfig};
pub use self::core::{Command, CommandResponse, ModerationPipeline, PipelineContext};
pub use document::{LiveDocument, MutationRecord};
pub use error::{ModerationError, ModerationResult};
pub use pipeline::{Candidate, ContentKind, ContentObserver, Dispatcher, ElementRegistry};
pub use storage::{
    HistoryEntry, HistorySink, JsonHistoryStore, JsonSettingsStore, MemoryHistoryStore,
    MemorySettingsStore, ModerationStats, SettingsStore,
};
