//! 管道共享上下文
//!
//! 所有可变状态只在单线程上访问，用 `Cell`/`RefCell` 即可，不需要锁。
//! 每个逻辑操作在一次事件循环轮次内同步完成，不跨越 `.await` 持有借用。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::moderation::config::ModerationConfig;
use crate::moderation::document::LiveDocument;
use crate::moderation::error::ModerationError;
use crate::moderation::pipeline::{ElementRegistry, ProcessingQueue};
use crate::moderation::storage::ModerationStats;

/// 管道上下文
pub struct PipelineContext {
    pub config: ModerationConfig,
    pub document: Rc<LiveDocument>,
    enabled: Cell<bool>,
    backend_available: Cell<bool>,
    /// 单飞标志：同一时刻至多一个批次在处理
    pub in_flight: Cell<bool>,
    pub registry: RefCell<ElementRegistry>,
    pub queue: RefCell<ProcessingQueue>,
    pub stats: RefCell<ModerationStats>,
    channel_error_logged: Cell<bool>,
}

impl PipelineContext {
    pub fn new(document: Rc<LiveDocument>, config: ModerationConfig) -> Self {
        let enabled = config.enabled;
        Self {
            config,
            document,
            enabled: Cell::new(enabled),
            backend_available: Cell::new(true),
            in_flight: Cell::new(false),
            registry: RefCell::new(ElementRegistry::new()),
            queue: RefCell::new(ProcessingQueue::new()),
            stats: RefCell::new(ModerationStats::default()),
            channel_error_logged: Cell::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn backend_available(&self) -> bool {
        self.backend_available.get()
    }

    /// 更新后端可用性，返回状态是否发生变化
    pub fn set_backend_available(&self, available: bool) -> bool {
        let changed = self.backend_available.replace(available) != available;
        if changed {
            if available {
                tracing::info!("分析服务已恢复，切换到远程分析");
            } else {
                tracing::warn!("分析服务不可用，切换到本地分析");
            }
        }
        changed
    }

    /// 记录消息通道错误；同一实例只记录一次
    pub fn report_channel_error(&self, error: &ModerationError) {
        if !self.channel_error_logged.replace(true) {
            tracing::warn!("扩展消息通道不可用，后续错误不再记录: {}", error);
        }
    }

    pub fn page_url(&self) -> String {
        self.document.page_url().to_string()
    }
}
