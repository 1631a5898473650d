//! 审核管道
//!
//! 组装观察器、调度器、分析客户端与动作应用器，并负责生命周期：
//! `start()` 启动定时任务与健康检查，`shutdown()` 取消所有任务，
//! `handle_command()` 处理扩展消息。
//!
//! 管道基于 `Rc`，必须在 tokio `LocalSet` 中运行。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tokio::task::JoinHandle;

use super::context::PipelineContext;
use super::messaging::{Command, CommandResponse, EncryptedItem};
use crate::moderation::actions::{ActionApplier, RecoveryOutcome};
use crate::moderation::analysis::{AnalysisClient, AnalysisService, AttributeImageProbe, ImageProbe};
use crate::moderation::config::ModerationConfig;
use crate::moderation::document::LiveDocument;
use crate::moderation::error::ModerationError;
use crate::moderation::pipeline::{ContentObserver, CycleOutcome, Dispatcher};
use crate::moderation::storage::{HistorySink, ModerationStats, SettingsStore};
use crate::parsers::html::detach_node;

/// 审核管道
pub struct ModerationPipeline {
    context: Rc<PipelineContext>,
    service: Rc<dyn AnalysisService>,
    settings: Rc<dyn SettingsStore>,
    observer: ContentObserver,
    dispatcher: Dispatcher,
    client: Rc<AnalysisClient>,
    applier: Rc<ActionApplier>,
    started: Cell<bool>,
    tasks: RefCell<Vec<JoinHandle<()>>>,
}

impl ModerationPipeline {
    /// 使用默认图片探测器创建管道
    pub fn new(
        document: Rc<LiveDocument>,
        service: Rc<dyn AnalysisService>,
        config: ModerationConfig,
        history: Rc<dyn HistorySink>,
        settings: Rc<dyn SettingsStore>,
    ) -> Self {
        Self::with_probe(
            document,
            service,
            config,
            history,
            settings,
            Rc::new(AttributeImageProbe),
        )
    }

    pub fn with_probe(
        document: Rc<LiveDocument>,
        service: Rc<dyn AnalysisService>,
        config: ModerationConfig,
        history: Rc<dyn HistorySink>,
        settings: Rc<dyn SettingsStore>,
        probe: Rc<dyn ImageProbe>,
    ) -> Self {
        let context = Rc::new(PipelineContext::new(document, config));

        // 已保存的开关优先于配置
        match settings.load_enabled() {
            Ok(Some(enabled)) => context.set_enabled(enabled),
            Ok(None) => {}
            Err(e) => context.report_channel_error(&e),
        }

        let client = Rc::new(AnalysisClient::new(
            context.clone(),
            service.clone(),
            probe.clone(),
        ));
        let applier = Rc::new(ActionApplier::new(context.clone(), history));
        let dispatcher = Dispatcher::new(context.clone(), client.clone(), applier.clone());
        let observer = ContentObserver::new(context.clone(), probe);

        let sink = dispatcher.clone();
        observer.on_candidate_discovered(move |candidate| sink.enqueue(candidate));

        Self {
            context,
            service,
            settings,
            observer,
            dispatcher,
            client,
            applier,
            started: Cell::new(false),
            tasks: RefCell::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &Rc<PipelineContext> {
        &self.context
    }

    pub fn observer(&self) -> &ContentObserver {
        &self.observer
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn client(&self) -> &AnalysisClient {
        &self.client
    }

    pub fn applier(&self) -> &ActionApplier {
        &self.applier
    }

    pub fn is_enabled(&self) -> bool {
        self.context.is_enabled()
    }

    pub fn stats(&self) -> ModerationStats {
        *self.context.stats.borrow()
    }

    /// 启动观察器与健康检查
    pub fn start(&self) {
        if self.started.replace(true) {
            return;
        }

        self.spawn_health_check();
        if self.context.is_enabled() {
            self.observer.start();
        }
        tracing::info!(
            "审核管道已启动 (保护{})",
            if self.context.is_enabled() { "开启" } else { "关闭" }
        );
    }

    /// 取消所有定时任务；进行中的网络请求不受影响
    pub fn shutdown(&self) {
        self.observer.stop();
        self.dispatcher.stop();
        for handle in self.tasks.borrow_mut().drain(..) {
            handle.abort();
        }
        self.started.set(false);
    }

    /// 执行一次健康检查并更新后端状态
    pub async fn check_backend(&self) -> bool {
        let available = self.service.health_check().await;
        self.context.set_backend_available(available);
        available
    }

    fn spawn_health_check(&self) {
        let context = self.context.clone();
        let service = self.service.clone();
        let period = context.config.health_check_interval();

        let handle = tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let available = service.health_check().await;
                context.set_backend_available(available);
            }
        });
        self.tasks.borrow_mut().push(handle);
    }

    /// 一次性扫描并处理直到队列清空
    pub async fn run_to_idle(&self) -> ModerationStats {
        self.observer.full_scan();

        loop {
            match self.dispatcher.run_cycle().await {
                CycleOutcome::Disabled | CycleOutcome::Idle => break,
                CycleOutcome::AlreadyRunning | CycleOutcome::Completed { .. } => {
                    tokio::time::sleep(self.context.config.batch_delay()).await;
                }
            }
        }

        self.stats()
    }

    /// 解析并处理 JSON 消息
    pub fn handle_message(&self, message: &str) -> String {
        let response = match serde_json::from_str::<Command>(message) {
            Ok(command) => self.handle_command(command),
            Err(e) => self
                .response()
                .with_error(ModerationError::from(e)),
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            tracing::error!("应答序列化失败: {}", e);
            r#"{"success":false}"#.to_string()
        })
    }

    /// 处理扩展命令
    pub fn handle_command(&self, command: Command) -> CommandResponse {
        tracing::debug!("收到命令: {:?}", command);
        match command {
            Command::ToggleProtection { enabled } => self.toggle_protection(enabled),
            Command::GetEncryptedContent => {
                let items = self
                    .applier
                    .encoded_originals()
                    .into_iter()
                    .map(|(kind, content, reasons)| EncryptedItem {
                        kind,
                        content,
                        reasons,
                    })
                    .collect();
                self.response().with_items(items)
            }
            Command::ApplyRecoveredContent { text } => {
                match self.applier.apply_recovered_content(&text) {
                    Ok(RecoveryOutcome::Replaced) => self.response().with_outcome("replaced"),
                    Ok(RecoveryOutcome::Notified(notification)) => {
                        self.expire_notification(notification);
                        self.response().with_outcome("notified")
                    }
                    Err(e) => self.response().with_error(e),
                }
            }
            Command::GetStatus => self.response(),
            Command::BackendStatus { available } => {
                self.context.set_backend_available(available);
                self.response()
            }
        }
    }

    fn toggle_protection(&self, enabled: bool) -> CommandResponse {
        if let Err(e) = self.settings.save_enabled(enabled) {
            self.context.report_channel_error(&e);
        }

        let was_enabled = self.context.is_enabled();
        self.context.set_enabled(enabled);

        match (was_enabled, enabled) {
            (true, false) => {
                // 停止扫描与调度，进行中的分析结果会在返回时被丢弃
                self.observer.stop();
                self.dispatcher.stop();
                self.context.queue.borrow_mut().clear();
                let report = self.applier.restore_all();
                self.response()
                    .with_outcome(format!("restored {}", report.restored))
            }
            (false, true) => {
                self.context.registry.borrow_mut().clear();
                if self.started.get() {
                    self.observer.start();
                }
                let found = self.observer.full_scan();
                self.response().with_outcome(format!("scanning {}", found))
            }
            _ => self.response().with_outcome("unchanged"),
        }
    }

    /// 通知到期后自动移除
    fn expire_notification(&self, notification: markup5ever_rcdom::Handle) {
        let ttl = self.context.config.notification_ttl();
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(ttl).await;
            detach_node(&notification);
        });
        self.tasks.borrow_mut().push(handle);
    }

    fn response(&self) -> CommandResponse {
        CommandResponse {
            success: true,
            enabled: self.context.is_enabled(),
            backend_available: self.context.backend_available(),
            stats: self.stats(),
            items: None,
            outcome: None,
            error: None,
        }
    }
}

impl Drop for ModerationPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
