// 集成测试公共模块
//
// 提供脚本化的分析服务、测试环境构建器和 DOM 辅助函数

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use markup5ever_rcdom::Handle;
use serde_json::Value;
use tokio::time::Instant;

use pageguard::moderation::{
    AnalysisRequest, AnalysisService, AnalysisVerdict, LiveDocument, MemoryHistoryStore,
    MemorySettingsStore, ModerationConfig, ModerationError, ModerationPipeline, ModerationResult,
};
use pageguard::parsers::html::{descendant_elements, get_node_attr, has_class};

/// 脚本化的服务应答
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Allow,
    Remove(Vec<String>),
    /// 原样交给结论解析，用于模拟异常负载
    Payload(Value),
    Fail,
}

/// 一次服务调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub subject: String,
    pub started_at: Instant,
}

/// 按内容关键字返回预设结论的分析服务
pub struct ScriptedService {
    rules: RefCell<Vec<(String, Duration, ScriptedReply)>>,
    default_reply: RefCell<ScriptedReply>,
    default_delay: Cell<Duration>,
    healthy: Cell<bool>,
    calls: RefCell<Vec<RecordedCall>>,
    in_flight: Cell<usize>,
    max_in_flight: Cell<usize>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            rules: RefCell::new(Vec::new()),
            default_reply: RefCell::new(ScriptedReply::Allow),
            default_delay: Cell::new(Duration::from_millis(50)),
            healthy: Cell::new(true),
            calls: RefCell::new(Vec::new()),
            in_flight: Cell::new(0),
            max_in_flight: Cell::new(0),
        }
    }

    /// 所有请求都判定为过滤
    pub fn removing_everything() -> Self {
        let service = Self::new();
        service.set_default(ScriptedReply::Remove(vec!["Scripted removal".to_string()]));
        service
    }

    /// 所有请求都失败
    pub fn failing() -> Self {
        let service = Self::new();
        service.set_default(ScriptedReply::Fail);
        service
    }

    pub fn rule(self, needle: &str, delay: Duration, reply: ScriptedReply) -> Self {
        self.rules
            .borrow_mut()
            .push((needle.to_string(), delay, reply));
        self
    }

    pub fn set_default(&self, reply: ScriptedReply) {
        *self.default_reply.borrow_mut() = reply;
    }

    pub fn set_default_delay(&self, delay: Duration) {
        self.default_delay.set(delay);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.set(healthy);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls_matching(&self, needle: &str) -> Vec<RecordedCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.subject.contains(needle))
            .cloned()
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.get()
    }

    fn lookup(&self, subject: &str) -> (Duration, ScriptedReply) {
        self.rules
            .borrow()
            .iter()
            .find(|(needle, _, _)| subject.contains(needle.as_str()))
            .map(|(_, delay, reply)| (*delay, reply.clone()))
            .unwrap_or_else(|| (self.default_delay.get(), self.default_reply.borrow().clone()))
    }
}

#[async_trait(?Send)]
impl AnalysisService for ScriptedService {
    async fn analyze(&self, request: &AnalysisRequest) -> ModerationResult<AnalysisVerdict> {
        let subject = match request {
            AnalysisRequest::Text { text, .. } => text.clone(),
            AnalysisRequest::Image { image_url, .. } => image_url.clone(),
        };
        let (delay, reply) = self.lookup(&subject);

        self.calls.borrow_mut().push(RecordedCall {
            subject,
            started_at: Instant::now(),
        });
        self.in_flight.set(self.in_flight.get() + 1);
        self.max_in_flight
            .set(self.max_in_flight.get().max(self.in_flight.get()));

        tokio::time::sleep(delay).await;
        self.in_flight.set(self.in_flight.get() - 1);

        match reply {
            ScriptedReply::Allow => Ok(AnalysisVerdict::allow()),
            ScriptedReply::Remove(reasons) => Ok(AnalysisVerdict::remove(reasons)),
            ScriptedReply::Payload(payload) => AnalysisVerdict::from_payload(payload),
            ScriptedReply::Fail => Err(ModerationError::NetworkError(
                "scripted failure".to_string(),
            )),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy.get()
    }
}

/// 测试配置构建器
pub struct TestConfigBuilder {
    config: ModerationConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ModerationConfig::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// 推迟初始文本扫描，只让变更通知触发扫描
    pub fn without_initial_scans(mut self) -> Self {
        self.config.heading_initial_delay_ms = 600_000;
        self.config.text_initial_delay_ms = 600_000;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.config.enabled = false;
        self
    }

    pub fn build(self) -> ModerationConfig {
        self.config
    }
}

/// 测试环境
pub struct TestEnvironment {
    pub document: Rc<LiveDocument>,
    pub service: Rc<ScriptedService>,
    pub history: Rc<MemoryHistoryStore>,
    pub settings: Rc<MemorySettingsStore>,
    pub pipeline: ModerationPipeline,
}

impl TestEnvironment {
    pub fn new(html: &str, service: ScriptedService) -> Self {
        Self::with_config(html, service, TestConfigBuilder::new().build())
    }

    pub fn with_config(html: &str, service: ScriptedService, config: ModerationConfig) -> Self {
        Self::with_settings(html, service, config, MemorySettingsStore::default())
    }

    pub fn with_settings(
        html: &str,
        service: ScriptedService,
        config: ModerationConfig,
        settings: MemorySettingsStore,
    ) -> Self {
        let document = Rc::new(
            LiveDocument::parse(html, "https://news.example.com/article").expect("valid test page"),
        );
        let service = Rc::new(service);
        let history = Rc::new(MemoryHistoryStore::new(config.history_limit));
        let settings = Rc::new(settings);

        let pipeline = ModerationPipeline::new(
            document.clone(),
            service.clone(),
            config,
            history.clone(),
            settings.clone(),
        );

        Self {
            document,
            service,
            history,
            settings,
            pipeline,
        }
    }

    pub fn element(&self, id: &str) -> Handle {
        HtmlTestHelper::element_by_id(&self.document, id)
    }

    pub fn body(&self) -> Handle {
        self.document.body().expect("test page has a body")
    }
}

/// HTML 测试辅助工具
pub struct HtmlTestHelper;

impl HtmlTestHelper {
    pub fn page(body: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><title>Test</title></head><body>{}</body></html>",
            body
        )
    }

    pub fn element_by_id(document: &LiveDocument, id: &str) -> Handle {
        descendant_elements(document.document())
            .into_iter()
            .find(|node| get_node_attr(node, "id").as_deref() == Some(id))
            .unwrap_or_else(|| panic!("no element with id {}", id))
    }

    pub fn count_with_class(document: &LiveDocument, class_name: &str) -> usize {
        descendant_elements(document.document())
            .iter()
            .filter(|node| has_class(node, class_name))
            .count()
    }

    pub fn count_injected(document: &LiveDocument) -> usize {
        descendant_elements(document.document())
            .iter()
            .filter(|node| get_node_attr(node, "data-pageguard").is_some())
            .count()
    }
}

/// 断言辅助工具
pub struct AssertionHelper;

impl AssertionHelper {
    pub fn assert_filtered(node: &Handle, description: &str) {
        assert!(
            has_class(node, "pg-filtered"),
            "{} should be filtered",
            description
        );
    }

    pub fn assert_not_filtered(node: &Handle, description: &str) {
        assert!(
            !has_class(node, "pg-filtered"),
            "{} should not be filtered",
            description
        );
    }
}
